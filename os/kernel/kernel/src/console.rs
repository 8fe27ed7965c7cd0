//! Output through the bootloader's terminal.
//!
//! The terminal is the only console the kernel has. User `write` calls and
//! warnings from the logger both end up here.

use core::fmt::{self, Write};
use kernel_info::boot::TermWriteFn;
use spin::Once;

static TERMINAL: Once<TermWriteFn> = Once::new();

/// Route console output to `write`. Later calls are ignored.
pub fn init(write: TermWriteFn) {
    TERMINAL.call_once(|| write);
}

/// Print raw bytes. Does nothing before [`init`].
pub fn write_bytes(bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    if let Some(write) = TERMINAL.get() {
        write(bytes.as_ptr(), bytes.len() as u64);
    }
}

/// Print formatted text; usable as a logger mirror.
pub fn write_fmt(args: fmt::Arguments<'_>) {
    let _ = Console.write_fmt(args);
}

/// [`fmt::Write`] adapter over the terminal.
pub struct Console;

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_bytes(s.as_bytes());
        Ok(())
    }
}
