use crate::qemu_trace;
use core::fmt;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Once;

/// Where warnings and errors are copied in addition to the debug port.
pub type MirrorFn = fn(fmt::Arguments<'_>);

/// `log` backend writing `"[LEVEL] target: message"` lines to QEMU.
pub struct QemuLogger {
    max_level: LevelFilter,
    mirror: Once<MirrorFn>,
}

impl QemuLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            mirror: Once::new(),
        }
    }

    /// Register this logger with the `log` facade.
    ///
    /// # Errors
    /// If a logger was already installed.
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }

    /// Also send records at [`Level::Warn`] and above to `sink`.
    ///
    /// Only the first registration takes effect.
    pub fn mirror_to(&self, sink: MirrorFn) {
        self.mirror.call_once(|| sink);
    }
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        qemu_trace!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );

        if record.level() <= Level::Warn
            && let Some(mirror) = self.mirror.get()
        {
            mirror(format_args!("{}\n", record.args()));
        }
    }

    fn flush(&self) {}
}
