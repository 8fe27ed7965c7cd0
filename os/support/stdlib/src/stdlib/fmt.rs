use crate::syscall;
use core::fmt::{self, Write};

const BUF_LEN: usize = 128;

/// Collects formatted output on the stack and hands it to `out` in chunks
/// of at most `N` bytes, so one `println!` costs few system calls.
pub struct BufWriter<F: FnMut(&[u8]), const N: usize = BUF_LEN> {
    buf: [u8; N],
    len: usize,
    out: F,
}

impl<F: FnMut(&[u8]), const N: usize> BufWriter<F, N> {
    pub const fn new(out: F) -> Self {
        Self {
            buf: [0; N],
            len: 0,
            out,
        }
    }

    pub fn flush(&mut self) {
        if self.len > 0 {
            (self.out)(&self.buf[..self.len]);
            self.len = 0;
        }
    }
}

impl<F: FnMut(&[u8]), const N: usize> Write for BufWriter<F, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            if self.len == N {
                self.flush();
            }
            let take = bytes.len().min(N - self.len);
            self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
            self.len += take;
            bytes = &bytes[take..];
        }
        Ok(())
    }
}

#[doc(hidden)]
pub fn write_to(fd: u64, args: fmt::Arguments) {
    let mut w = BufWriter::<_, BUF_LEN>::new(|chunk: &[u8]| {
        syscall::write(fd, chunk);
    });
    // Output is best effort.
    w.write_fmt(args).ok();
    w.flush();
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::stdlib::fmt::write_to($crate::syscall_abi::STDOUT, core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::stdlib::fmt::write_to(
            $crate::syscall_abi::STDOUT,
            core::format_args!("{}\n", core::format_args!($($arg)*)),
        )
    };
}

#[macro_export]
macro_rules! eprint {
    ($($arg:tt)*) => {
        $crate::stdlib::fmt::write_to($crate::syscall_abi::STDERR, core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! eprintln {
    () => {
        $crate::eprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::stdlib::fmt::write_to(
            $crate::syscall_abi::STDERR,
            core::format_args!("{}\n", core::format_args!($($arg)*)),
        )
    };
}
