//! The `int 0x80` contract shared by the kernel and user programs.
//!
//! Call number in `rax`; arguments in `rdi`, `rsi`, `rdx`, `r10`, `r8`, `r9`;
//! the result comes back in `rax`. Every failure is reported as `-1`.

/// Software interrupt vector of the system call gate.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// Return value of every failed call.
pub const SYSCALL_ERROR: i64 = -1;

pub const STDIN: u64 = 0;
pub const STDOUT: u64 = 1;
pub const STDERR: u64 = 2;

pub const PROT_READ: u64 = 0x1;
pub const PROT_WRITE: u64 = 0x2;
pub const PROT_EXEC: u64 = 0x4;

pub const MAP_PRIVATE: u64 = 0x2;
pub const MAP_ANONYMOUS: u64 = 0x20;

/// Longest program name `exec` accepts, excluding the terminating NUL.
pub const EXEC_NAME_MAX: usize = 127;

#[repr(u64)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sysno {
    /// `read(fd, buf, count)`; only fd 0.
    Read = 0,
    /// `write(fd, buf, count)`; fd 1 or 2.
    Write = 1,
    /// `mmap(addr, length, prot, flags, fd, offset)`; anonymous only.
    Mmap = 2,
    /// `exec(name)`; does not return on success.
    Exec = 3,
    /// `exit(code)`; same as `exec("init")`.
    Exit = 4,
}

impl Sysno {
    #[must_use]
    pub const fn from_raw(nr: u64) -> Option<Self> {
        Some(match nr {
            0 => Self::Read,
            1 => Self::Write,
            2 => Self::Mmap,
            3 => Self::Exec,
            4 => Self::Exit,
            _ => return None,
        })
    }
}
