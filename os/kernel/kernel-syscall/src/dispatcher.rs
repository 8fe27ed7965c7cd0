use crate::fault::Fatal;
use crate::user::UserAccess;
use crate::{Fault, SyscallArgs, SyscallError, Sysno};
use kernel_info::memory::{INIT_MODULE, MMAP_BASE};
use kernel_loader::{LoadError, LoadedImage};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, align_up};
use kernel_vmem::{PageAccess, VmemError};
use log::{debug, error, warn};
use stdlib::syscall_abi::{EXEC_NAME_MAX, PROT_EXEC, PROT_WRITE, STDERR, STDIN, STDOUT, SYSCALL_ERROR};

const ASCII_BACKSPACE: u8 = 0x08;

/// Size of the user half; no request may span more.
const USER_SPAN: u64 = 1 << 47;

/// Kernel services the dispatcher runs on.
///
/// The kernel implements this over the live address space and devices;
/// tests implement it over simulated RAM and scripted input.
pub trait SyscallEnv {
    /// Emit bytes on the console.
    fn console_write(&mut self, bytes: &[u8]);

    /// Next keyboard character, blocking until one arrives.
    fn getc(&mut self) -> u8;

    /// See [`user::check_range`](crate::user::check_range).
    ///
    /// # Errors
    /// [`SyscallError::BadAddress`].
    fn check_user(&self, va: VirtualAddress, len: usize, access: UserAccess) -> Result<(), SyscallError>;

    /// # Errors
    /// [`SyscallError::BadAddress`].
    fn copy_from_user(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), SyscallError>;

    /// # Errors
    /// [`SyscallError::BadAddress`].
    fn copy_to_user(&mut self, va: VirtualAddress, bytes: &[u8]) -> Result<(), SyscallError>;

    /// Back one page at `va` with fresh zeroed memory.
    ///
    /// # Errors
    /// Whatever the page-table layer reports.
    fn map_user_page(&mut self, va: VirtualAddress, access: PageAccess) -> Result<(), VmemError>;

    /// Replace the running program with boot module `name`.
    ///
    /// # Errors
    /// See [`LoadError`].
    fn exec(&mut self, name: &str) -> Result<LoadedImage, LoadError>;
}

/// Where the CPU goes after a trap.
#[must_use]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Return to the interrupted program with this value in `rax`.
    Resume(i64),
    /// Drop into a freshly loaded program.
    EnterUser(LoadedImage),
    /// Report and stop the machine.
    Halt(Fatal),
}

/// Routes `int 0x80` requests to their implementation.
///
/// Holds the only per-system syscall state: the next address anonymous
/// `mmap(NULL, ...)` hands out.
#[derive(Debug)]
pub struct SyscallDispatcher {
    mmap_next: VirtualAddress,
}

impl Default for SyscallDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SyscallDispatcher {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mmap_next: VirtualAddress::new(MMAP_BASE),
        }
    }

    /// Next address `mmap(NULL, ...)` will return. Only ever grows.
    #[must_use]
    pub const fn mmap_watermark(&self) -> VirtualAddress {
        self.mmap_next
    }

    pub fn dispatch<E: SyscallEnv>(&mut self, env: &mut E, call: SyscallArgs) -> TrapOutcome {
        let [a0, a1, a2, ..] = call.args;
        let result = match Sysno::from_raw(call.nr) {
            Some(Sysno::Read) => Self::read(env, a0, VirtualAddress::new(a1), a2),
            Some(Sysno::Write) => Self::write(env, a0, VirtualAddress::new(a1), a2),
            Some(Sysno::Mmap) => self.mmap(env, a0, a1, a2),
            Some(Sysno::Exec) => {
                let mut buf = [0u8; EXEC_NAME_MAX + 1];
                return match Self::exec_name(env, VirtualAddress::new(a0), &mut buf) {
                    Ok(name) => Self::exec(env, call.nr, name),
                    Err(e) => Self::fail(call.nr, e),
                };
            }
            Some(Sysno::Exit) => {
                debug!("exit({})", a0.cast_signed());
                return Self::exec(env, call.nr, INIT_MODULE);
            }
            None => Err(SyscallError::Unsupported(call.nr)),
        };

        match result {
            Ok(value) => TrapOutcome::Resume(value),
            Err(e) => Self::fail(call.nr, e),
        }
    }

    /// Every CPU exception is fatal.
    pub fn fault(fault: Fault) -> TrapOutcome {
        error!("{fault}");
        TrapOutcome::Halt(Fatal::Fault(fault))
    }

    fn fail(nr: u64, e: SyscallError) -> TrapOutcome {
        match e {
            SyscallError::InvalidDescriptor(_) | SyscallError::ExecFailed(_) => {
                warn!("syscall {nr}: {e}");
            }
            _ => debug!("syscall {nr}: {e}"),
        }
        TrapOutcome::Resume(SYSCALL_ERROR)
    }

    fn user_len(count: u64) -> Result<usize, SyscallError> {
        if count > USER_SPAN {
            return Err(SyscallError::BadAddress);
        }
        usize::try_from(count).map_err(|_| SyscallError::BadAddress)
    }

    /// Collect exactly `count` keystrokes into `buf`; backspace removes the
    /// previous one.
    fn read<E: SyscallEnv>(env: &mut E, fd: u64, buf: VirtualAddress, count: u64) -> Result<i64, SyscallError> {
        if fd != STDIN {
            return Err(SyscallError::InvalidDescriptor(fd));
        }
        let count = Self::user_len(count)?;
        env.check_user(buf, count, UserAccess::Write)?;

        let mut n = 0usize;
        while n < count {
            let c = env.getc();
            if c == ASCII_BACKSPACE {
                if n > 0 {
                    n -= 1;
                    env.copy_to_user(buf + n as u64, &[0])?;
                    env.console_write(b"\x08 \x08");
                }
                continue;
            }
            env.copy_to_user(buf + n as u64, &[c])?;
            env.console_write(&[c]);
            n += 1;
        }
        i64::try_from(n).map_err(|_| SyscallError::InvalidArgument)
    }

    fn write<E: SyscallEnv>(env: &mut E, fd: u64, buf: VirtualAddress, count: u64) -> Result<i64, SyscallError> {
        if fd != STDOUT && fd != STDERR {
            return Err(SyscallError::InvalidDescriptor(fd));
        }
        let count = Self::user_len(count)?;
        env.check_user(buf, count, UserAccess::Read)?;

        let mut chunk = [0u8; 256];
        let mut done = 0usize;
        while done < count {
            let len = (count - done).min(chunk.len());
            env.copy_from_user(buf + done as u64, &mut chunk[..len])?;
            env.console_write(&chunk[..len]);
            done += len;
        }
        i64::try_from(count).map_err(|_| SyscallError::InvalidArgument)
    }

    fn mmap<E: SyscallEnv>(&mut self, env: &mut E, addr: u64, length: u64, prot: u64) -> Result<i64, SyscallError> {
        if length == 0 || length > USER_SPAN {
            return Err(SyscallError::InvalidArgument);
        }
        let size = align_up(length, PAGE_SIZE);

        let base = if addr == 0 {
            self.mmap_next
        } else {
            let base = VirtualAddress::new(addr);
            if !base.is_page_aligned() {
                return Err(SyscallError::InvalidArgument);
            }
            base
        };

        let last = base
            .as_u64()
            .checked_add(size - 1)
            .map(VirtualAddress::new)
            .ok_or(SyscallError::InvalidArgument)?;
        if !base.is_lower_half() || !last.is_lower_half() {
            return Err(SyscallError::InvalidArgument);
        }
        if addr == 0 {
            // The watermark moves before mapping; a failed range is not reused.
            self.mmap_next = last + 1;
        }

        let access = PageAccess::new(true, prot & PROT_WRITE != 0, prot & PROT_EXEC != 0);
        let mut page = base;
        while page < last {
            env.map_user_page(page, access)?;
            page += PAGE_SIZE;
        }
        debug!("mmap {base} +{size:#x} {access:?}");
        Ok(base.as_u64().cast_signed())
    }

    /// Copy a NUL-terminated name of at most [`EXEC_NAME_MAX`] bytes out of
    /// user memory.
    fn exec_name<'b, E: SyscallEnv>(
        env: &E,
        ptr: VirtualAddress,
        buf: &'b mut [u8; EXEC_NAME_MAX + 1],
    ) -> Result<&'b str, SyscallError> {
        for i in 0..buf.len() {
            env.copy_from_user(ptr + i as u64, &mut buf[i..=i])?;
            if buf[i] == 0 {
                return core::str::from_utf8(&buf[..i]).map_err(|_| SyscallError::InvalidArgument);
            }
        }
        Err(SyscallError::InvalidArgument)
    }

    fn exec<E: SyscallEnv>(env: &mut E, nr: u64, name: &str) -> TrapOutcome {
        match env.exec(name) {
            Ok(image) => TrapOutcome::EnterUser(image),
            Err(e @ LoadError::AllocationFailed(_)) => {
                error!("exec {name}: {e}");
                TrapOutcome::Halt(Fatal::ExecAborted(e))
            }
            Err(e) => Self::fail(nr, e.into()),
        }
    }
}
