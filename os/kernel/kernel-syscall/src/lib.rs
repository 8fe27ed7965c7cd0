//! # Trap and System Call Dispatch
//!
//! Everything that happens between "user code executed `int 0x80` (or
//! faulted)" and "the CPU goes somewhere next".
//!
//! ```text
//!  int 0x80 ──► trampoline ──► TrapFrame ──► SyscallArgs
//!                                                │
//!                               SyscallDispatcher::dispatch(env, args)
//!                                                │
//!              ┌─────────────────────────────────┼──────────────────────┐
//!              ▼                                 ▼                      ▼
//!     Resume(rax)                     EnterUser(LoadedImage)        Halt(Fatal)
//!     iretq to the caller             jump into a new program       stop the CPU
//! ```
//!
//! The dispatcher never touches hardware. Everything it needs from the
//! kernel (console, keyboard, user memory, page mapping, program loading)
//! goes through [`SyscallEnv`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod dispatcher;
mod fault;
mod frame;
pub mod user;

pub use crate::dispatcher::{SyscallDispatcher, SyscallEnv, TrapOutcome};
pub use crate::fault::{Fatal, Fault, fault_has_error_code, fault_name};
pub use crate::frame::{SyscallArgs, TrapFrame};

pub use kernel_loader::{LoadError, LoadedImage};
pub use stdlib::syscall_abi::Sysno;

use kernel_vmem::VmemError;

/// Why a system call failed. Every variant reaches user space as `-1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyscallError {
    #[error("invalid file descriptor {0}")]
    InvalidDescriptor(u64),
    #[error("invalid argument")]
    InvalidArgument,
    #[error("mapping failed: {0}")]
    MapFailed(#[from] VmemError),
    #[error("exec failed: {0}")]
    ExecFailed(#[from] LoadError),
    #[error("unsupported system call {0}")]
    Unsupported(u64),
    #[error("bad user address")]
    BadAddress,
}

