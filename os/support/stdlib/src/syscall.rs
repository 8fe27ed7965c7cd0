//! `int 0x80` system calls.
//!
//! Every wrapper returns what the kernel put in `rax`: a non-negative
//! result, or [`SYSCALL_ERROR`].

use crate::syscall_abi::{EXEC_NAME_MAX, SYSCALL_ERROR, Sysno};
use core::ptr::NonNull;

/// Issue system call `nr` with six arguments.
///
/// The kernel preserves every register except `rax`.
///
/// # Safety
/// Pointer arguments must satisfy the contract of `nr`; the kernel will
/// read or write through them.
#[inline]
pub unsafe fn syscall6(nr: Sysno, args: [u64; 6]) -> i64 {
    let ret: i64;
    unsafe {
        core::arch::asm!(
            "int 0x80",
            inlateout("rax") nr as u64 => ret,
            in("rdi") args[0],
            in("rsi") args[1],
            in("rdx") args[2],
            in("r10") args[3],
            in("r8") args[4],
            in("r9") args[5],
            options(nostack)
        );
    }
    ret
}

/// Block until `buf` is filled from the keyboard.
pub fn read(fd: u64, buf: &mut [u8]) -> i64 {
    if buf.is_empty() {
        return 0;
    }
    // SAFETY: `buf` is valid for `buf.len()` bytes of writes.
    unsafe {
        syscall6(
            Sysno::Read,
            [fd, buf.as_mut_ptr() as u64, buf.len() as u64, 0, 0, 0],
        )
    }
}

pub fn write(fd: u64, buf: &[u8]) -> i64 {
    if buf.is_empty() {
        return 0;
    }
    // SAFETY: `buf` is valid for `buf.len()` bytes of reads.
    unsafe {
        syscall6(
            Sysno::Write,
            [fd, buf.as_ptr() as u64, buf.len() as u64, 0, 0, 0],
        )
    }
}

/// Map `length` bytes of zeroed anonymous memory.
///
/// `addr == 0` lets the kernel choose. Returns `None` on failure.
pub fn mmap(addr: u64, length: u64, prot: u64, flags: u64) -> Option<NonNull<u8>> {
    // SAFETY: no memory is passed in.
    let ret = unsafe { syscall6(Sysno::Mmap, [addr, length, prot, flags, u64::MAX, 0]) };
    if ret == SYSCALL_ERROR {
        return None;
    }
    NonNull::new(ret.cast_unsigned() as *mut u8)
}

/// Replace this program with boot module `name`.
///
/// Only returns on failure.
pub fn exec(name: &str) -> i64 {
    let mut path = [0u8; EXEC_NAME_MAX + 1];
    if name.len() > EXEC_NAME_MAX || name.bytes().any(|b| b == 0) {
        return SYSCALL_ERROR;
    }
    path[..name.len()].copy_from_slice(name.as_bytes());
    // SAFETY: `path` is NUL-terminated and outlives the call.
    unsafe { syscall6(Sysno::Exec, [path.as_ptr() as u64, 0, 0, 0, 0, 0]) }
}

/// End this program; the kernel starts `init` again.
pub fn exit(code: i64) -> ! {
    // SAFETY: no memory is passed in.
    unsafe { syscall6(Sysno::Exit, [code.cast_unsigned(), 0, 0, 0, 0, 0]) };
    // Only reached when `init` itself cannot be loaded.
    loop {
        core::hint::spin_loop();
    }
}
