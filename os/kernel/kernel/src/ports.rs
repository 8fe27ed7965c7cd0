//! # x86 I/O Port Access
//!
//! Thin wrappers around `in` and `out` for the legacy devices the kernel
//! drives: the 8259 PICs (`0x20`/`0xA0`) and the PS/2 controller (`0x60`).
//!
//! ```text
//! 0x0020-0x0021   PIC #1
//! 0x0060-0x0064   Keyboard controller
//! 0x0080          POST diagnostics (used as a delay)
//! 0x00A0-0x00A1   PIC #2
//! ```

/// Unused port written to give slow devices time between commands.
const POST_PORT: u16 = 0x80;

/// Write one byte to an I/O port.
///
/// # Safety
/// - Must run at CPL0; otherwise the CPU raises `#GP`.
/// - `port` must belong to the intended device, and the device must be in a
///   state where this write is part of its protocol.
#[inline]
pub unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Read one byte from an I/O port.
///
/// # Safety
/// Same as [`outb`]. Reading some device registers acknowledges data, so a
/// stray read can lose input.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let mut v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}

/// Roughly one microsecond of delay.
///
/// # Safety
/// Must run at CPL0.
#[inline]
pub unsafe fn io_wait() {
    unsafe { outb(POST_PORT, 0) };
}
