//! Instructions that change what the CPU does next.

use core::arch::asm;

/// Stop this CPU for good.
pub fn halt_forever() -> ! {
    loop {
        // SAFETY: masks interrupts and parks the CPU; nothing is resumed afterwards.
        unsafe { asm!("cli", "hlt", options(nomem, nostack)) };
    }
}

/// Start delivering maskable interrupts.
///
/// # Safety
/// The IDT, the GDT with its TSS, and the PIC must be fully set up.
pub unsafe fn enable_interrupts() {
    unsafe { asm!("sti", options(nomem, nostack)) };
}
