//! The kernel's single IDT.
//!
//! Load order at boot: GDT and TSS first (gates reference `KERNEL_CS` and
//! the double-fault gate names IST1), then [`init`], then the PIC, then `sti`.

use crate::interrupts::Idt;
use crate::interrupts::fault::FaultInterrupts;
use crate::interrupts::keyboard::KeyboardInterrupt;
use crate::interrupts::syscall::{SyscallInterrupt, int80_entry};
use spin::Once;

static IDT: Once<Idt> = Once::new();

/// Build the table and load it into the IDTR.
///
/// # Safety
/// Must run once, at CPL0, with interrupts disabled and the GDT and TSS
/// already loaded.
pub unsafe fn init() {
    let idt = IDT.call_once(|| {
        let mut idt = Idt::new();
        idt.init_fault_gates()
            .init_keyboard_gates()
            .init_syscall_gate(int80_entry);
        idt
    });
    unsafe { idt.load() };
    log::debug!("IDT loaded");
}
