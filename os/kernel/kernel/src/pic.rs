//! # 8259 Programmable Interrupt Controllers
//!
//! The two cascaded PICs power up delivering IRQs on vectors that collide
//! with CPU exceptions. They are remapped right after the IDT is loaded:
//!
//! ```text
//!   PIC1 (master): IRQ 0-7  → vectors 0x20-0x27
//!   PIC2 (slave):  IRQ 8-15 → vectors 0x28-0x2F
//! ```
//!
//! Only the keyboard line (IRQ 1) is left unmasked.

use crate::ports::{io_wait, outb};

const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_COMMAND: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

/// ICW1: start initialization, ICW4 follows.
const ICW1_INIT: u8 = 0x11;
/// ICW4: 8086 mode.
const ICW4_8086: u8 = 0x01;
const EOI: u8 = 0x20;

pub const PIC1_VECTOR_OFFSET: u8 = 0x20;
pub const PIC2_VECTOR_OFFSET: u8 = 0x28;

pub const KEYBOARD_IRQ: u8 = 1;
pub const KEYBOARD_VECTOR: usize = (PIC1_VECTOR_OFFSET + KEYBOARD_IRQ) as usize;

/// IRQ 7 is where the master reports spurious interrupts.
pub const SPURIOUS_VECTOR: usize = (PIC1_VECTOR_OFFSET + 7) as usize;

/// Everything but the keyboard.
const PIC1_MASK: u8 = !(1 << KEYBOARD_IRQ);
const PIC2_MASK: u8 = 0xFF;

/// Remap both PICs and unmask the keyboard.
///
/// # Safety
/// Must run at CPL0 with interrupts disabled, after the IDT has gates for
/// the unmasked vectors.
pub unsafe fn init() {
    unsafe {
        outb(PIC1_COMMAND, ICW1_INIT);
        io_wait();
        outb(PIC2_COMMAND, ICW1_INIT);
        io_wait();

        outb(PIC1_DATA, PIC1_VECTOR_OFFSET);
        io_wait();
        outb(PIC2_DATA, PIC2_VECTOR_OFFSET);
        io_wait();

        // ICW3: slave on IRQ2, slave identity 2.
        outb(PIC1_DATA, 0x04);
        io_wait();
        outb(PIC2_DATA, 0x02);
        io_wait();

        outb(PIC1_DATA, ICW4_8086);
        io_wait();
        outb(PIC2_DATA, ICW4_8086);
        io_wait();

        outb(PIC1_DATA, PIC1_MASK);
        outb(PIC2_DATA, PIC2_MASK);
    }
    log::debug!("PIC remapped to {PIC1_VECTOR_OFFSET:#x}/{PIC2_VECTOR_OFFSET:#x}, keyboard unmasked");
}

/// Acknowledge `irq` so the PIC delivers the next one.
///
/// # Safety
/// Must be called exactly once per delivered IRQ, from its handler.
pub unsafe fn end_of_interrupt(irq: u8) {
    unsafe {
        if irq >= 8 {
            outb(PIC2_COMMAND, EOI);
        }
        outb(PIC1_COMMAND, EOI);
    }
}
