//! PS/2 keyboard interrupt (IRQ 1).
//!
//! The handler reads one scan code, decodes it, and queues the resulting
//! byte for `read`. It never takes the kernel context lock, so it can fire
//! while a system call holds it.

use crate::gdt::KERNEL_CS;
use crate::interrupts::{GateType, Idt};
use crate::pic::{self, KEYBOARD_IRQ, KEYBOARD_VECTOR, SPURIOUS_VECTOR};
use crate::ports::inb;
use core::arch::naked_asm;
use kernel_keyboard::{KeyBuffer, PS2_DATA_PORT, ScancodeDecoder};
use log::trace;
use spin::Mutex;

const KEY_BUFFER_LEN: usize = 256;

/// Decoded keystrokes waiting for `read`.
pub static KEYS: KeyBuffer<KEY_BUFFER_LEN> = KeyBuffer::new();

/// Only touched from the IRQ handler, which runs with interrupts off.
static DECODER: Mutex<ScancodeDecoder> = Mutex::new(ScancodeDecoder::new());

pub trait KeyboardInterrupt {
    fn init_keyboard_gates(&mut self) -> &mut Self;
}

impl KeyboardInterrupt for Idt {
    fn init_keyboard_gates(&mut self) -> &mut Self {
        self[KEYBOARD_VECTOR]
            .set_handler(keyboard_entry)
            .selector(KERNEL_CS)
            .present(true)
            .gate_type(GateType::InterruptGate);
        self[SPURIOUS_VECTOR]
            .set_handler(spurious_entry)
            .selector(KERNEL_CS)
            .present(true)
            .gate_type(GateType::InterruptGate);
        self
    }
}

/// Saves the caller-saved registers around [`keyboard_trap`].
///
/// Five CPU pushes plus nine here keep `rsp` 16-byte aligned at the call.
#[unsafe(naked)]
extern "C" fn keyboard_entry() {
    naked_asm!(
        "push rax",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "cld",
        "call {rust}",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rax",
        "iretq",
        rust = sym keyboard_trap
    );
}

/// A spurious IRQ 7 is not in service, so it gets no EOI.
#[unsafe(naked)]
extern "C" fn spurious_entry() {
    naked_asm!("iretq");
}

extern "C" fn keyboard_trap() {
    // SAFETY: IRQ 1 signals a byte waiting on the data port.
    let scancode = unsafe { inb(PS2_DATA_PORT) };
    if let Some(byte) = DECODER.lock().feed(scancode)
        && !KEYS.push(byte)
    {
        trace!("keyboard buffer full, dropped {byte:#04x}");
    }
    // SAFETY: exactly one EOI for this delivery.
    unsafe { pic::end_of_interrupt(KEYBOARD_IRQ) };
}
