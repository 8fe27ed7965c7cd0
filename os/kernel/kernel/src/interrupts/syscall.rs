//! `int 0x80` entry.

use crate::context;
use crate::gdt::KERNEL_CS;
use crate::interrupts::{GateType, Idt, finish};
use crate::privilege::Dpl;
use core::arch::naked_asm;
use kernel_syscall::TrapFrame;

pub const SYSCALL_VECTOR: usize = 0x80;

pub trait SyscallInterrupt {
    fn init_syscall_gate(&mut self, handler: extern "C" fn()) -> &mut Self;
}

impl SyscallInterrupt for Idt {
    fn init_syscall_gate(&mut self, handler: extern "C" fn()) -> &mut Self {
        self[SYSCALL_VECTOR]
            .set_handler(handler)
            .selector(KERNEL_CS)
            .present(true)
            .dpl(Dpl::Ring3)
            .gate_type(GateType::TrapGate);
        self
    }
}

/// Saves every general-purpose register as a [`TrapFrame`], hands it to
/// [`syscall_trap`], and restores the (possibly updated) registers.
///
/// Five CPU pushes plus fifteen here keep `rsp` 16-byte aligned at the call.
#[unsafe(naked)]
pub extern "C" fn int80_entry() {
    naked_asm!(
        "push r15",
        "push r14",
        "push r13",
        "push r12",
        "push r11",
        "push r10",
        "push r9",
        "push r8",
        "push rbp",
        "push rdi",
        "push rsi",
        "push rdx",
        "push rcx",
        "push rbx",
        "push rax",
        "cld",
        "mov rdi, rsp",
        "call {rust}",
        "pop rax",
        "pop rbx",
        "pop rcx",
        "pop rdx",
        "pop rsi",
        "pop rdi",
        "pop rbp",
        "pop r8",
        "pop r9",
        "pop r10",
        "pop r11",
        "pop r12",
        "pop r13",
        "pop r14",
        "pop r15",
        "iretq",
        rust = sym syscall_trap
    );
}

extern "C" fn syscall_trap(frame: &mut TrapFrame) {
    let call = frame.syscall_args();
    let outcome = context::with(|ctx| ctx.dispatch(call));
    frame.set_return(finish(outcome));
}
