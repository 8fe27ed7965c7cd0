//! CPU exception entry.
//!
//! Each vector gets a small stub that makes the stack look the same whether
//! or not the CPU pushed an error code, then pushes its vector number and
//! jumps to [`fault_common`]. Every exception is fatal: the report goes out
//! through the log and the CPU halts.

use crate::cpu;
use crate::gdt::KERNEL_CS;
use crate::interrupts::{GateType, Idt, finish};
use crate::tss::DOUBLE_FAULT_IST;
use core::arch::naked_asm;
use kernel_registers::{Cr2, LoadRegisterUnsafe};
use kernel_syscall::{Fault, SyscallDispatcher, fault_has_error_code};

pub const DOUBLE_FAULT_VECTOR: usize = 8;
pub const PAGE_FAULT_VECTOR: u8 = 14;

/// Stack image built by a stub on top of the CPU's interrupt frame.
#[repr(C)]
struct FaultFrame {
    vector: u64,
    /// Zero for vectors without an error code.
    error_code: u64,
    rip: u64,
    cs: u64,
    rflags: u64,
    rsp: u64,
    ss: u64,
}

macro_rules! fault_stub {
    ($name:ident, $vector:literal) => {
        #[unsafe(naked)]
        extern "C" fn $name() {
            naked_asm!(
                "push 0",
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym fault_common,
            );
        }
    };
    ($name:ident, $vector:literal, error_code) => {
        #[unsafe(naked)]
        extern "C" fn $name() {
            naked_asm!(
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym fault_common,
            );
        }
    };
}

fault_stub!(divide_error, 0);
fault_stub!(debug, 1);
fault_stub!(nmi, 2);
fault_stub!(breakpoint, 3);
fault_stub!(overflow, 4);
fault_stub!(bound_range, 5);
fault_stub!(invalid_opcode, 6);
fault_stub!(device_not_available, 7);
fault_stub!(double_fault, 8, error_code);
fault_stub!(coprocessor_overrun, 9);
fault_stub!(invalid_tss, 10, error_code);
fault_stub!(segment_not_present, 11, error_code);
fault_stub!(stack_segment, 12, error_code);
fault_stub!(general_protection, 13, error_code);
fault_stub!(page_fault, 14, error_code);
fault_stub!(reserved, 15);
fault_stub!(x87_floating_point, 16);
fault_stub!(alignment_check, 17, error_code);
fault_stub!(machine_check, 18);
fault_stub!(simd_floating_point, 19);
fault_stub!(virtualization, 20);
fault_stub!(control_protection, 21, error_code);

const FAULT_STUBS: [extern "C" fn(); 22] = [
    divide_error,
    debug,
    nmi,
    breakpoint,
    overflow,
    bound_range,
    invalid_opcode,
    device_not_available,
    double_fault,
    coprocessor_overrun,
    invalid_tss,
    segment_not_present,
    stack_segment,
    general_protection,
    page_fault,
    reserved,
    x87_floating_point,
    alignment_check,
    machine_check,
    simd_floating_point,
    virtualization,
    control_protection,
];

#[unsafe(naked)]
extern "C" fn fault_common() {
    naked_asm!(
        "cld",
        "mov rdi, rsp",
        "and rsp, -16",
        "call {rust}",
        "2:",
        "cli",
        "hlt",
        "jmp 2b",
        rust = sym fault_trap,
    );
}

#[allow(clippy::cast_possible_truncation)]
extern "C" fn fault_trap(frame: &FaultFrame) -> ! {
    let vector = frame.vector as u8;
    let cr2 = if vector == PAGE_FAULT_VECTOR {
        // SAFETY: exception handlers run at CPL0.
        Some(unsafe { Cr2::load_unsafe() }.fault_address())
    } else {
        None
    };
    let fault = Fault {
        vector,
        error_code: fault_has_error_code(vector).then_some(frame.error_code),
        rip: frame.rip,
        cr2,
    };
    log::debug!(
        "fault frame: cs={:#x} rflags={:#x} rsp={:#x} ss={:#x}",
        frame.cs,
        frame.rflags,
        frame.rsp,
        frame.ss
    );

    let _ = finish(SyscallDispatcher::fault(fault));
    cpu::halt_forever()
}

pub trait FaultInterrupts {
    /// Gates for vectors 0–21; `#DF` switches to the IST1 stack.
    fn init_fault_gates(&mut self) -> &mut Self;
}

impl FaultInterrupts for Idt {
    #[allow(clippy::cast_possible_truncation)]
    fn init_fault_gates(&mut self) -> &mut Self {
        for (vector, &stub) in FAULT_STUBS.iter().enumerate() {
            let ist = if vector == DOUBLE_FAULT_VECTOR {
                DOUBLE_FAULT_IST
            } else {
                0
            };
            self[vector]
                .set_handler(stub)
                .selector(KERNEL_CS)
                .ist(ist)
                .present(true)
                .gate_type(GateType::InterruptGate);
        }
        self
    }
}
