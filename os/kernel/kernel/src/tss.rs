//! # 64-bit Task State Segment
//!
//! Long mode does no hardware task switching, but the CPU still reads two
//! things from the TSS:
//!
//! - `rsp[0]`: the stack it switches to when a gate raises CPL from 3 to 0
//!   (`int 0x80`, a keyboard IRQ or a fault while user code runs).
//! - `ist[n]`: alternate stacks for gates that name an IST slot. The double
//!   fault gate uses IST1 so it always lands on a known-good stack.
//!
//! `iopb_offset` points past the end of the segment, so there is no I/O
//! bitmap and ring 3 cannot touch ports.

use crate::stack::Stack;
use kernel_info::memory::KERNEL_TRAP_STACK_SIZE;
use kernel_memory_addresses::VirtualAddress;
use spin::Once;

const DOUBLE_FAULT_STACK_SIZE: usize = 16 * 1024;

/// IST slot (1-based, as encoded in a gate) of the double-fault stack.
pub const DOUBLE_FAULT_IST: u8 = 1;

static mut TRAP_STACK: Stack<KERNEL_TRAP_STACK_SIZE> = Stack::new();
static mut DOUBLE_FAULT_STACK: Stack<DOUBLE_FAULT_STACK_SIZE> = Stack::new();

static TSS: Once<Tss64> = Once::new();

#[repr(C, packed)]
pub struct Tss64 {
    _reserved0: u32,
    /// Privilege stack table; only `rsp[0]` is used.
    pub rsp: [u64; 3],
    _reserved1: u64,
    /// Interrupt stack table, `ist[0]` is IST1.
    pub ist: [u64; 7],
    _reserved2: u64,
    _reserved3: u16,
    pub iopb_offset: u16,
}

const _: () = assert!(size_of::<Tss64>() == 104);

impl Tss64 {
    #[allow(clippy::cast_possible_truncation)]
    const fn new(rsp0: VirtualAddress, ist1: VirtualAddress) -> Self {
        let mut ist = [0; 7];
        ist[DOUBLE_FAULT_IST as usize - 1] = ist1.as_u64();
        Self {
            _reserved0: 0,
            rsp: [rsp0.as_u64(), 0, 0],
            _reserved1: 0,
            ist,
            _reserved2: 0,
            _reserved3: 0,
            iopb_offset: size_of::<Self>() as u16,
        }
    }
}

/// The TSS, built on first use with the trap and double-fault stacks.
pub fn tss() -> &'static Tss64 {
    TSS.call_once(|| {
        let rsp0 = VirtualAddress::new(Stack::top(&raw const TRAP_STACK).addr() as u64);
        let ist1 = VirtualAddress::new(Stack::top(&raw const DOUBLE_FAULT_STACK).addr() as u64);
        Tss64::new(rsp0, ist1)
    })
}
