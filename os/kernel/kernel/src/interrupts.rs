//! # x86-64 Interrupt Descriptor Table
//!
//! A 256-entry IDT with a fluent builder for its gates:
//!
//! ```ignore
//! idt[0x80]
//!     .set_handler(int80_entry)
//!     .selector(KERNEL_CS)   // run the handler in kernel code
//!     .dpl(Dpl::Ring3)       // allow `int 0x80` from ring 3
//!     .present(true)
//!     .gate_type(GateType::TrapGate);
//! ```
//!
//! ## Gates installed
//! Vector      | Gate      | DPL | Handler
//! ------------|-----------|-----|--------
//! 0x00–0x15   | interrupt | 0   | [`fault`] stubs; `#DF` runs on IST1
//! 0x21        | interrupt | 0   | [`keyboard`] IRQ 1
//! 0x27        | interrupt | 0   | spurious IRQ 7, ignored
//! 0x80        | trap      | 3   | [`syscall`] entry
//!
//! The system call gate is a trap gate so the keyboard IRQ keeps arriving
//! while `read` waits for input.
//!
//! Every trap ends in one of three ways, decided by [`finish`]: back to the
//! interrupted code, into a freshly loaded program, or a halted CPU.

pub mod fault;
pub mod keyboard;
pub mod syscall;

use crate::privilege::Dpl;
use crate::{cpu, userland};
use bitfield_struct::bitfield;
use core::arch::asm;
use core::ops::{Index, IndexMut};
use kernel_syscall::TrapOutcome;

const _: () = assert!(size_of::<IdtEntry>() == 16);
const _: () = assert!(align_of::<Idt>() == 16);

/// The middle two bytes of a gate: IST index, type, DPL and present bit.
#[bitfield(u16)]
pub struct IdtGateAttr {
    /// IST slot; 0 keeps the current (or `rsp0`) stack.
    #[bits(3)]
    pub ist: u8,

    #[bits(5)]
    __zero0: u8,

    /// 0xE = interrupt gate, 0xF = trap gate.
    #[bits(4)]
    pub typ: u8,

    /// Must be zero for interrupt and trap gates.
    #[bits(1)]
    pub s: bool,

    #[bits(2)]
    pub dpl: u8,

    #[bits(1)]
    pub present: bool,
}

impl IdtGateAttr {
    const INTERRUPT_GATE: u8 = 0xE;
    const TRAP_GATE: u8 = 0xF;
}

#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; 256],
}

impl Idt {
    /// A table with every gate not present.
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::MISSING; 256],
        }
    }

    /// Point the IDTR at this table.
    ///
    /// # Safety
    /// Must run at CPL0. Every present gate must reference a valid handler,
    /// and the TSS must already be loaded if any gate is reachable from ring 3
    /// or names an IST slot.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn load(&'static self) {
        let idtr = Idtr {
            limit: (size_of::<Self>() - 1) as u16,
            base: core::ptr::from_ref(self).addr() as u64,
        };
        unsafe {
            asm!("lidt [{}]", in(reg) &raw const idtr, options(nostack, preserves_flags, readonly));
        }
    }
}

impl Index<usize> for Idt {
    type Output = IdtEntry;
    fn index(&self, i: usize) -> &Self::Output {
        &self.entries[i]
    }
}

impl IndexMut<usize> for Idt {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.entries[i]
    }
}

/// Operand of `lidt`.
#[repr(C, packed)]
struct Idtr {
    limit: u16,
    base: u64,
}

/// One 16-byte gate descriptor.
///
/// ```text
/// 127            96 95                 64
/// +----------------+---------------------+
/// |      zero      |    offset[63:32]    |
/// +----------------+---------------------+
/// 63          48 47        32 31       16 15         0
/// +-------------+------------+-----------+------------+
/// |offset[31:16]| P DPL type | selector  |offset[15:0]|
/// |             | ... IST    |           |            |
/// +-------------+------------+-----------+------------+
/// ```
#[repr(C)]
#[derive(Copy, Clone)]
pub struct IdtEntry {
    offset_lo: u16,
    selector: u16,
    ist_type: u16,
    offset_mid: u16,
    offset_hi: u32,
    zero: u32,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GateType {
    /// Clears `IF` on entry.
    InterruptGate,
    /// Leaves `IF` as it was.
    TrapGate,
}

impl IdtEntry {
    pub const MISSING: Self = Self {
        offset_lo: 0,
        selector: 0,
        ist_type: IdtGateAttr::new().into_bits(),
        offset_mid: 0,
        offset_hi: 0,
        zero: 0,
    };

    /// Store `handler` and start configuring the gate.
    ///
    /// The gate starts out not present, DPL 0, interrupt type, no IST.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_handler(&mut self, handler: extern "C" fn()) -> IdtEntryBuilder<'_> {
        let addr = handler as usize as u64;
        self.offset_lo = (addr & 0xFFFF) as u16;
        self.offset_mid = ((addr >> 16) & 0xFFFF) as u16;
        self.offset_hi = (addr >> 32) as u32;
        self.ist_type = IdtGateAttr::new()
            .with_typ(IdtGateAttr::INTERRUPT_GATE)
            .into_bits();

        IdtEntryBuilder { entry: self }
    }
}

pub struct IdtEntryBuilder<'a> {
    entry: &'a mut IdtEntry,
}

impl IdtEntryBuilder<'_> {
    #[inline]
    const fn attr(&self) -> IdtGateAttr {
        IdtGateAttr::from_bits(self.entry.ist_type)
    }

    #[inline]
    pub const fn present(self, p: bool) -> Self {
        self.entry.ist_type = self.attr().with_present(p).into_bits();
        self
    }

    /// Lowest privilege allowed to raise this vector with `int n`.
    #[inline]
    pub const fn dpl(self, dpl: Dpl) -> Self {
        self.entry.ist_type = self.attr().with_dpl(dpl.into_bits()).into_bits();
        self
    }

    #[inline]
    pub const fn gate_type(self, gate_type: GateType) -> Self {
        let typ = match gate_type {
            GateType::InterruptGate => IdtGateAttr::INTERRUPT_GATE,
            GateType::TrapGate => IdtGateAttr::TRAP_GATE,
        };
        self.entry.ist_type = self.attr().with_typ(typ).with_s(false).into_bits();
        self
    }

    /// IST slot 1..=7, or 0 for none.
    #[inline]
    pub fn ist(self, idx: u8) -> Self {
        debug_assert!(idx <= 7);
        self.entry.ist_type = self.attr().with_ist(idx).into_bits();
        self
    }

    #[inline]
    pub const fn selector(self, sel: u16) -> Self {
        self.entry.selector = sel;
        self
    }
}

/// Carry out what the dispatcher decided.
///
/// Returns only for [`TrapOutcome::Resume`], with the value for `rax`.
pub fn finish(outcome: TrapOutcome) -> i64 {
    match outcome {
        TrapOutcome::Resume(value) => value,
        // SAFETY: the loader just mapped the image's entry point and stack.
        TrapOutcome::EnterUser(image) => unsafe { userland::enter_user_mode(image) },
        TrapOutcome::Halt(_) => cpu::halt_forever(),
    }
}
