//! # Global Descriptor Table
//!
//! Long mode ignores base and limit, but selectors still decide privilege:
//! `iretq` into ring 3 needs user code and data descriptors, and every
//! ring 3 → ring 0 transition needs a loaded TSS to find `rsp0`.
//!
//! ## Layout
//! Index | Selector | Meaning
//! ------|----------|--------
//! 0     | 0x00     | Null
//! 1     | 0x08     | Kernel code (64-bit, DPL=0; [`KERNEL_CS`])
//! 2     | 0x10     | Kernel data (DPL=0; [`KERNEL_DS`])
//! 3     | 0x18     | User data (DPL=3) → with RPL=3: **0x1b** ([`USER_DS`])
//! 4     | 0x20     | User code (64-bit, DPL=3) → with RPL=3: **0x23** ([`USER_CS`])
//! 5/6   | 0x28     | TSS (16-byte system descriptor; [`TSS_SEL`])

pub mod descriptors;
pub mod selectors;
pub mod tss_desc;

use crate::gdt::descriptors::Desc64;
use crate::gdt::selectors::SegmentSelector;
use crate::gdt::tss_desc::TssDesc64;
use crate::privilege::{Dpl, Rpl};
use crate::tss::{Tss64, tss};
use kernel_memory_addresses::VirtualAddress;
use spin::Once;

pub const KERNEL_CS_SEL: SegmentSelector = SegmentSelector::gdt(1, Rpl::Ring0);
pub const KERNEL_DS_SEL: SegmentSelector = SegmentSelector::gdt(2, Rpl::Ring0);
pub const USER_DS_SEL: SegmentSelector = SegmentSelector::gdt(3, Rpl::Ring3);
pub const USER_CS_SEL: SegmentSelector = SegmentSelector::gdt(4, Rpl::Ring3);
pub const TSS_SYS_SEL: SegmentSelector = SegmentSelector::gdt(5, Rpl::Ring0);

pub const KERNEL_CS: u16 = KERNEL_CS_SEL.encode();
pub const KERNEL_DS: u16 = KERNEL_DS_SEL.encode();
pub const USER_DS: u16 = USER_DS_SEL.encode();
pub const USER_CS: u16 = USER_CS_SEL.encode();
pub const TSS_SEL: u16 = TSS_SYS_SEL.encode();

#[allow(clippy::items_after_statements)]
const _: () = {
    assert!(KERNEL_CS == 0x08);
    assert!(KERNEL_DS == 0x10);
    assert!(USER_DS == 0x1b);
    assert!(USER_CS == 0x23);
    assert!(TSS_SEL == 0x28);
    assert!(size_of::<Gdt>() >= GDT_BYTES);
};

/// Five 8-byte descriptors plus the 16-byte TSS descriptor.
const GDT_BYTES: usize = 7 * 8;

static GDT: Once<Gdt> = Once::new();

/// Operand of `lgdt`.
#[repr(C, packed)]
struct DescTablePtr {
    limit: u16,
    base: u64,
}

#[repr(C, align(16))]
pub struct Gdt {
    null: Desc64,
    kcode: Desc64,
    kdata: Desc64,
    udata: Desc64,
    ucode: Desc64,
    tss: TssDesc64,
}

impl Gdt {
    #[allow(clippy::cast_possible_truncation)]
    fn new(tss: &'static Tss64) -> Self {
        let base = VirtualAddress::new(core::ptr::from_ref(tss).addr() as u64);
        let limit = (size_of::<Tss64>() - 1) as u32;
        Self {
            null: Desc64::NULL,
            kcode: Desc64::code(Dpl::Ring0),
            kdata: Desc64::data(Dpl::Ring0),
            udata: Desc64::data(Dpl::Ring3),
            ucode: Desc64::code(Dpl::Ring3),
            tss: TssDesc64::new(base, limit),
        }
    }
}

/// Build the GDT around the TSS, load it, reload every segment register,
/// and load the task register.
///
/// # Safety
/// Must run once, at CPL0, with interrupts disabled.
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn init() {
    let gdt = GDT.call_once(|| Gdt::new(tss()));
    let ptr = DescTablePtr {
        limit: (GDT_BYTES - 1) as u16,
        base: core::ptr::from_ref(gdt).addr() as u64,
    };

    unsafe {
        core::arch::asm!(
            "lgdt [{}]",
            in(reg) &raw const ptr,
            options(readonly, nostack, preserves_flags)
        );

        core::arch::asm!(
            "mov ds, {0:x}",
            "mov es, {0:x}",
            "mov ss, {0:x}",
            "mov fs, {0:x}",
            "mov gs, {0:x}",
            in(reg) KERNEL_DS,
            options(nostack, preserves_flags)
        );

        // Far return to reload CS.
        core::arch::asm!(
            "push {cs}",
            "lea {tmp}, [rip + 2f]",
            "push {tmp}",
            "retfq",
            "2:",
            cs = in(reg) u64::from(KERNEL_CS),
            tmp = lateout(reg) _,
        );

        core::arch::asm!(
            "ltr {0:x}",
            in(reg) TSS_SEL,
            options(nostack, preserves_flags)
        );
    }
    log::debug!("GDT loaded, TSS at selector {TSS_SEL:#x}");
}
