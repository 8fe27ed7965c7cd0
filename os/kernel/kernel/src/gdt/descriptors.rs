//! # 64-bit code and data segment descriptors
//!
//! In long mode the CPU ignores base and limit of code and data segments;
//! paging does the protecting. What still matters:
//! - **Type** (code: execute+read, data: read+write),
//! - **S** = 1 (code/data rather than system),
//! - **DPL**,
//! - **P** = 1,
//! - for code, **L** = 1 with **DB** = 0.

use crate::privilege::Dpl;
use bitfield_struct::bitfield;

const TYPE_CODE_EXEC_READ: u8 = 0b1010;
const TYPE_DATA_READ_WRITE: u8 = 0b0010;

/// Bit layout shared by code and data descriptors.
#[bitfield(u64)]
pub struct SegmentDescBits {
    pub limit_lo: u16, // [15:0]   (ignored in long mode)
    pub base_lo: u16,  // [31:16]  (ignored in long mode)
    pub base_mid: u8,  // [39:32]
    #[bits(4)]
    pub typ: u8, // [43:40]
    pub s: bool,       // [44]
    #[bits(2)]
    pub dpl: u8, // [46:45]
    pub p: bool,       // [47]
    #[bits(4)]
    pub limit_hi: u8, // [51:48]
    pub avl: bool,     // [52]
    pub l: bool,       // [53]     64-bit code
    pub db: bool,      // [54]     0 when L=1
    pub g: bool,       // [55]
    pub base_hi: u8,   // [63:56]
}

/// One 8-byte GDT entry.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Desc64(u64);

impl Desc64 {
    pub const NULL: Self = Self(0);

    /// 64-bit code segment (execute+read, `L=1`, `DB=0`).
    pub const fn code(dpl: Dpl) -> Self {
        let bits = SegmentDescBits::new()
            .with_typ(TYPE_CODE_EXEC_READ)
            .with_s(true)
            .with_dpl(dpl.into_bits())
            .with_p(true)
            .with_l(true)
            .with_db(false);
        Self(bits.into_bits())
    }

    /// Data/stack segment (read+write).
    pub const fn data(dpl: Dpl) -> Self {
        let bits = SegmentDescBits::new()
            .with_typ(TYPE_DATA_READ_WRITE)
            .with_s(true)
            .with_dpl(dpl.into_bits())
            .with_p(true);
        Self(bits.into_bits())
    }

    #[inline]
    pub const fn to_u64(self) -> u64 {
        self.0
    }
}

const _: () = {
    assert!(Desc64::code(Dpl::Ring0).to_u64() == 0x0020_9a00_0000_0000);
    assert!(Desc64::data(Dpl::Ring0).to_u64() == 0x0000_9200_0000_0000);
    assert!(Desc64::code(Dpl::Ring3).to_u64() == 0x0020_fa00_0000_0000);
    assert!(Desc64::data(Dpl::Ring3).to_u64() == 0x0000_f200_0000_0000);
};
