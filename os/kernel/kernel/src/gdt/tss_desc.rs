use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualAddress;

/// Low 8 bytes of a 64-bit *Available TSS* descriptor (type = 0x9, S=0).
#[bitfield(u64)]
pub struct TssDescLow {
    pub limit_lo: u16, // [15:0]
    pub base_lo: u16,  // [31:16]

    pub base_mid: u8, // [39:32]
    #[bits(4)]
    pub typ: u8, // [43:40] = 0x9 (Available 64-bit TSS)
    pub s: bool,      // [44]    = 0 (system)
    #[bits(2)]
    pub dpl: u8, // [46:45]
    pub p: bool,      // [47]

    #[bits(4)]
    pub limit_hi: u8, // [51:48]
    pub avl: bool,   // [52]
    #[bits(2)]
    _zero: u8, // [54:53] must be 0 for system types
    pub g: bool,     // [55]
    pub base_hi: u8, // [63:56]
}

/// High 8 bytes of a 64-bit TSS descriptor: `base[63:32]`, reserved=0.
#[bitfield(u64)]
pub struct TssDescHigh {
    pub base_upper: u32, // [31:0]  base[63:32]
    _reserved: u32,      // [63:32] must be 0
}

/// 16-byte TSS system descriptor (two consecutive GDT entries).
#[repr(C)]
#[derive(Copy, Clone)]
pub struct TssDesc64 {
    pub low: TssDescLow,
    pub high: TssDescHigh,
}

impl TssDesc64 {
    /// Present, DPL 0, byte-granular descriptor for the TSS at `base`.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(base: VirtualAddress, limit: u32) -> Self {
        let base = base.as_u64();
        let low = TssDescLow::new()
            .with_limit_lo((limit & 0xFFFF) as u16)
            .with_base_lo((base & 0xFFFF) as u16)
            .with_base_mid(((base >> 16) & 0xFF) as u8)
            .with_typ(0x9)
            .with_s(false)
            .with_dpl(0)
            .with_p(true)
            .with_limit_hi(((limit >> 16) & 0xF) as u8)
            .with_base_hi(((base >> 24) & 0xFF) as u8);
        let high = TssDescHigh::new().with_base_upper((base >> 32) as u32);
        Self { low, high }
    }
}

const _: () = {
    assert!(size_of::<TssDesc64>() == 16);
};
