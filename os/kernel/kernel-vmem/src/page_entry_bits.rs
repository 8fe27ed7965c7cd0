use bitfield_struct::bitfield;

/// A 64-bit x86-64 paging-structure entry in its raw hardware layout.
///
/// This is the wire format the MMU reads. The kernel never reasons about
/// these bits directly; it goes through [`PageEntry`](crate::PageEntry),
/// which decodes the fields it cares about and encodes them back.
///
/// ### Bit layout
///
/// | Bits  | Name | Meaning |
/// |-------|------|---------|
/// | 0     | `P`  | present |
/// | 1     | `RW` | writable |
/// | 2     | `US` | user accessible |
/// | 3     | `PWT`| write-through |
/// | 4     | `PCD`| cache disable |
/// | 5     | `A`  | accessed |
/// | 6     | `D`  | dirty (leaf only) |
/// | 7     | `PS` | large page (PDPT/PD only) |
/// | 8     | `G`  | global (leaf only) |
/// | 9–11  |      | available to software |
/// | 12–51 |      | physical frame number |
/// | 52–58 |      | available to software |
/// | 59–62 | `PK` | protection key |
/// | 63    | `NX` | execute disable |
///
/// ```rust
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::new()
///     .with_present(true)
///     .with_writable(true)
///     .with_frame_number(0x123);
/// assert_eq!(e.into_bits(), 0x0012_3003);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5); set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6); set by the CPU on the first write through a leaf.
    pub dirty: bool,

    /// Page Size (PS, bit 7). Set in a PDPTE or PDE that maps a 1 GiB or
    /// 2 MiB page directly.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global: bool,

    #[bits(3)]
    pub os_available_low: u8,

    /// Physical frame number, i.e. bits 12..52 of the target address.
    #[bits(40)]
    pub frame_number: u64,

    #[bits(7)]
    pub os_available_high: u8,

    #[bits(4)]
    pub protection_key: u8,

    /// Execute Disable (NX, bit 63).
    pub no_execute: bool,
}
