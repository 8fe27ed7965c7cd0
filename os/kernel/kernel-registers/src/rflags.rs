use bitfield_struct::bitfield;

/// RFLAGS as far as ring transitions care.
///
/// Only the bits the kernel sets or inspects are named; bit 1 is fixed to
/// one by the architecture and modelled as such.
#[bitfield(u64, order = Lsb)]
pub struct Rflags {
    /// CF
    pub carry: bool,

    #[bits(default = true)]
    _always_one: bool,

    #[bits(7)]
    _arithmetic_and_trap: u8,

    /// IF: maskable interrupts are delivered.
    pub interrupt_enable: bool,

    /// DF
    pub direction: bool,

    /// OF
    pub overflow: bool,

    /// IOPL
    #[bits(2)]
    pub iopl: u8,

    #[bits(50)]
    _upper: u64,
}

impl Rflags {
    /// Flags image for the first instruction of a user program:
    /// interrupts on, IOPL 0, everything else clear (`0x202`).
    #[must_use]
    pub const fn user_entry() -> Self {
        Self::new().with_interrupt_enable(true)
    }
}
