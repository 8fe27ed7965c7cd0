#[cfg(feature = "asm")]
use crate::LoadRegisterUnsafe;
use kernel_memory_addresses::VirtualAddress;

/// CR2: Page-Fault Linear Address.
///
/// Written by the CPU on every `#PF`; the kernel only ever reads it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cr2(VirtualAddress);

impl Cr2 {
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(VirtualAddress::new(bits))
    }

    #[must_use]
    pub const fn fault_address(self) -> VirtualAddress {
        self.0
    }
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr2 {
    unsafe fn load_unsafe() -> Self {
        let cr2: u64;
        unsafe {
            core::arch::asm!("mov {}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr2)
    }
}
