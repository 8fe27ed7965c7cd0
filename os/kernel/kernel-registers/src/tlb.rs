//! TLB maintenance.

use kernel_memory_addresses::VirtualAddress;

/// Drop the TLB entry for the page containing `va`.
///
/// # Safety
/// Ring 0 only.
#[inline]
pub unsafe fn invlpg(va: VirtualAddress) {
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) va.as_u64(), options(nostack, preserves_flags));
    }
}
