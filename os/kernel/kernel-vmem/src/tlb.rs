use kernel_memory_addresses::VirtualAddress;

/// Translation-cache maintenance after page-table edits.
///
/// [`AddressSpace`](crate::AddressSpace) calls [`invalidate_page`](Tlb::invalidate_page)
/// after every leaf change and [`flush_all`](Tlb::flush_all) after tearing
/// down whole subtrees.
pub trait Tlb {
    fn invalidate_page(&self, va: VirtualAddress);
    fn flush_all(&self);
}

/// The executing CPU's TLB.
#[cfg(feature = "asm")]
#[derive(Debug, Default, Copy, Clone)]
pub struct CpuTlb;

#[cfg(feature = "asm")]
impl Tlb for CpuTlb {
    #[inline]
    fn invalidate_page(&self, va: VirtualAddress) {
        // SAFETY: the kernel runs in ring 0.
        unsafe { kernel_registers::tlb::invlpg(va) }
    }

    fn flush_all(&self) {
        use kernel_registers::{Cr3, LoadRegisterUnsafe, StoreRegisterUnsafe};
        // SAFETY: reloading CR3 with its current value only drops cached entries.
        unsafe {
            let cr3 = Cr3::load_unsafe();
            cr3.store_unsafe();
        }
    }
}

impl<T: Tlb + ?Sized> Tlb for &T {
    #[inline]
    fn invalidate_page(&self, va: VirtualAddress) {
        (**self).invalidate_page(va);
    }

    #[inline]
    fn flush_all(&self) {
        (**self).flush_all();
    }
}
