//! Host-side stand-ins for physical memory and the TLB.
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for the tests of crates built on top of it.

use crate::{FrameAlloc, PhysMapper, Tlb};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell, UnsafeCell};
use kernel_memory_addresses::{PAGE_SHIFT, PAGE_SIZE, PhysicalAddress, VirtualAddress};

#[repr(C, align(4096))]
struct Frame([u8; 4096]);

/// Simulated RAM: physical address `n * 4096` is frame `n` of a vector.
///
/// Frame 0 exists but is never handed out by [`VecFrameAlloc::covering`],
/// since the zero address means "no frame".
pub struct SimRam {
    frames: Vec<UnsafeCell<Frame>>,
}

impl SimRam {
    #[must_use]
    pub fn with_frames(n: usize) -> Self {
        Self {
            frames: (0..n).map(|_| UnsafeCell::new(Frame([0; 4096]))).collect(),
        }
    }

    /// Enough frames to back `[0, end)`.
    #[must_use]
    pub fn covering(end: u64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self::with_frames(end.div_ceil(PAGE_SIZE) as usize)
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Overwrite every byte of RAM with `byte`.
    pub fn fill(&self, byte: u8) {
        for frame in &self.frames {
            // SAFETY: no references into RAM are live while tests call this.
            unsafe { (*frame.get()).0.fill(byte) };
        }
    }
}

impl PhysMapper for SimRam {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        #[allow(clippy::cast_possible_truncation)]
        let index = (pa.as_u64() >> PAGE_SHIFT) as usize;
        #[allow(clippy::cast_possible_truncation)]
        let offset = pa.frame_offset() as usize;
        assert!(
            index < self.frames.len(),
            "{pa} is outside simulated RAM ({} frames)",
            self.frames.len()
        );
        assert!(offset + size_of::<T>() <= 4096, "{pa} straddles a frame");

        // SAFETY: in bounds; the caller guarantees the type and exclusivity.
        unsafe { &mut *self.frames[index].get().cast::<u8>().add(offset).cast::<T>() }
    }
}

/// LIFO frame pool over a vector, for exercising page tables in isolation.
#[derive(Debug, Default)]
pub struct VecFrameAlloc {
    free: Vec<PhysicalAddress>,
}

impl VecFrameAlloc {
    /// Every frame of `ram` except frame 0, lowest address handed out first.
    #[must_use]
    pub fn covering(ram: &SimRam) -> Self {
        let free = (1..ram.frame_count() as u64)
            .rev()
            .map(|n| PhysicalAddress::new(n << PAGE_SHIFT))
            .collect();
        Self { free }
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl FrameAlloc for VecFrameAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalAddress> {
        self.free.pop()
    }

    fn free_4k(&mut self, frame: PhysicalAddress) {
        self.free.push(frame);
    }
}

/// A [`Tlb`] that remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingTlb {
    invalidated: RefCell<Vec<VirtualAddress>>,
    flushes: Cell<usize>,
}

impl RecordingTlb {
    #[must_use]
    pub fn invalidated(&self) -> Vec<VirtualAddress> {
        self.invalidated.borrow().clone()
    }

    #[must_use]
    pub fn flushes(&self) -> usize {
        self.flushes.get()
    }
}

impl Tlb for RecordingTlb {
    fn invalidate_page(&self, va: VirtualAddress) {
        self.invalidated.borrow_mut().push(va);
    }

    fn flush_all(&self) {
        self.flushes.set(self.flushes.get() + 1);
    }
}
