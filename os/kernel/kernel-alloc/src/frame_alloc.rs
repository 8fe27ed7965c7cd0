//! # LIFO Free-List Frame Allocator

use kernel_info::boot::UsableRange;
use kernel_vmem::{FrameAlloc, PAGE_SIZE, PhysMapper, PhysicalAddress};
use log::{debug, warn};

/// Why a frame was not accepted back into the pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("refusing to free the null frame")]
    Null,
    #[error("refusing to free unaligned address {0}")]
    Unaligned(PhysicalAddress),
}

/// First word of every free frame.
#[repr(C)]
struct FreeFrame {
    next: PhysicalAddress,
}

/// Pool of free 4 KiB frames kept as a singly linked list.
///
/// The links live inside the free frames themselves, so the pool needs no
/// memory of its own. Frames come back out in LIFO order.
pub struct FreeListFrameAlloc<M: PhysMapper> {
    head: PhysicalAddress,
    free: usize,
    mapper: M,
}

impl<M: PhysMapper> FreeListFrameAlloc<M> {
    /// An empty pool.
    pub const fn new(mapper: M) -> Self {
        Self {
            head: PhysicalAddress::zero(),
            free: 0,
            mapper,
        }
    }

    /// Add every whole frame inside `ranges`, in order.
    ///
    /// Ranges must not overlap each other or memory already in use. A frame
    /// at physical address zero is skipped. Returns the number of frames added.
    pub fn init<I>(&mut self, ranges: I) -> usize
    where
        I: IntoIterator<Item = UsableRange>,
    {
        let mut added = 0;
        for range in ranges {
            let range = range.page_aligned();
            let mut frame = range.base;
            while frame < range.end {
                if self.free(frame).is_ok() {
                    added += 1;
                }
                frame += PAGE_SIZE;
            }
            debug!("frame pool: added {} - {}", range.base, range.end);
        }
        added
    }

    /// Pop the most recently freed frame.
    pub fn alloc(&mut self) -> Option<PhysicalAddress> {
        if self.head.is_null() {
            return None;
        }
        let frame = self.head;
        // SAFETY: every frame on the list is free RAM covered by the mapper.
        self.head = unsafe { self.mapper.phys_to_mut::<FreeFrame>(frame) }.next;
        self.free -= 1;
        Some(frame)
    }

    /// Push `frame` onto the list.
    ///
    /// # Errors
    /// Null or unaligned addresses are rejected and the list is left unchanged.
    pub fn free(&mut self, frame: PhysicalAddress) -> Result<(), FrameError> {
        if frame.is_null() {
            return Err(FrameError::Null);
        }
        if !frame.is_page_aligned() {
            return Err(FrameError::Unaligned(frame));
        }
        // SAFETY: the caller hands over ownership of a whole, mapped frame.
        unsafe { self.mapper.phys_to_mut::<FreeFrame>(frame) }.next = self.head;
        self.head = frame;
        self.free += 1;
        Ok(())
    }

    /// Number of frames currently in the pool.
    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.free
    }

    /// Walk the list from the head.
    pub fn iter(&self) -> impl Iterator<Item = PhysicalAddress> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            if cursor.is_null() {
                return None;
            }
            let frame = cursor;
            // SAFETY: see `alloc`.
            cursor = unsafe { self.mapper.phys_to_mut::<FreeFrame>(frame) }.next;
            Some(frame)
        })
    }
}

impl<M: PhysMapper> FrameAlloc for FreeListFrameAlloc<M> {
    #[inline]
    fn alloc_4k(&mut self) -> Option<PhysicalAddress> {
        self.alloc()
    }

    fn free_4k(&mut self, frame: PhysicalAddress) {
        if let Err(e) = self.free(frame) {
            warn!("{e}");
        }
    }
}
