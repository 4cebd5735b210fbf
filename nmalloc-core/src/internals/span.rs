//! Span
//!
//! A Span is a contiguous run of pages dedicated to exactly one size class, carved up in blocks of the size of its
//! class.
//!
//! The Span itself only tracks which of its blocks are live, that is handed out to a caller. The free blocks are linked
//! together by the Bin owning the span, and the blocks cached by a ThreadCache are neither live nor free.

use core::ptr::NonNull;

use std::sync::Arc;

use crate::{AllocError, ClassSize, MappedPages, PowerOf2, utils};

use super::live_mask::LiveMask;

/// Span.
pub(crate) struct Span {
    base: NonNull<u8>,
    pages: usize,
    bytes: usize,
    class_size: ClassSize,
    capacity: usize,
    live: LiveMask,
}

impl Span {
    /// Creates a Span over the mapped pages, for the given class size.
    pub(crate) fn new(mapped: MappedPages, page_size: PowerOf2, class_size: ClassSize) -> Self {
        let bytes = mapped.pages * page_size;
        let capacity = class_size.number_elements(bytes);

        debug_assert!(capacity > 0);

        Self { base: mapped.base, pages: mapped.pages, bytes, class_size, capacity, live: LiveMask::new(capacity) }
    }

    /// Returns the base address of the span.
    pub(crate) fn base(&self) -> NonNull<u8> { self.base }

    /// Returns the address past the end of the span.
    pub(crate) fn end(&self) -> usize { utils::address_of(self.base) + self.bytes }

    /// Returns the mapped pages backing this span.
    pub(crate) fn mapped(&self) -> MappedPages { MappedPages { base: self.base, pages: self.pages } }

    /// Returns the class size of the span.
    pub(crate) fn class_size(&self) -> ClassSize { self.class_size }

    /// Returns the size of the blocks of the span.
    pub(crate) fn block_size(&self) -> usize { self.class_size.size() }

    /// Returns the number of blocks of the span.
    pub(crate) fn capacity(&self) -> usize { self.capacity }

    /// Returns whether the address lies within the span, or not.
    pub(crate) fn contains(&self, address: usize) -> bool {
        let base = utils::address_of(self.base);

        base <= address && address < self.end()
    }

    /// Returns the index of the block starting at `ptr`, if `ptr` is the start of a block of this span.
    pub(crate) fn block_index(&self, ptr: NonNull<u8>) -> Option<usize> {
        let address = utils::address_of(ptr);

        if !self.contains(address) {
            return None;
        }

        let offset = address - utils::address_of(self.base);

        if offset % self.block_size() != 0 {
            return None;
        }

        let index = offset / self.block_size();

        if index < self.capacity { Some(index) } else { None }
    }

    /// Marks the block as handed out to a caller.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `ptr` is the start of a block of this span.
    /// -   Assumes that the block is not live.
    pub(crate) unsafe fn mark_allocated(&self, ptr: NonNull<u8>) {
        let index = self.block_index(ptr);
        debug_assert!(index.is_some());

        if let Some(index) = index {
            let _claimed = self.live.claim(index);
            debug_assert!(_claimed, "{:x} already live", utils::address_of(ptr));
        }
    }

    /// Marks the block as returned by a caller.
    ///
    /// Returns an error if `ptr` is not the start of a live block of this span.
    pub(crate) fn mark_freed(&self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        match self.block_index(ptr) {
            Some(index) if self.live.release(index) => Ok(()),
            _ => Err(AllocError::invalid_free(ptr)),
        }
    }

    /// Returns whether `ptr` is the start of a live block of this span.
    pub(crate) fn is_live(&self, ptr: NonNull<u8>) -> bool {
        self.block_index(ptr).map(|index| self.live.is_set(index)).unwrap_or(false)
    }

    /// Returns the number of live blocks.
    pub(crate) fn live_blocks(&self) -> usize { self.live.count() }
}

//  Safety:
//  -   The Span only holds the address of its pages, which it never dereferences, and atomics.
unsafe impl Send for Span {}

//  Safety:
//  -   The Span only holds the address of its pages, which it never dereferences, and atomics.
unsafe impl Sync for Span {}

/// BlockRef.
///
/// A block, and the span it belongs to.
pub(crate) struct BlockRef {
    /// The start of the block.
    pub(crate) ptr: NonNull<u8>,
    /// The span of the block.
    pub(crate) span: Arc<Span>,
}
