//! Bin
//!
//! A Bin holds the spans of a single size class, and their free blocks.
//!
//! Allocations are served from the partially free span with the lowest address, which concentrates the live blocks
//! in the fewest spans and lets the others drain, and be reclaimed.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::utils;

use super::{
    blocks::BlockStack,
    span::{BlockRef, Span},
};

/// Bin.
#[derive(Default)]
pub(crate) struct Bin {
    //  All spans of the class, by base address.
    spans: BTreeMap<usize, SpanSlot>,
    //  Base addresses of the spans with at least one free block.
    partial: BTreeSet<usize>,
}

impl Bin {
    /// Returns the number of spans held.
    #[cfg(test)]
    pub(crate) fn number_spans(&self) -> usize { self.spans.len() }

    /// Returns the number of free blocks held.
    #[cfg(test)]
    pub(crate) fn number_free(&self) -> usize { self.spans.values().map(|slot| slot.free.len()).sum() }

    /// Adopts a fresh span, all its blocks free.
    pub(crate) fn adopt(&mut self, span: Arc<Span>) {
        let start = utils::address_of(span.base());

        //  Safety:
        //  -   The span is fresh, hence its memory is exclusively owned.
        //  -   The base of the span is page aligned, and block sizes are multiples of MAX_ALIGNMENT.
        let free = unsafe { BlockStack::carve(span.base(), span.block_size(), span.capacity()) };

        debug_assert!(!self.spans.contains_key(&start));

        self.spans.insert(start, SpanSlot { span, free });
        self.partial.insert(start);
    }

    /// Pops a free block, from the partially free span with the lowest address.
    pub(crate) fn pop(&mut self) -> Option<BlockRef> {
        let start = *self.partial.iter().next()?;

        let slot = self.spans.get_mut(&start)?;

        let ptr = slot.free.pop();
        debug_assert!(ptr.is_some());

        if slot.free.is_empty() {
            self.partial.remove(&start);
        }

        ptr.map(|ptr| BlockRef { ptr, span: slot.span.clone() })
    }

    /// Pushes a free block back into its span, returns the number of blocks of the span still out of the bin.
    ///
    /// Blocks are out of the bin either when live, or when cached by a ThreadCache.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the block belongs to one of the spans of the bin, and is neither live nor cached.
    pub(crate) unsafe fn push(&mut self, block: BlockRef) -> usize {
        let start = utils::address_of(block.span.base());

        let slot = match self.spans.get_mut(&start) {
            Some(slot) => slot,
            None => {
                debug_assert!(false, "Unknown span {:#x}", start);
                return usize::MAX;
            },
        };

        debug_assert!(Arc::ptr_eq(&slot.span, &block.span));

        slot.free.push(block.ptr);

        self.partial.insert(start);

        slot.occupancy()
    }

    /// Detaches the span starting at `start`, if all its blocks are free.
    pub(crate) fn detach_free(&mut self, start: usize) -> Option<Arc<Span>> {
        let slot = self.spans.get(&start)?;

        if slot.occupancy() != 0 {
            return None;
        }

        self.partial.remove(&start);

        self.spans.remove(&start).map(|slot| slot.span)
    }

    #[cfg(test)]
    pub(crate) fn occupancy_of(&self, span: &Span) -> Option<usize> {
        self.spans.get(&utils::address_of(span.base())).map(SpanSlot::occupancy)
    }
}

//
//  Implementation Details
//

//  A span, and its free blocks.
struct SpanSlot {
    span: Arc<Span>,
    free: BlockStack,
}

impl SpanSlot {
    //  Returns the number of blocks out of the bin.
    fn occupancy(&self) -> usize { self.span.capacity() - self.free.len() }
}
