//! Magazines of a ThreadCache.
//!
//! A Magazine is the private free list of a ThreadCache for a single size class: blocks are handed out most recently
//! cached first, and flushed back oldest first.

use std::collections::VecDeque;

use super::span::BlockRef;

/// Magazine.
#[derive(Default)]
pub(crate) struct Magazine(VecDeque<BlockRef>);

impl Magazine {
    /// Returns the number of cached blocks.
    pub(crate) fn len(&self) -> usize { self.0.len() }

    /// Returns whether the magazine is empty, or not.
    pub(crate) fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Pops the most recently cached block, if any.
    pub(crate) fn pop(&mut self) -> Option<BlockRef> { self.0.pop_back() }

    /// Caches a block.
    pub(crate) fn push(&mut self, block: BlockRef) { self.0.push_back(block); }

    /// Removes up to `count` of the oldest cached blocks.
    pub(crate) fn drain_oldest(&mut self, count: usize) -> impl Iterator<Item = BlockRef> + '_ {
        let count = count.min(self.0.len());

        self.0.drain(..count)
    }

    /// Removes all the cached blocks.
    pub(crate) fn drain_all(&mut self) -> impl Iterator<Item = BlockRef> + '_ { self.0.drain(..) }
}
