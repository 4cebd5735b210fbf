//! Free-List Coalescer
//!
//! The blocks of a span all have the same size, hence merging adjacent free blocks only ever matters once all the
//! blocks of a span are free: the span is then detached from its bin, to be handed back to the Span Manager.
//!
//! There is no coalescing across spans, nor of Large allocations.

use std::sync::Arc;

use log::error;

use crate::utils;

use super::{
    bin::Bin,
    span::{BlockRef, Span},
};

/// Returns the block to its bin, and detaches its span if it is now fully free.
///
/// #   Safety
///
/// -   Assumes that the block belongs to one of the spans of the bin, and is neither live nor cached.
pub(crate) unsafe fn coalesce(bin: &mut Bin, block: BlockRef) -> Option<Arc<Span>> {
    let span = block.span.clone();

    //  Safety:
    //  -   As assumed.
    let occupancy = bin.push(block);

    if occupancy != 0 {
        return None;
    }

    let start = utils::address_of(span.base());

    //  All blocks are back in the bin, none should be live.
    let live = span.live_blocks();

    if live != 0 {
        error!("Span {:#x} has all its blocks free, yet {} are live", start, live);
        return None;
    }

    bin.detach_free(start)
}
