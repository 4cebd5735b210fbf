//! Size-Class Allocator
//!
//! The shared back-end of Small allocations: one Bin per size class, each behind its own lock.
//!
//! When a Bin runs out of free blocks, a fresh span is requested from the Span Manager, outside of the lock of the
//! Bin, then carved up into blocks. When a span becomes fully free, it is detached from its Bin by the Coalescer, then
//! released to the Span Manager, once again outside of the lock of the Bin.

use log::trace;
use parking_lot::Mutex;

use crate::{AllocError, ClassSize, Configuration, PageProvider};

use super::{
    bin::Bin,
    coalescer,
    span::BlockRef,
    span_manager::SpanManager,
};

pub(crate) struct SizeClassAllocator {
    bins: Box<[Mutex<Bin>]>,
}

impl SizeClassAllocator {
    /// Creates an instance, with `number_classes` empty bins.
    pub(crate) fn new(number_classes: usize) -> Self {
        Self { bins: (0..number_classes).map(|_| Mutex::new(Bin::default())).collect() }
    }

    /// Allocates a single block of the given class size.
    pub(crate) fn allocate<C, P>(&self, spans: &SpanManager<C, P>, class_size: ClassSize) -> Result<BlockRef, AllocError>
        where
            C: Configuration,
            P: PageProvider,
    {
        let mut result = None;

        self.allocate_batch(spans, class_size, 1, |block| result = Some(block))?;

        result.ok_or(AllocError::OutOfMemory { size: class_size.size() })
    }

    /// Allocates up to `count` blocks of the given class size, and at least one, handing each to `sink`.
    ///
    /// Returns the number of blocks allocated.
    pub(crate) fn allocate_batch<C, P, F>(&self, spans: &SpanManager<C, P>, class_size: ClassSize, count: usize, mut sink: F)
        -> Result<usize, AllocError>
        where
            C: Configuration,
            P: PageProvider,
            F: FnMut(BlockRef),
    {
        debug_assert!(count > 0);

        let bin = &self.bins[class_size.value()];

        //  Fast Path.
        {
            let mut bin = bin.lock();

            let popped = Self::pop_into(&mut bin, count, &mut sink);

            if popped > 0 {
                trace!("Allocated {} blocks of class {}", popped, class_size.value());
                return Ok(popped);
            }
        }

        //  Slow Path: the bin is exhausted.
        let span = spans.acquire_span(class_size)?;

        let mut bin = bin.lock();
        bin.adopt(span);

        let popped = Self::pop_into(&mut bin, count, &mut sink);

        trace!("Allocated {} blocks of class {} from a fresh span", popped, class_size.value());

        Ok(popped)
    }

    /// Deallocates the blocks, all of the given class size.
    ///
    /// The spans rendered fully free are released to the Span Manager.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the blocks were allocated by `self`, and are neither live nor cached.
    pub(crate) unsafe fn deallocate_batch<C, P, I>(&self, spans: &SpanManager<C, P>, class_size: ClassSize, blocks: I)
        where
            C: Configuration,
            P: PageProvider,
            I: IntoIterator<Item = BlockRef>,
    {
        let released: Vec<_> = {
            let mut bin = self.bins[class_size.value()].lock();

            blocks.into_iter()
                .filter_map(|block| {
                    debug_assert_eq!(class_size, block.span.class_size());

                    //  Safety:
                    //  -   The block belongs to this bin, and is neither live nor cached, as assumed.
                    coalescer::coalesce(&mut bin, block)
                })
                .collect()
        };

        for span in released {
            spans.release_span(span);
        }
    }

    fn pop_into<F>(bin: &mut Bin, count: usize, sink: &mut F) -> usize
        where
            F: FnMut(BlockRef),
    {
        let mut popped = 0;

        while popped < count {
            match bin.pop() {
                Some(block) => sink(block),
                None => break,
            }

            popped += 1;
        }

        popped
    }
}
