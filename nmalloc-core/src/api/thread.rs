//! Thread Cache
//!
//! The Thread Cache is a per-worker cache of Small blocks; the user is expected to create one for each of the threads
//! they use, and on each allocation to refer to the thread's own cache.
//!
//! A Thread Cache holds, per size class, a bounded magazine of blocks:
//!
//! -   On allocation, a block is popped from the magazine, which is refilled by a batch from the Allocator if empty.
//! -   On deallocation, the block is pushed into the magazine, whose oldest blocks are flushed by a batch to the
//!     Allocator past its capacity.
//!
//! Blocks allocated from another Thread Cache, or directly from the Allocator, may be freed in any Thread Cache: the
//! owning span is resolved through the Allocator.
//!
//! A Thread Cache is exclusively owned, as witnessed by `&mut self`, and flushed when dropped.

use core::ptr::{self, NonNull};

use log::trace;

use crate::{AllocError, Allocator, ClassSize, Configuration, PageProvider, Properties};
use crate::internals::{
    span::BlockRef,
    span_index::Region,
    thread_cache::Magazine,
};

use super::allocator::zeroed_size;

/// Thread Cache.
pub struct ThreadCache<'a, C, P>
    where
        C: Configuration,
        P: PageProvider,
{
    allocator: &'a Allocator<C, P>,
    magazines: Box<[Magazine]>,
}

impl<'a, C, P> ThreadCache<'a, C, P>
    where
        C: Configuration,
        P: PageProvider,
{
    /// Allocates `size` bytes.
    ///
    /// The returned pointer is aligned on `MAX_ALIGNMENT`, and at least `size` bytes are usable.
    ///
    /// Returns `InvalidArgument` if `size` is 0, and `OutOfMemory` if the PageProvider fails.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let class_size = match self.allocator.classify(size)? {
            Some(class_size) => class_size,
            None => return self.allocator.allocate_large(size),
        };

        let block = self.pop(class_size).map_err(|error| error.for_requested_size(size))?;

        //  Safety:
        //  -   The block was cached, hence is not live.
        unsafe { block.span.mark_allocated(block.ptr) };

        Ok(block.ptr)
    }

    /// Allocates `count * size` bytes, zeroed.
    ///
    /// Returns `IntegerOverflow` if `count * size` overflows, and otherwise behaves as `allocate`.
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        let total = zeroed_size(count, size)?;

        let result = self.allocate(total)?;

        //  Safety:
        //  -   At least `total` bytes are usable.
        unsafe { ptr::write_bytes(result.as_ptr(), 0, total) };

        Ok(result)
    }

    /// Deallocates the memory at `ptr`.
    ///
    /// Returns `InvalidFree` if `ptr` is not currently allocated, in which case nothing is done.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the memory is no longer referenced, if `ptr` is currently allocated.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        match self.allocator.lookup(ptr) {
            Some(Region::Span(span)) => {
                span.mark_freed(ptr)?;

                self.push(BlockRef { ptr, span });

                Ok(())
            },
            //  Safety:
            //  -   `large` was looked up from `ptr`, and the memory is no longer referenced.
            Some(Region::Large(large)) => self.allocator.deallocate_large(ptr, &large),
            None => Err(AllocError::invalid_free(ptr)),
        }
    }

    /// Returns the number of usable bytes at `ptr`.
    ///
    /// Returns `InvalidFree` if `ptr` is not currently allocated.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> Result<usize, AllocError> { self.allocator.usable_size(ptr) }

    /// Returns the number of blocks currently cached.
    pub fn cached_blocks(&self) -> usize { self.magazines.iter().map(Magazine::len).sum() }

    /// Returns all cached blocks to the Allocator.
    pub fn flush(&mut self) {
        for (class, magazine) in self.magazines.iter_mut().enumerate() {
            if magazine.is_empty() {
                continue;
            }

            trace!("Flushing all {} blocks of class {}", magazine.len(), class);

            //  Safety:
            //  -   Cached blocks are neither live, nor cached anywhere else.
            unsafe { self.allocator.deallocate_batch(ClassSize::new(class), magazine.drain_all()) };
        }
    }

    pub(crate) fn new(allocator: &'a Allocator<C, P>) -> Self {
        let magazines = (0..Properties::<C>::number_classes()).map(|_| Magazine::default()).collect();

        Self { allocator, magazines }
    }

    //  Pops a block of the class, refilling the magazine if necessary.
    fn pop(&mut self, class_size: ClassSize) -> Result<BlockRef, AllocError> {
        let magazine = &mut self.magazines[class_size.value()];

        if let Some(block) = magazine.pop() {
            return Ok(block);
        }

        let refilled = self.allocator.allocate_batch(class_size, C::REFILL_BATCH.max(1), |block| magazine.push(block))?;

        trace!("Refilled {} blocks of class {}", refilled, class_size.value());

        magazine.pop().ok_or(AllocError::OutOfMemory { size: class_size.size() })
    }

    //  Pushes a block, flushing the oldest blocks of the magazine past its capacity.
    fn push(&mut self, block: BlockRef) {
        let class_size = block.span.class_size();
        let magazine = &mut self.magazines[class_size.value()];

        magazine.push(block);

        if magazine.len() <= C::THREAD_CACHE_CAPACITY {
            return;
        }

        let count = (magazine.len() - C::THREAD_CACHE_CAPACITY).max(C::REFILL_BATCH);

        trace!("Flushing {} blocks of class {}", count, class_size.value());

        //  Safety:
        //  -   Cached blocks are neither live, nor cached anywhere else.
        unsafe { self.allocator.deallocate_batch(class_size, magazine.drain_oldest(count)) };
    }
}

impl<'a, C, P> Drop for ThreadCache<'a, C, P>
    where
        C: Configuration,
        P: PageProvider,
{
    fn drop(&mut self) { self.flush(); }
}
