//! Allocator
//!
//! The Allocator is the shared back-end, safe to use from any number of threads concurrently.
//!
//! It can be used directly, each operation then synchronizing with the other threads, or through a `ThreadCache`,
//! which amortizes the synchronization cost over batches of blocks.

use core::ptr::{self, NonNull};

use log::{Level, debug, log_enabled};

use crate::{AllocError, Category, ClassSize, Configuration, PageProvider, Properties, Statistics, ThreadCache, utils};
use crate::internals::{
    large_allocator,
    size_class_allocator::SizeClassAllocator,
    span::BlockRef,
    span_index::Region,
    span_manager::SpanManager,
};

/// Allocator.
///
/// An explicitly constructed allocator, owning all the memory it maps from its PageProvider.
///
/// Dropping the Allocator unmaps all the memory it still holds, whether still in use or not.
pub struct Allocator<C, P>
    where
        C: Configuration,
        P: PageProvider,
{
    size_classes: SizeClassAllocator,
    spans: SpanManager<C, P>,
}

impl<C, P> Allocator<C, P>
    where
        C: Configuration,
        P: PageProvider,
{
    /// Creates an instance, mapping memory lazily from `provider`.
    pub fn new(provider: P) -> Self {
        let size_classes = SizeClassAllocator::new(Properties::<C>::number_classes());
        let spans = SpanManager::new(provider);

        Self { size_classes, spans }
    }

    /// Returns the PageProvider.
    pub fn provider(&self) -> &P { self.spans.provider() }

    /// Allocates `size` bytes.
    ///
    /// The returned pointer is aligned on `MAX_ALIGNMENT`, and at least `size` bytes are usable.
    ///
    /// Returns `InvalidArgument` if `size` is 0, and `OutOfMemory` if the PageProvider fails.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        match self.classify(size)? {
            Some(class_size) => {
                let block = self.size_classes.allocate(&self.spans, class_size)
                    .map_err(|error| error.for_requested_size(size))?;

                //  Safety:
                //  -   The block was just popped from its bin, hence is not live.
                unsafe { block.span.mark_allocated(block.ptr) };

                Ok(block.ptr)
            },
            None => large_allocator::allocate(&self.spans, size),
        }
    }

    /// Allocates `count * size` bytes, zeroed.
    ///
    /// Returns `IntegerOverflow` if `count * size` overflows, and otherwise behaves as `allocate`.
    pub fn zero_allocate(&self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
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
    pub unsafe fn free(&self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        match self.spans.lookup(utils::address_of(ptr)) {
            Some(Region::Span(span)) => {
                span.mark_freed(ptr)?;

                let class_size = span.class_size();

                //  Safety:
                //  -   The block is no longer live, and not cached.
                self.size_classes.deallocate_batch(&self.spans, class_size, Some(BlockRef { ptr, span }));

                Ok(())
            },
            //  Safety:
            //  -   `large` was looked up from `ptr`, and the memory is no longer referenced.
            Some(Region::Large(large)) => large_allocator::deallocate(&self.spans, ptr, &large),
            None => Err(AllocError::invalid_free(ptr)),
        }
    }

    /// Returns the number of usable bytes at `ptr`.
    ///
    /// For Small allocations, this is the block size of their size class; for Large allocations, the requested size.
    ///
    /// Returns `InvalidFree` if `ptr` is not currently allocated.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> Result<usize, AllocError> {
        match self.spans.lookup(utils::address_of(ptr)) {
            Some(Region::Span(span)) if span.is_live(ptr) => Ok(span.block_size()),
            //  Safety:
            //  -   `large` was looked up from `ptr`, and is registered hence live.
            Some(Region::Large(large)) => unsafe { large_allocator::usable_size(ptr, &large) },
            _ => Err(AllocError::invalid_free(ptr)),
        }
    }

    /// Returns a snapshot of the memory held.
    pub fn statistics(&self) -> Statistics { self.spans.statistics() }

    /// Unmaps all cached spans, returns the number of pages unmapped.
    pub fn trim(&self) -> usize {
        let pages = self.spans.trim();

        if log_enabled!(Level::Debug) {
            debug!("Trimmed {} pages, overhead ratio now {:?}", pages, self.statistics().overhead_ratio());
        }

        pages
    }

    /// Creates a ThreadCache, backed by this Allocator.
    pub fn thread_cache(&self) -> ThreadCache<'_, C, P> { ThreadCache::new(self) }

    //  Returns the class size of the allocation, if Small.
    pub(crate) fn classify(&self, size: usize) -> Result<Option<ClassSize>, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidArgument);
        }

        match Properties::<C>::category_of_size(size) {
            Category::Small => Ok(Properties::<C>::class_size_of_size(size)),
            Category::Large => Ok(None),
        }
    }

    //  Returns the span containing `ptr`, or the Large allocation.
    pub(crate) fn lookup(&self, ptr: NonNull<u8>) -> Option<Region> { self.spans.lookup(utils::address_of(ptr)) }

    //  Allocates up to `count` blocks, and at least one, of the given class size; the blocks are not marked live.
    pub(crate) fn allocate_batch<F>(&self, class_size: ClassSize, count: usize, sink: F) -> Result<usize, AllocError>
        where
            F: FnMut(BlockRef),
    {
        self.size_classes.allocate_batch(&self.spans, class_size, count, sink)
    }

    //  Deallocates blocks of the given class size.
    //
    //  Safety:
    //  -   Assumes that the blocks were allocated by `self`, and are neither live nor cached.
    pub(crate) unsafe fn deallocate_batch<I>(&self, class_size: ClassSize, blocks: I)
        where
            I: IntoIterator<Item = BlockRef>,
    {
        self.size_classes.deallocate_batch(&self.spans, class_size, blocks)
    }

    //  Deallocates a Large allocation.
    //
    //  Safety:
    //  -   Assumes that `large` was looked up from `ptr`, and the memory is no longer referenced.
    pub(crate) unsafe fn deallocate_large(&self, ptr: NonNull<u8>, large: &large_allocator::LargeObject)
        -> Result<(), AllocError>
    {
        large_allocator::deallocate(&self.spans, ptr, large)
    }

    //  Allocates a Large allocation.
    pub(crate) fn allocate_large(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        large_allocator::allocate(&self.spans, size)
    }
}

/// Returns the total size of a zero-initialized allocation, or `IntegerOverflow`.
pub(crate) fn zeroed_size(count: usize, size: usize) -> Result<usize, AllocError> {
    count.checked_mul(size).ok_or(AllocError::IntegerOverflow { count, size })
}
