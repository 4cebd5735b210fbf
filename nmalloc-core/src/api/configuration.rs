//! The configuration of nmalloc-core.
//!
//! A single Configuration instance should be shared by an Allocator and all its ThreadCaches.
//!
//! nmalloc features 2 allocation categories:
//!
//! -   Small: fulfilled using spans dedicated to a size class, cached in ThreadCache, and lazily refilled.
//! -   Large: fulfilled directly by the PageProvider, with a header recording the size of the allocation.
//!
//! The Configuration instance allows adjusting the threshold between those categories, the size of the spans, and
//! the bounds of the various caches to better match the underlying platform.

use core::num;

use super::{AllocationSize, Category, ClassSize, PowerOf2, MAX_ALIGNMENT};

/// Configuration
///
/// The Configuration instance allows adjusting the thresholds of the allocation categories, and sizing the caches.
pub trait Configuration {
    /// The size of the pages handed out by the PageProvider.
    ///
    /// Spans and Large allocations are always requested as multiple of this page size.
    const PAGE_SIZE: PowerOf2;

    /// The target number of blocks carved out of a single span.
    ///
    /// A span is made of as many pages as necessary to hold this number of blocks, and at least one.
    const SPAN_BLOCKS: usize;

    /// The number of pages making up the largest size class.
    ///
    /// Any allocation above the largest size class is of the Large category.
    const LARGE_THRESHOLD_PAGES: usize;

    /// The maximum number of released spans retained, per size class, for reuse.
    const SPAN_CACHE_CAPACITY: usize;

    /// The maximum number of blocks retained, per size class, by a ThreadCache before flushing.
    const THREAD_CACHE_CAPACITY: usize;

    /// The number of blocks moved between a ThreadCache and the Allocator in a single refill, or flush.
    const REFILL_BATCH: usize;
}

/// Properties
///
/// Properties of a given Configuration.
///
/// Work-around for the inability to implement static methods directly on a trait.
pub struct Properties<C>(C);

impl<C> Properties<C>
    where
        C: Configuration
{
    /// Returns the minimum allocation size.
    pub fn minimum_allocation_size() -> AllocationSize { ClassSize::minimum_allocation_size() }

    /// Returns the threshold of Small allocations.
    ///
    /// Allocations for a size less than or equal to the threshold are of the Small category, and is the block size
    /// of the largest size class.
    pub fn large_threshold() -> AllocationSize {
        let limit = C::PAGE_SIZE.value().saturating_mul(C::LARGE_THRESHOLD_PAGES);

        let limit = match num::NonZeroUsize::new(limit) {
            Some(limit) => limit,
            None => return AllocationSize::new(0),
        };

        let class_size = ClassSize::from_size(limit);

        if class_size.size() <= limit.get() {
            return AllocationSize::new(class_size.size());
        }

        match class_size.value() {
            0 => AllocationSize::new(0),
            n => AllocationSize::new(ClassSize::new(n - 1).size()),
        }
    }

    /// Returns the number of size classes.
    pub fn number_classes() -> usize { ClassSize::number_classes(Self::large_threshold()) }

    /// Returns the category of an allocation, based on its size.
    pub fn category_of_size(size: usize) -> Category {
        debug_assert!(size > 0);

        if size <= Self::large_threshold().value() {
            Category::Small
        } else {
            Category::Large
        }
    }

    /// Returns the class size of an allocation, if Small.
    pub fn class_size_of_size(size: usize) -> Option<ClassSize> {
        if size > Self::large_threshold().value() {
            return None;
        }

        num::NonZeroUsize::new(size).map(ClassSize::from_size)
    }

    /// Returns the number of pages of a span of the given class size.
    pub fn span_pages(class_size: ClassSize) -> usize {
        let bytes = class_size.size().saturating_mul(C::SPAN_BLOCKS);

        C::PAGE_SIZE.units_for(bytes).unwrap_or(usize::MAX / C::PAGE_SIZE).max(1)
    }

    /// Returns the number of blocks carved out of a span of the given class size.
    pub fn blocks_per_span(class_size: ClassSize) -> usize {
        class_size.number_elements(Self::span_pages(class_size) * C::PAGE_SIZE)
    }

    /// Returns the number of pages of a Large allocation of the given size, header included.
    ///
    /// Returns None if the computation overflows.
    pub fn large_pages(size: usize) -> Option<usize> {
        let total = size.checked_add(Self::large_header_size())?;

        C::PAGE_SIZE.units_for(total)
    }

    /// Returns the size of the header preceding a Large allocation.
    pub fn large_header_size() -> usize { MAX_ALIGNMENT.value() }
}
