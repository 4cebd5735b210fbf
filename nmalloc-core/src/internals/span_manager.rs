//! Span Manager
//!
//! The Span Manager is the only component talking to the PageProvider. It:
//!
//! -   Maps the pages of fresh spans, and of Large allocations.
//! -   Registers every region in use within the address-to-span index.
//! -   Retains a bounded number of released spans per size class, evicting the oldest past the bound.
//! -   Unmaps every region it still holds when dropped.
//!
//! Locks are acquired in the order index, then span cache, and are never held across a call to the PageProvider.

use core::{
    marker,
    sync::atomic::{AtomicUsize, Ordering},
};

use std::{collections::VecDeque, sync::Arc};

use log::{debug, error, warn};
use parking_lot::{Mutex, RwLock};

use crate::{AllocError, ClassSize, Configuration, MappedPages, PageProvider, Properties, ProviderFailure, Statistics, utils};

use super::{
    large_allocator::LargeObject,
    span::Span,
    span_index::{Region, SpanIndex},
};

pub(crate) struct SpanManager<C, P>
    where
        C: Configuration,
        P: PageProvider,
{
    provider: P,
    index: RwLock<SpanIndex>,
    cache: Mutex<SpanCache>,
    mapped_pages: AtomicUsize,
    _configuration: marker::PhantomData<C>,
}

impl<C, P> SpanManager<C, P>
    where
        C: Configuration,
        P: PageProvider,
{
    /// Creates an instance, with an empty index and span cache.
    pub(crate) fn new(provider: P) -> Self {
        let cache = Mutex::new(SpanCache::new(Properties::<C>::number_classes()));

        Self {
            provider,
            index: RwLock::new(SpanIndex::default()),
            cache,
            mapped_pages: AtomicUsize::new(0),
            _configuration: marker::PhantomData,
        }
    }

    /// Returns the PageProvider.
    pub(crate) fn provider(&self) -> &P { &self.provider }

    /// Acquires a span for the given class size, and registers it.
    ///
    /// The span is taken from the span cache if possible, and freshly mapped otherwise.
    pub(crate) fn acquire_span(&self, class_size: ClassSize) -> Result<Arc<Span>, AllocError> {
        let cached = self.cache.lock().pop(class_size.value());

        let mapped = match cached {
            Some(mapped) => {
                debug!("Reusing cached span {:#x} of {} pages for class {}",
                    utils::address_of(mapped.base), mapped.pages, class_size.value());
                mapped
            },
            None => {
                let pages = Properties::<C>::span_pages(class_size);

                self.map(pages).map_err(|_| AllocError::OutOfMemory { size: class_size.size() })?
            },
        };

        let span = Arc::new(Span::new(mapped, C::PAGE_SIZE, class_size));

        self.index.write().insert(Region::Span(span.clone()));

        debug!("Acquired span {:#x} of {} blocks of {} bytes",
            utils::address_of(span.base()), span.capacity(), span.block_size());

        Ok(span)
    }

    /// Unregisters a span whose blocks are all free, then caches or unmaps it.
    pub(crate) fn release_span(&self, span: Arc<Span>) {
        debug_assert_eq!(0, span.live_blocks());

        let start = utils::address_of(span.base());

        let _removed = self.index.write().remove(start);
        debug_assert!(_removed.is_some());

        let evicted = self.cache.lock().push(span.class_size().value(), span.mapped(), C::SPAN_CACHE_CAPACITY);

        debug!("Released span {:#x} of class {}", start, span.class_size().value());

        if let Some(evicted) = evicted {
            debug!("Evicting cached span {:#x} of {} pages", utils::address_of(evicted.base), evicted.pages);

            //  Safety:
            //  -   The span is unregistered, and none of its blocks is live.
            unsafe { self.unmap(evicted) };
        }
    }

    /// Returns the region containing `address`, if any.
    pub(crate) fn lookup(&self, address: usize) -> Option<Region> { self.index.read().lookup(address).cloned() }

    /// Maps `pages` pages, on behalf of a Large allocation.
    pub(crate) fn map_large(&self, pages: usize) -> Result<MappedPages, ProviderFailure> { self.map(pages) }

    /// Registers a region.
    pub(crate) fn register(&self, region: Region) { self.index.write().insert(region); }

    /// Unregisters the Large allocation `object`, if still registered.
    pub(crate) fn unregister_large(&self, object: &LargeObject) -> Option<LargeObject> {
        self.index.write().remove_large(object)
    }

    /// Unmaps the pages.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the pages were mapped by this instance, and are no longer referenced.
    pub(crate) unsafe fn unmap(&self, mapped: MappedPages) {
        //  Safety:
        //  -   `mapped` was returned by `self.provider`, as assumed.
        match self.provider.unmap_pages(mapped.base, mapped.pages) {
            Ok(()) => { self.mapped_pages.fetch_sub(mapped.pages, Ordering::Relaxed); },
            Err(failure) => error!("Failed to unmap {:#x}: {}", utils::address_of(mapped.base), failure),
        }
    }

    /// Unmaps all cached spans, returns the number of pages unmapped.
    pub(crate) fn trim(&self) -> usize {
        let evicted = self.cache.lock().drain();

        let pages: usize = evicted.iter().map(|mapped| mapped.pages).sum();

        for mapped in evicted {
            //  Safety:
            //  -   Cached spans are unregistered, and none of their blocks is live.
            unsafe { self.unmap(mapped) };
        }

        debug!("Unmapped {} cached span pages", pages);

        pages
    }

    /// Returns a snapshot of the memory held.
    pub(crate) fn statistics(&self) -> Statistics {
        let mut statistics = Statistics::default();

        {
            let index = self.index.read();

            for region in index.regions() {
                match region {
                    Region::Span(span) => {
                        let live = span.live_blocks();

                        statistics.active_spans += 1;
                        statistics.live_blocks += live;
                        statistics.live_bytes += live * span.block_size();
                    },
                    Region::Large(large) => {
                        statistics.large_objects += 1;
                        statistics.live_blocks += 1;
                        statistics.live_bytes += large.size();
                    },
                }
            }
        }

        statistics.cached_spans = self.cache.lock().len();
        statistics.mapped_pages = self.mapped_pages.load(Ordering::Relaxed);
        statistics.mapped_bytes = statistics.mapped_pages * C::PAGE_SIZE;

        statistics
    }

    fn map(&self, pages: usize) -> Result<MappedPages, ProviderFailure> {
        match self.provider.map_pages(pages) {
            Ok(mapped) => {
                debug_assert!(mapped.pages >= pages);
                debug_assert!(utils::is_sufficiently_aligned_for(mapped.base, C::PAGE_SIZE));

                self.mapped_pages.fetch_add(mapped.pages, Ordering::Relaxed);

                Ok(mapped)
            },
            Err(failure) => {
                warn!("Failed to map {} pages: {}", pages, failure);
                Err(failure)
            },
        }
    }
}

impl<C, P> Drop for SpanManager<C, P>
    where
        C: Configuration,
        P: PageProvider,
{
    fn drop(&mut self) {
        let regions = self.index.get_mut().take_all();
        let cached = self.cache.get_mut().drain();

        let live = regions.iter().filter(|region| match region {
            Region::Span(span) => span.live_blocks() > 0,
            Region::Large(_) => true,
        }).count();

        if live > 0 {
            warn!("Tearing down with {} regions still in use", live);
        }

        debug!("Tearing down {} regions and {} cached spans", regions.len(), cached.len());

        let held = regions.iter().map(|region| match region {
            Region::Span(span) => span.mapped(),
            Region::Large(large) => large.mapped(),
        });

        for mapped in held.chain(cached) {
            //  Safety:
            //  -   The allocator is being dropped, hence none of its memory may still be referenced.
            unsafe { self.unmap(mapped) };
        }
    }
}

//
//  Implementation Details
//

//  The released spans retained for reuse, per size class, oldest first.
struct SpanCache {
    classes: Box<[VecDeque<MappedPages>]>,
    length: usize,
}

impl SpanCache {
    fn new(number_classes: usize) -> Self {
        Self { classes: (0..number_classes).map(|_| VecDeque::new()).collect(), length: 0 }
    }

    fn len(&self) -> usize { self.length }

    //  Pops the most recently released span of the class.
    fn pop(&mut self, class: usize) -> Option<MappedPages> {
        let result = self.classes[class].pop_back()?;
        self.length -= 1;

        Some(result)
    }

    //  Pushes the released span, returns the evicted span if the class exceeds its capacity.
    fn push(&mut self, class: usize, mapped: MappedPages, capacity: usize) -> Option<MappedPages> {
        let cache = &mut self.classes[class];

        cache.push_back(mapped);

        if cache.len() <= capacity {
            self.length += 1;
            return None;
        }

        cache.pop_front()
    }

    fn drain(&mut self) -> Vec<MappedPages> {
        self.length = 0;

        self.classes.iter_mut().flat_map(|cache| cache.drain(..)).collect()
    }
}
