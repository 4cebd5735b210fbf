//! The address-to-span index.
//!
//! The SpanIndex maps the base address of every region carved up by the Allocator, whether a span or a Large
//! allocation, to the region itself. It is used to resolve the owner of a pointer on free, irrespective of the thread
//! that allocated it.

use std::{collections::BTreeMap, sync::Arc};

use crate::utils;

use super::{large_allocator::LargeObject, span::Span};

/// Region.
///
/// A region mapped from the PageProvider, and currently in use.
#[derive(Clone)]
pub(crate) enum Region {
    /// A span, dedicated to a size class.
    Span(Arc<Span>),
    /// A Large allocation.
    Large(LargeObject),
}

impl Region {
    /// Returns the base address of the region.
    pub(crate) fn start(&self) -> usize {
        match self {
            Region::Span(span) => utils::address_of(span.base()),
            Region::Large(large) => utils::address_of(large.base()),
        }
    }

    /// Returns the address past the end of the region.
    pub(crate) fn end(&self) -> usize {
        match self {
            Region::Span(span) => span.end(),
            Region::Large(large) => large.end(),
        }
    }
}

/// SpanIndex.
#[derive(Default)]
pub(crate) struct SpanIndex(BTreeMap<usize, Region>);

impl SpanIndex {
    /// Registers the region.
    pub(crate) fn insert(&mut self, region: Region) {
        let start = region.start();

        debug_assert!(self.lookup(start).is_none());
        debug_assert!(self.lookup(region.end() - 1).is_none());

        self.0.insert(start, region);
    }

    /// Unregisters the region starting at `start`, if any.
    pub(crate) fn remove(&mut self, start: usize) -> Option<Region> { self.0.remove(&start) }

    /// Unregisters the Large allocation `object`, if it is still the region registered at its base.
    ///
    /// Any other region registered at the same base, span or Large allocation, is left in place.
    pub(crate) fn remove_large(&mut self, object: &LargeObject) -> Option<LargeObject> {
        let start = utils::address_of(object.base());

        match self.0.get(&start) {
            Some(Region::Large(registered)) if registered == object => (),
            _ => return None,
        }

        match self.0.remove(&start)? {
            Region::Large(registered) => Some(registered),
            Region::Span(_) => None,
        }
    }

    /// Returns the region containing `address`, if any.
    pub(crate) fn lookup(&self, address: usize) -> Option<&Region> {
        let (_, region) = self.0.range(..=address).next_back()?;

        if address < region.end() { Some(region) } else { None }
    }

    /// Returns the number of regions.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize { self.0.len() }

    /// Returns an iterator over the regions, in address order.
    pub(crate) fn regions(&self) -> impl Iterator<Item = &Region> + '_ { self.0.values() }

    /// Unregisters all regions.
    pub(crate) fn take_all(&mut self) -> Vec<Region> {
        std::mem::take(&mut self.0).into_values().collect()
    }
}

#[cfg(test)]
mod tests {

use core::{num::NonZeroUsize, ptr::NonNull};

use crate::{ClassSize, MappedPages};

use super::*;
use super::super::test::AlignedBuffer;

fn span_region(base: NonNull<u8>, pages: usize) -> Region {
    let class_size = ClassSize::from_size(NonZeroUsize::new(64).expect("Not 0"));
    let mapped = MappedPages { base, pages };

    Region::Span(Arc::new(Span::new(mapped, AlignedBuffer::page_size(), class_size)))
}

#[test]
fn span_index_lookup() {
    let buffer = AlignedBuffer::default();
    let base = utils::address_of(buffer.get(0));

    //  Regions are never dereferenced by the index: addresses beyond the buffer are fine.
    let second = NonNull::new((base + 3 * 4096) as *mut u8).expect("Not null");

    let mut index = SpanIndex::default();
    index.insert(span_region(buffer.get(0), 1));
    index.insert(span_region(second, 2));

    assert_eq!(2, index.len());

    assert_eq!(Some(base), index.lookup(base).map(Region::start));
    assert_eq!(Some(base), index.lookup(base + 4095).map(Region::start));
    assert_eq!(None, index.lookup(base + 4096).map(Region::start));
    assert_eq!(None, index.lookup(base + 3 * 4096 - 1).map(Region::start));
    assert_eq!(Some(base + 3 * 4096), index.lookup(base + 3 * 4096).map(Region::start));
    assert_eq!(Some(base + 3 * 4096), index.lookup(base + 5 * 4096 - 1).map(Region::start));
    assert_eq!(None, index.lookup(base + 5 * 4096).map(Region::start));
    assert_eq!(None, index.lookup(base - 1).map(Region::start));
}

#[test]
fn span_index_remove() {
    let buffer = AlignedBuffer::default();
    let base = utils::address_of(buffer.get(0));

    let mut index = SpanIndex::default();
    index.insert(span_region(buffer.get(0), 1));

    assert!(index.remove(base + 16).is_none());
    assert!(index.remove(base).is_some());
    assert!(index.lookup(base).is_none());
    assert_eq!(0, index.len());
}

#[test]
fn span_index_remove_large() {
    let buffer = AlignedBuffer::default();
    let base = utils::address_of(buffer.get(0));

    let page_size = AlignedBuffer::page_size();
    let large = |pages, size| LargeObject::new(MappedPages { base: buffer.get(0), pages }, page_size, size);

    let mut index = SpanIndex::default();

    //  A span at the base is never removed in lieu of a Large allocation.
    index.insert(span_region(buffer.get(0), 1));

    assert!(index.remove_large(&large(1, 100)).is_none());
    assert!(matches!(index.lookup(base), Some(Region::Span(_))));

    assert!(index.remove(base).is_some());

    //  Only the very same Large allocation is removed.
    index.insert(Region::Large(large(2, 5_000)));

    assert!(index.remove_large(&large(2, 6_000)).is_none());
    assert!(index.remove_large(&large(1, 5_000)).is_none());
    assert_eq!(1, index.len());

    assert_eq!(Some(large(2, 5_000)), index.remove_large(&large(2, 5_000)));
    assert_eq!(0, index.len());
}

#[test]
fn span_index_take_all() {
    let buffer = AlignedBuffer::default();

    let mut index = SpanIndex::default();
    index.insert(span_region(buffer.get(0), 1));

    assert_eq!(1, index.take_all().len());
    assert_eq!(0, index.len());
    assert_eq!(0, index.regions().count());
}

}
