//! Large Allocator
//!
//! Large allocations bypass the size classes: each is fulfilled by a dedicated mapping of the PageProvider, rounded up
//! to the page size, and prefixed by a header recording the requested size.
//!
//! Large allocations are never cached, nor coalesced: their pages are unmapped as soon as they are freed.

use core::{
    mem,
    ptr::{self, NonNull},
};

use log::debug;

use crate::{AllocError, Configuration, MappedPages, PageProvider, PowerOf2, Properties, MAX_ALIGNMENT, utils};

use super::{span_index::Region, span_manager::SpanManager};

/// LargeObject.
///
/// The record of a live Large allocation, within the SpanIndex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LargeObject {
    base: NonNull<u8>,
    pages: usize,
    bytes: usize,
    size: usize,
}

impl LargeObject {
    /// Returns the base address of the mapping.
    pub(crate) fn base(&self) -> NonNull<u8> { self.base }

    /// Returns the address past the end of the mapping.
    pub(crate) fn end(&self) -> usize { utils::address_of(self.base) + self.bytes }

    /// Returns the mapping.
    pub(crate) fn mapped(&self) -> MappedPages { MappedPages { base: self.base, pages: self.pages } }

    /// Returns the requested size of the allocation.
    pub(crate) fn size(&self) -> usize { self.size }

    /// Returns the pointer handed out to the caller.
    pub(crate) fn user_pointer(&self) -> NonNull<u8> {
        //  Safety:
        //  -   The mapping is larger than the header.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(HEADER_SIZE)) }
    }

    /// Creates the record of a Large allocation of `size` bytes, over `mapped`.
    pub(crate) fn new(mapped: MappedPages, page_size: PowerOf2, size: usize) -> Self {
        Self { base: mapped.base, pages: mapped.pages, bytes: mapped.pages * page_size, size }
    }
}

//  Safety:
//  -   The LargeObject is a mere record, it never dereferences the mapping.
unsafe impl Send for LargeObject {}

//  Safety:
//  -   The LargeObject is a mere record, it never dereferences the mapping.
unsafe impl Sync for LargeObject {}

/// Allocates a Large allocation of `size` bytes.
pub(crate) fn allocate<C, P>(spans: &SpanManager<C, P>, size: usize) -> Result<NonNull<u8>, AllocError>
    where
        C: Configuration,
        P: PageProvider,
{
    debug_assert_eq!(HEADER_SIZE, Properties::<C>::large_header_size());

    let out_of_memory = AllocError::OutOfMemory { size };

    let pages = Properties::<C>::large_pages(size).ok_or(out_of_memory)?;
    let mapped = spans.map_large(pages).map_err(|_| out_of_memory)?;

    //  Safety:
    //  -   The mapping is exclusively owned, page aligned, and larger than the header.
    unsafe { LargeHeader::initialize(mapped.base, size, mapped.pages) };

    let object = LargeObject::new(mapped, C::PAGE_SIZE, size);

    spans.register(Region::Large(object));

    debug!("Mapped large allocation {:#x} of {} bytes over {} pages",
        utils::address_of(object.base()), size, object.pages);

    Ok(object.user_pointer())
}

/// Deallocates the Large allocation at `ptr`, recorded by `object`.
///
/// #   Safety
///
/// -   Assumes that `object` was looked up from `ptr`.
/// -   Assumes that the memory is no longer referenced.
pub(crate) unsafe fn deallocate<C, P>(spans: &SpanManager<C, P>, ptr: NonNull<u8>, object: &LargeObject)
    -> Result<(), AllocError>
    where
        C: Configuration,
        P: PageProvider,
{
    if ptr != object.user_pointer() {
        return Err(AllocError::invalid_free(ptr));
    }

    //  Concurrent frees of the same pointer race to unregister it: only one wins. A region mapped anew at the same
    //  base, by a later allocation, never matches `object` and stays registered.
    let Some(registered) = spans.unregister_large(object) else {
        return Err(AllocError::invalid_free(ptr));
    };

    let header = LargeHeader::read(registered.base());
    debug_assert_eq!(registered.size(), header.size);
    debug_assert_eq!(registered.pages, header.pages);

    debug!("Unmapping large allocation {:#x} of {} bytes", utils::address_of(registered.base()), registered.size());

    //  Safety:
    //  -   Unregistered, and no longer referenced as assumed.
    spans.unmap(registered.mapped());

    Ok(())
}

/// Returns the size recorded in the header of the Large allocation at `ptr`, recorded by `object`.
///
/// #   Safety
///
/// -   Assumes that `object` was looked up from `ptr`, and is still live.
pub(crate) unsafe fn usable_size(ptr: NonNull<u8>, object: &LargeObject) -> Result<usize, AllocError> {
    if ptr != object.user_pointer() {
        return Err(AllocError::invalid_free(ptr));
    }

    Ok(LargeHeader::read(object.base()).size)
}

//
//  Implementation Details
//

const HEADER_SIZE: usize = mem::size_of::<LargeHeader>();

//  The header preceding a Large allocation, preserving the alignment of the user pointer.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct LargeHeader {
    size: usize,
    pages: usize,
}

impl LargeHeader {
    //  Safety:
    //  -   Assumes that `at` is exclusively owned, sufficiently sized and aligned.
    #[allow(clippy::cast_ptr_alignment)]
    unsafe fn initialize(at: NonNull<u8>, size: usize, pages: usize) {
        debug_assert!(utils::is_sufficiently_aligned_for(at, MAX_ALIGNMENT));

        ptr::write(at.as_ptr() as *mut LargeHeader, LargeHeader { size, pages });
    }

    //  Safety:
    //  -   Assumes that `at` points to an initialized header.
    #[allow(clippy::cast_ptr_alignment)]
    unsafe fn read(at: NonNull<u8>) -> LargeHeader { ptr::read(at.as_ptr() as *const LargeHeader) }
}
