//! PageProvider
//!
//! The PageProvider trait is used to request raw pages directly from the platform. By abstracting the underlying
//! platform, it becomes possible to easily port the code to a different OS, or to substitute a mock in tests.

use core::ptr::NonNull;

use super::ProviderFailure;

/// MappedPages
///
/// A region of memory mapped by a PageProvider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedPages {
    /// The base address of the region, aligned on the page size.
    pub base: NonNull<u8>,
    /// The number of pages of the region, possibly greater than requested.
    pub pages: usize,
}

//  Safety:
//  -   MappedPages is a mere handle, the memory it designates is owned by whoever holds it.
unsafe impl Send for MappedPages {}

/// Abstraction of platform specific mapping and unmapping of pages.
pub trait PageProvider {
    /// Maps a fresh region of at least `page_count` pages.
    ///
    /// The caller may assume that if the mapping succeeds then:
    /// -   The region is _at least_ aligned on the page size of the Configuration.
    /// -   The region spans the returned number of pages, which is greater than or equal to `page_count`.
    ///
    /// `map_pages` assumes that `page_count` is non-zero.
    fn map_pages(&self, page_count: usize) -> Result<MappedPages, ProviderFailure>;

    /// Unmaps a region previously mapped.
    ///
    /// #   Safety
    ///
    /// The caller should no longer reference the memory after calling this function.
    ///
    /// `unmap_pages` assumes that:
    /// -   `base` was mapped by this instance of `PageProvider`, and returned `page_count` pages.
    /// -   `base` is the value returned by `map_pages`, and not an interior pointer.
    unsafe fn unmap_pages(&self, base: NonNull<u8>, page_count: usize) -> Result<(), ProviderFailure>;
}
