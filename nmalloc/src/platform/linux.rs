//! Implementation of Linux specific calls.

use core::ptr::{self, NonNull};

use nmalloc_core::{Configuration, MappedPages, PageProvider, PowerOf2, ProviderFailure};

/// Implementation of the Configuration trait, for Linux.
#[derive(Default)]
pub(crate) struct NativeConfiguration;

impl Configuration for NativeConfiguration {
    //  4 KB
    const PAGE_SIZE: PowerOf2 = unsafe { PowerOf2::new_unchecked(4 * 1024) };

    const SPAN_BLOCKS: usize = 64;

    //  16 KB
    const LARGE_THRESHOLD_PAGES: usize = 4;

    const SPAN_CACHE_CAPACITY: usize = 2;

    const THREAD_CACHE_CAPACITY: usize = 64;

    const REFILL_BATCH: usize = 16;
}

/// Implementation of the PageProvider trait, for Linux.
#[derive(Default)]
pub(crate) struct NativePlatform;

impl NativePlatform {
    /// Creates an instance.
    pub(crate) const fn new() -> Self { Self }
}

impl PageProvider for NativePlatform {
    fn map_pages(&self, page_count: usize) -> Result<MappedPages, ProviderFailure> {
        debug_assert!(page_count > 0);

        let failure = ProviderFailure { pages: page_count };

        let size = bytes_of(page_count).ok_or(failure)?;
        let base = mmap_allocate(size).ok_or(failure)?;

        //  `mmap` aligns on the OS page size, which is never smaller than 4 KB on Linux.
        debug_assert!(base.as_ptr() as usize % NativeConfiguration::PAGE_SIZE == 0,
            "Incorrect alignment of mapping: {:x}", base.as_ptr() as usize);

        Ok(MappedPages { base, pages: page_count })
    }

    unsafe fn unmap_pages(&self, base: NonNull<u8>, page_count: usize) -> Result<(), ProviderFailure> {
        let failure = ProviderFailure { pages: page_count };

        let size = bytes_of(page_count).ok_or(failure)?;

        //  Safety:
        //  -   `base` was mapped by `map_pages`, for `page_count` pages, as assumed.
        //  -   The memory is no longer referenced, as assumed.
        if munmap_deallocate(base.as_ptr(), size) { Ok(()) } else { Err(failure) }
    }
}

//
//  Implementation Details
//

fn bytes_of(page_count: usize) -> Option<usize> { page_count.checked_mul(NativeConfiguration::PAGE_SIZE.value()) }

//  Wrapper around `mmap`.
//
//  Returns a pointer to `size` bytes of memory, aligned on the OS page size.
fn mmap_allocate(size: usize) -> Option<NonNull<u8>> {
    let length = size;
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

    //  No specific address hint.
    let addr = ptr::null_mut();
    //  When used in conjunction with MAP_ANONYMOUS, fd is mandated to be -1 on some implementations.
    let fd = -1;
    //  When used in conjunction with MAP_ANONYMOUS, offset is mandated to be 0 on some implementations.
    let offset = 0;

    //  Safety:
    //  -   `addr`, `fd`, and `offset` are suitable for MAP_ANONYMOUS.
    let result = unsafe { libc::mmap(addr, length, prot, flags, fd, offset) };

    let result = if result != libc::MAP_FAILED { result as *mut u8 } else { ptr::null_mut() };
    NonNull::new(result)
}

//  Wrapper around `munmap`.
//
//  Returns whether `munmap` succeeded.
//
//  #   Safety
//
//  -   Assumes that `addr` points to a `mmap`ed area of at least `size` bytes.
//  -   Assumes that the range `[addr, addr + size)` is no longer in use.
unsafe fn munmap_deallocate(addr: *mut u8, size: usize) -> bool {
    libc::munmap(addr as *mut libc::c_void, size) == 0
}
