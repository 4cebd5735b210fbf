//! Allocator

use core::{cell::RefCell, ptr::NonNull};

use std::sync::OnceLock;

use log::{debug, trace};

use nmalloc_core::{AllocError, Allocator, Statistics, ThreadCache};

use crate::{NativeConfiguration, NativePlatform};

/// Native Allocator.
///
/// A handle to the process-wide allocator: all instances share the same memory, and any pointer allocated through
/// one instance, on any thread, may be freed through any other instance, on any other thread.
///
/// Each thread lazily creates its own cache on first use, which is flushed when the thread exits.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeAllocator;

impl NativeAllocator {
    /// Creates an instance.
    pub const fn new() -> Self { Self }

    /// Prepares the process-wide and thread-local structures for allocation.
    ///
    /// Returns Ok if the attempt succeeded, Err otherwise.
    ///
    /// Failure to warm up the current thread may occur if its thread-local storage is being torn down.
    #[cold]
    pub fn warm_up(&self) -> Result<(), ()> {
        with_thread_cache(|_| ()).ok_or(())
    }

    /// Allocates `size` bytes of memory, aligned on a 16 bytes boundary.
    ///
    /// Returns `InvalidArgument` if `size` is 0, and `OutOfMemory` if the OS refuses to map more memory.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        with_thread_cache(|cache| cache.allocate(size))
            .unwrap_or_else(|| shared().allocate(size))
    }

    /// Allocates `count * size` bytes of zeroed memory, aligned on a 16 bytes boundary.
    ///
    /// Returns `IntegerOverflow` if `count * size` overflows, and otherwise behaves as `allocate`.
    pub fn zero_allocate(&self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        with_thread_cache(|cache| cache.zero_allocate(count, size))
            .unwrap_or_else(|| shared().zero_allocate(count, size))
    }

    /// Deallocates the memory located at `pointer`.
    ///
    /// #   Panics
    ///
    /// If `pointer` is not currently allocated: a double free, an interior pointer, or a foreign pointer.
    ///
    /// #   Safety
    ///
    /// -   Assumes the memory pointed by `pointer` is no longer in use.
    pub unsafe fn free(&self, pointer: NonNull<u8>) {
        if let Err(error) = self.try_free(pointer) {
            panic!("{}", error);
        }
    }

    /// Deallocates the memory located at `pointer`.
    ///
    /// Returns `InvalidFree` if `pointer` is not currently allocated, in which case nothing is done.
    ///
    /// #   Safety
    ///
    /// -   Assumes the memory pointed by `pointer` is no longer in use.
    pub unsafe fn try_free(&self, pointer: NonNull<u8>) -> Result<(), AllocError> {
        //  Safety:
        //  -   The memory is no longer in use, as assumed.
        with_thread_cache(|cache| cache.free(pointer))
            .unwrap_or_else(|| shared().free(pointer))
    }

    /// Returns the number of usable bytes at `pointer`.
    ///
    /// Returns `InvalidFree` if `pointer` is not currently allocated.
    pub fn usable_size(&self, pointer: NonNull<u8>) -> Result<usize, AllocError> { shared().usable_size(pointer) }

    /// Returns all the blocks cached by the current thread to the process-wide allocator.
    #[cold]
    pub fn flush_thread_cache(&self) {
        //  Flushing an absent cache, or a cache being torn down, is a no-op.
        let _ = THREAD_CACHE.try_with(|cell| {
            if let Ok(mut cache) = cell.try_borrow_mut() {
                if let Some(cache) = cache.as_mut() {
                    cache.flush();
                }
            }
        });
    }

    /// Unmaps all the spans retained for reuse, returns the number of pages unmapped.
    #[cold]
    pub fn trim(&self) -> usize { ALLOCATOR.get().map_or(0, Allocator::trim) }

    /// Returns a snapshot of the memory held by the process-wide allocator.
    pub fn statistics(&self) -> Statistics { ALLOCATOR.get().map(Allocator::statistics).unwrap_or_default() }
}

//
//  Integration test backdoors.
//
//  Unfortunately the backdoors have to be exposed as part of the public API for use in integration tests.
//

impl NativeAllocator {
    /// Exposes the number of blocks cached by the current thread.
    #[cold]
    #[doc(hidden)]
    pub fn cached_blocks(&self) -> usize {
        THREAD_CACHE.try_with(|cell| match cell.try_borrow() {
            Ok(cache) => cache.as_ref().map_or(0, ThreadCache::cached_blocks),
            Err(_) => 0,
        })
        .unwrap_or(0)
    }
}

//
//  Implementation
//

type SharedAllocator = Allocator<NativeConfiguration, NativePlatform>;
type LocalCache = ThreadCache<'static, NativeConfiguration, NativePlatform>;

//  Process-wide allocator.
static ALLOCATOR: OnceLock<SharedAllocator> = OnceLock::new();

thread_local! {
    //  Thread-local cache, flushed on thread exit.
    static THREAD_CACHE: RefCell<Option<LocalCache>> = const { RefCell::new(None) };
}

//  Returns the process-wide allocator, initialized if need be.
#[inline(always)]
fn shared() -> &'static SharedAllocator { ALLOCATOR.get_or_init(initialize) }

#[cold]
#[inline(never)]
fn initialize() -> SharedAllocator {
    debug!("Initializing the process-wide allocator");

    Allocator::new(NativePlatform::new())
}

//  Invokes `fun` on the cache of the current thread, creating it if need be.
//
//  Returns None, without invoking `fun`, if the cache is unavailable: either because the thread-local storage is being
//  torn down, or because the cache is already borrowed further up the stack.
#[inline(always)]
fn with_thread_cache<F, R>(fun: F) -> Option<R>
    where
        F: FnOnce(&mut LocalCache) -> R,
{
    THREAD_CACHE.try_with(|cell| {
        let mut cache = cell.try_borrow_mut().ok()?;

        let cache = cache.get_or_insert_with(|| {
            trace!("Creating a thread cache");

            shared().thread_cache()
        });

        Some(fun(cache))
    })
    .ok()
    .flatten()
}
