#![deny(missing_docs)]

//! Exposition of NativeAllocator API via a C ABI.

use core::ptr::{self, NonNull};

use log::error;

use nmalloc::NativeAllocator;

/// Prepares the process-wide and thread-local structures for allocation.
///
/// Returns 0 on success, and a negative value otherwise.
#[cold]
#[no_mangle]
pub extern "C" fn native_warm_up() -> i32 { if ALLOCATOR.warm_up().is_ok() { 0 } else { -1 } }

/// Allocates `size` bytes of memory, aligned on a 16 bytes boundary.
///
/// Returns NULL if `size` is 0, or if the allocation fails.
#[no_mangle]
pub extern "C" fn native_malloc(size: usize) -> *mut u8 {
    ALLOCATOR.allocate(size).map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Allocates `count * size` bytes of zeroed memory, aligned on a 16 bytes boundary.
///
/// Returns NULL if `count * size` is 0 or overflows, or if the allocation fails.
#[no_mangle]
pub extern "C" fn native_calloc(count: usize, size: usize) -> *mut u8 {
    ALLOCATOR.zero_allocate(count, size).map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Deallocates the memory located at `pointer`.
///
/// Does nothing if `pointer` is NULL, and aborts the process if `pointer` is not currently allocated.
///
/// #   Safety
///
/// -   Assumes the memory pointed by `pointer` is no longer in use.
#[no_mangle]
pub unsafe extern "C" fn native_free(pointer: *mut u8) {
    let Some(pointer) = NonNull::new(pointer) else { return };

    if let Err(err) = ALLOCATOR.try_free(pointer) {
        error!("Aborting: {}", err);
        std::process::abort();
    }
}

//
//  Implementation
//

static ALLOCATOR: NativeAllocator = NativeAllocator::new();
