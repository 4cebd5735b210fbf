//! The errors reported by nmalloc-core.

use core::ptr::NonNull;

use log::error;
use thiserror::Error;

use crate::utils;

/// AllocError
///
/// The failures of the operations of an Allocator, or of a ThreadCache.
///
/// Nothing is retried automatically, and no partial allocation is ever returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// A zero-sized allocation was requested.
    #[error("Invalid argument: allocations must be at least 1 byte")]
    InvalidArgument,

    /// Neither the caches nor the PageProvider could satisfy the request.
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// The requested size, in bytes.
        size: usize,
    },

    /// The total size of a zero-initialized allocation overflows.
    #[error("Integer overflow: {count} elements of {size} bytes")]
    IntegerOverflow {
        /// The requested number of elements.
        count: usize,
        /// The requested size of each element, in bytes.
        size: usize,
    },

    /// The pointer is not a currently allocated block.
    ///
    /// This is a programmer error: it is either a double free, an interior pointer, or a foreign pointer.
    #[error("Invalid free: {address:#x} is not a live allocation")]
    InvalidFree {
        /// The address of the offending pointer.
        address: usize,
    },
}

impl AllocError {
    /// Creates an InvalidFree error for `ptr`, and reports it.
    pub(crate) fn invalid_free(ptr: NonNull<u8>) -> Self {
        let address = utils::address_of(ptr);

        error!("Invalid free of {:#x}: not a live allocation", address);

        AllocError::InvalidFree { address }
    }

    /// Reports an OutOfMemory error against the size requested by the caller, rather than the size of its class.
    pub(crate) fn for_requested_size(self, size: usize) -> Self {
        match self {
            AllocError::OutOfMemory { .. } => AllocError::OutOfMemory { size },
            other => other,
        }
    }
}

/// ProviderFailure
///
/// The PageProvider could not map, or unmap, the requested pages.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Page provider failure: {pages} pages")]
pub struct ProviderFailure {
    /// The number of pages of the failed request.
    pub pages: usize,
}
