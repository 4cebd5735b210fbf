#![deny(missing_docs)]

//! A process-wide native memory allocator.
//!
//! The type `NativeAllocator` provides a handle to a single, lazily initialized, process-wide allocator, backed by
//! pages mapped from the OS, and fronted by a cache per thread.
//!
//! #   Warning
//!
//! The bookkeeping of the allocator itself is stored on the Rust heap, hence `NativeAllocator` is not suitable as the
//! `#[global_allocator]` of the very process it serves.

mod allocator;
mod platform;

pub use allocator::NativeAllocator;
pub use nmalloc_core::{AllocError, Statistics};

use platform::{NativeConfiguration, NativePlatform};
