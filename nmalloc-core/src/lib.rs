#![deny(missing_docs)]

//! Building blocks for a general-purpose memory allocator.
//!
//! nmalloc-core is the allocator core behind a native `malloc`/`calloc`/`free` interface. It contains:
//! -   A page provider trait, used to map and unmap the raw pages to be carved up.
//! -   A configuration trait, fixing the page size, the size of spans, and the bounds of the various caches.
//! -   An `Allocator`, the shared back-end serving Small allocations from size-class spans and Large allocations
//!     from dedicated mappings.
//! -   A `ThreadCache`, a per-worker front-end amortizing the synchronization cost of the shared back-end.
//!
//! The bookkeeping of the Allocator lives on the Rust heap, hence it cannot itself serve as the `#[global_allocator]`.

mod api;
mod internals;
mod utils;

pub use api::*;
