//! The internals of nmalloc-core.
//!
//! The internals provide all the heavy-lifting.

pub mod bin;
pub mod blocks;
pub mod coalescer;
pub mod large_allocator;
pub mod live_mask;
pub mod size_class_allocator;
pub mod span;
pub mod span_index;
pub mod span_manager;
pub mod thread_cache;
