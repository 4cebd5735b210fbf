//! The API of nmalloc-core.

mod allocator;
mod configuration;
mod description;
mod error;
mod provider;
mod statistics;
mod thread;

pub use allocator::Allocator;
pub use configuration::{Configuration, Properties};
pub use description::{AllocationSize, Category, ClassSize, PowerOf2, MAX_ALIGNMENT};
pub use error::{AllocError, ProviderFailure};
pub use provider::{MappedPages, PageProvider};
pub use statistics::Statistics;
pub use thread::ThreadCache;
