//! A snapshot of the memory held by an Allocator.

/// Statistics
///
/// A point-in-time snapshot of the memory held by an Allocator.
///
/// The counters are gathered without a global lock, hence a snapshot taken while other threads allocate or free may
/// be slightly inconsistent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    /// The number of pages currently mapped from the PageProvider, cached spans included.
    pub mapped_pages: usize,
    /// The number of bytes currently mapped from the PageProvider, cached spans included.
    pub mapped_bytes: usize,
    /// The number of spans currently carved up for a size class.
    pub active_spans: usize,
    /// The number of released spans retained for reuse.
    pub cached_spans: usize,
    /// The number of live Large allocations.
    pub large_objects: usize,
    /// The number of blocks handed out to callers, Large allocations included.
    pub live_blocks: usize,
    /// The usable size, in bytes, of the blocks handed out to callers, Large allocations included.
    pub live_bytes: usize,
}

impl Statistics {
    /// Returns the ratio of mapped bytes to live bytes, or None if nothing is live.
    pub fn overhead_ratio(&self) -> Option<f64> {
        if self.live_bytes == 0 {
            return None;
        }

        Some(self.mapped_bytes as f64 / self.live_bytes as f64)
    }
}

#[cfg(test)]
mod tests {

use super::*;

#[test]
fn statistics_overhead_ratio() {
    assert_eq!(None, Statistics::default().overhead_ratio());

    let statistics = Statistics { mapped_bytes: 8192, live_bytes: 4096, ..Statistics::default() };
    assert_eq!(Some(2.0), statistics.overhead_ratio());
}

}
