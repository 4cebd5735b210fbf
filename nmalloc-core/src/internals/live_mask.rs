//! An atomic bit mask representing whether each block of a span is handed out to a caller, or not.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::PowerOf2;

pub(crate) struct LiveMask(Box<[AtomicU64]>);

impl LiveMask {
    //  Safety:
    //  -   64 is a power of 2.
    const WORD_BITS: PowerOf2 = unsafe { PowerOf2::new_unchecked(64) };

    /// Creates a mask of `capacity` bits, all cleared.
    pub(crate) fn new(capacity: usize) -> Self {
        let words = Self::WORD_BITS.units_for(capacity).unwrap_or(0);

        Self((0..words).map(|_| AtomicU64::new(0)).collect())
    }

    /// Sets the bit at `index`, returns whether it was clear before.
    pub(crate) fn claim(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);

        let before = word.fetch_or(mask, Ordering::AcqRel);

        before & mask == 0
    }

    /// Clears the bit at `index`, returns whether it was set before.
    ///
    /// Concurrent releases of the same bit are resolved atomically: only one of them observes the bit set.
    pub(crate) fn release(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);

        let before = word.fetch_and(!mask, Ordering::AcqRel);

        before & mask != 0
    }

    /// Returns whether the bit at `index` is set.
    pub(crate) fn is_set(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);

        word.load(Ordering::Acquire) & mask != 0
    }

    /// Returns the number of bits set.
    pub(crate) fn count(&self) -> usize {
        self.0.iter().map(|word| word.load(Ordering::Acquire).count_ones() as usize).sum()
    }

    fn locate(&self, index: usize) -> (&AtomicU64, u64) {
        let word = &self.0[index / Self::WORD_BITS];
        let mask = 1u64 << (index % Self::WORD_BITS);

        (word, mask)
    }
}
