//! Description of various properties of the allocations.

use core::{mem, num};

pub use crate::utils::{PowerOf2, MAX_ALIGNMENT};

/// AllocationSize
///
/// The effective size of a given allocation.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct AllocationSize(usize);

impl AllocationSize {
    /// Creates a new instance with a specific value.
    pub const fn new(value: usize) -> Self { Self(value) }

    /// Returns the underlying value.
    pub const fn value(&self) -> usize { self.0 }
}

/// Category
///
/// The Category of an allocation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Category {
    /// Small.
    ///
    /// Small allocations are fulfilled by spans of their size class, and cached in ThreadCache.
    Small,
    /// Large.
    ///
    /// Large allocations are fulfilled by a dedicated mapping of the PageProvider, prefixed by a header.
    Large,
}

/// ClassSize
///
/// The class size of a Small allocation.
///
/// Large allocations are not bucketed by size, and therefore it is meaningless for them.
///
/// The classes are linear, by steps of `MIN_ALLOCATION_SIZE`, up to `LINEAR_LIMIT` bytes, then geometric, with
/// 4 classes per doubling.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ClassSize(usize);

impl ClassSize {
    /// Returns the minimum allocation size.
    ///
    /// nmalloc stores the link of the free list within freed blocks, requiring a minimum size.
    pub const fn minimum_allocation_size() -> AllocationSize { AllocationSize(MIN_ALLOCATION_SIZE) }

    /// Returns the number of class sizes necessary to cover all sizes up to `largest`, inclusive.
    pub fn number_classes(largest: AllocationSize) -> usize {
        match num::NonZeroUsize::new(largest.value()) {
            Some(largest) => Self::from_size(largest).value() + 1,
            None => 0,
        }
    }

    /// Creates a new instance.
    pub const fn new(value: usize) -> Self { Self(value) }

    /// Creates an instance based on the requested size of the allocation.
    ///
    /// The resulting class is the smallest class whose block size is greater than or equal to `size`.
    pub fn from_size(size: num::NonZeroUsize) -> Self {
        //  -     1-16  -> 0
        //  -    17-32  -> 1
        //  ...
        //  -   113-128 -> 7
        //
        //  -   129-160 -> 8
        //  -   161-192 -> 9
        //  -   193-224 -> 10
        //  -   225-256 -> 11
        //
        //  -   257-320 -> 12
        //  ...
        let size = size.get() - 1;

        if size < LINEAR_LIMIT {
            return Self(size / MIN_ALLOCATION_SIZE);
        }

        //  Index of highest bit of (requested size - 1).
        let highbit = USIZE_BITS - size.leading_zeros() as usize;

        //  Next two highest bits of (requested size - 1).
        let nextduo = (size >> (highbit - 3)) & 0b11;

        //  highbit 8: index 8-11
        //  highbit 9: index 12-15
        let base_index = (highbit - LINEAR_LIMIT_BITS - 1) * 4 + LINEAR_CLASSES;

        Self(base_index + nextduo)
    }

    /// Returns the underlying value.
    pub const fn value(&self) -> usize { self.0 }

    /// Returns the size of the blocks of this class size.
    ///
    /// Guarantees that the size is a multiple of `MAX_ALIGNMENT`.
    pub const fn size(&self) -> usize {
        //  0 -> 16
        //  ...
        //  7 -> 128
        //
        //  8 -> 160
        //  9 -> 192
        //  10 -> 224
        //  11 -> 256
        //
        //  12 -> 320
        //  ...
        if self.0 < LINEAR_CLASSES {
            return (self.0 + 1) * MIN_ALLOCATION_SIZE;
        }

        let (main, rem) = ((self.0 - LINEAR_CLASSES) / 4, (self.0 - LINEAR_CLASSES) % 4);

        let quarter = LINEAR_LIMIT / 4;

        (quarter * (5 + rem)) << main
    }

    /// Returns the number of blocks of this class size fitting in a given number of bytes.
    pub const fn number_elements(&self, bytes: usize) -> usize { bytes / self.size() }
}

//
//  Implementation Details.
//

//  The minimum allocation size is tailored so that:
//  -   A free-list link fits within the memory.
//  -   Every block size is a multiple of `MAX_ALIGNMENT`.
const MIN_ALLOCATION_SIZE: usize = MAX_ALIGNMENT.value();
const LINEAR_CLASSES: usize = 8;
const LINEAR_LIMIT: usize = MIN_ALLOCATION_SIZE * LINEAR_CLASSES;
const LINEAR_LIMIT_BITS: usize = LINEAR_LIMIT.trailing_zeros() as usize;
const USIZE_BITS: usize = mem::size_of::<usize>() * 8;

#[cfg(test)]
mod tests {

use super::*;

#[test]
fn assumptions() {
    assert!(MIN_ALLOCATION_SIZE >= mem::size_of::<*mut u8>());
    assert_eq!(1, MIN_ALLOCATION_SIZE.count_ones());
    assert_eq!(1, LINEAR_LIMIT.count_ones());
    assert_eq!(1, USIZE_BITS.count_ones());
}

#[test]
fn class_size_number_classes() {
    fn number_classes(largest: usize) -> usize {
        ClassSize::number_classes(AllocationSize::new(largest))
    }

    assert_eq!(0, number_classes(0));
    assert_eq!(1, number_classes(16));
    assert_eq!(8, number_classes(128));
    assert_eq!(12, number_classes(256));
    assert_eq!(16, number_classes(512));
    assert_eq!(28, number_classes(4096));
    assert_eq!(36, number_classes(16384));
}

#[test]
fn class_size_from_size() {
    fn from_size(size: usize) -> usize {
        let size = num::NonZeroUsize::new(size).expect("Not 0");
        let class_size = ClassSize::from_size(size);
        class_size.value()
    }

    assert_eq!(0, from_size(1));
    assert_eq!(0, from_size(16));
    assert_eq!(1, from_size(17));
    assert_eq!(1, from_size(32));
    assert_eq!(6, from_size(112));
    assert_eq!(7, from_size(113));
    assert_eq!(7, from_size(128));

    assert_eq!(8, from_size(129));
    assert_eq!(8, from_size(160));
    assert_eq!(9, from_size(161));
    assert_eq!(9, from_size(192));
    assert_eq!(10, from_size(193));
    assert_eq!(10, from_size(224));
    assert_eq!(11, from_size(225));
    assert_eq!(11, from_size(256));

    assert_eq!(12, from_size(257));
    assert_eq!(16, from_size(513));
    assert_eq!(27, from_size(4096));
    assert_eq!(35, from_size(16384));
}

#[test]
fn class_size_size() {
    fn size(class_size: usize) -> usize { ClassSize::new(class_size).size() }

    assert_eq!(16, size(0));
    assert_eq!(32, size(1));
    assert_eq!(128, size(7));

    assert_eq!(160, size(8));
    assert_eq!(192, size(9));
    assert_eq!(224, size(10));
    assert_eq!(256, size(11));

    assert_eq!(320, size(12));
    assert_eq!(512, size(15));
    assert_eq!(4096, size(27));
    assert_eq!(16384, size(35));
}

#[test]
fn class_size_smallest_fitting_class() {
    //  Every size maps to the smallest class whose block size holds it.
    for size in 1..=(1usize << 15) {
        let class_size = ClassSize::from_size(num::NonZeroUsize::new(size).expect("Not 0"));

        assert!(class_size.size() >= size, "{} -> {:?}", size, class_size);
        assert_eq!(0, class_size.size() % MAX_ALIGNMENT, "{:?}", class_size);

        if class_size.value() > 0 {
            let smaller = ClassSize::new(class_size.value() - 1);
            assert!(smaller.size() < size, "{} -> {:?}", size, class_size);
        }
    }
}

#[test]
fn class_size_monotonic() {
    for class in 1..64 {
        assert!(ClassSize::new(class - 1).size() < ClassSize::new(class).size());
    }
}

#[test]
fn class_size_number_elements() {
    fn number_elements(size: usize, bytes: usize) -> usize {
        let class_size = ClassSize::from_size(num::NonZeroUsize::new(size).expect("Not 0"));
        assert_eq!(size, class_size.size());

        class_size.number_elements(bytes)
    }

    assert_eq!(0, number_elements(16, 15));
    assert_eq!(1, number_elements(16, 16));
    assert_eq!(256, number_elements(16, 4096));

    assert_eq!(0, number_elements(160, 159));
    assert_eq!(25, number_elements(160, 4096));
    assert_eq!(64, number_elements(160, 10240));
}

}
