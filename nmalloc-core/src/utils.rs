//! A collection of utilities.

use core::ptr::NonNull;

mod power_of_2;

pub use power_of_2::PowerOf2;

/// The maximum alignment of any primitive type of the platform, guaranteed for every allocation.
//  Safety:
//  -   16 is a power of 2.
pub const MAX_ALIGNMENT: PowerOf2 = unsafe { PowerOf2::new_unchecked(16) };

/// Returns whether the pointer is sufficiently aligned for the given alignment.
pub(crate) fn is_sufficiently_aligned_for(ptr: NonNull<u8>, alignment: PowerOf2) -> bool {
    (ptr.as_ptr() as usize) % alignment == 0
}

/// Returns the address of the pointer, for logging and indexing.
pub(crate) fn address_of(ptr: NonNull<u8>) -> usize { ptr.as_ptr() as usize }

#[cfg(test)]
mod tests {

use super::*;

#[test]
fn is_sufficiently_aligned_for() {
    fn is_aligned_for(ptr: usize, alignment: usize) -> bool {
        let alignment = PowerOf2::new(alignment).unwrap();
        let ptr = NonNull::new(ptr as *mut u8).unwrap();
        super::is_sufficiently_aligned_for(ptr, alignment)
    }

    assert!(is_aligned_for(16, 16));
    assert!(is_aligned_for(32, 16));
    assert!(is_aligned_for(4096, 16));

    assert!(!is_aligned_for(8, 16));
    assert!(!is_aligned_for(24, 16));
    assert!(!is_aligned_for(4097, 16));
}

#[test]
fn max_alignment_covers_primitives() {
    assert!(MAX_ALIGNMENT.value() >= core::mem::align_of::<u64>());
    assert!(MAX_ALIGNMENT.value() >= core::mem::align_of::<f64>());
    assert!(MAX_ALIGNMENT.value() >= core::mem::align_of::<usize>());
}

}
