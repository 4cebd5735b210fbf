//! An integer guaranteed to be a PowerOf2.

use core::{num, ops};

/// PowerOf2
///
/// An integral guaranteed to be non-zero and a power of 2.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PowerOf2(num::NonZeroUsize);

impl PowerOf2 {
    /// Creates a new instance of PowerOf2.
    ///
    /// Or nothing if the value is not a power of 2.
    pub fn new(value: usize) -> Option<PowerOf2> {
        if value.count_ones() == 1 {
            //  Safety:
            //  -   Value is a power of 2, as per the if check.
            Some(unsafe { PowerOf2::new_unchecked(value) })
        } else {
            None
        }
    }

    /// Creates a new instance of PowerOf2.
    ///
    /// #   Safety
    ///
    /// Assumes that the value is a power of 2.
    pub const unsafe fn new_unchecked(value: usize) -> PowerOf2 {
        //  Safety:
        //  -   A power of 2 cannot be 0.
        PowerOf2(num::NonZeroUsize::new_unchecked(value))
    }

    /// Returns the inner value.
    pub const fn value(&self) -> usize { self.0.get() }

    /// Rounds the value up to the nearest higher multiple of `self`, or None on overflow.
    pub const fn round_up(&self, n: usize) -> Option<usize> {
        let mask = self.mask();

        match n.checked_add(mask) {
            Some(n) => Some(n & !mask),
            None => None,
        }
    }

    /// Returns the number of units of `self` necessary to hold `n`, or None on overflow.
    pub const fn units_for(&self, n: usize) -> Option<usize> {
        match self.round_up(n) {
            Some(n) => Some(n >> self.bit_index()),
            None => None,
        }
    }

    const fn bit_index(&self) -> usize { self.value().trailing_zeros() as usize }

    const fn mask(&self) -> usize { self.value() - 1 }
}

impl ops::Div<PowerOf2> for usize {
    type Output = usize;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, rhs: PowerOf2) -> usize { self >> rhs.bit_index() }
}

impl ops::Mul<usize> for PowerOf2 {
    type Output = usize;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn mul(self, rhs: usize) -> usize { rhs << self.bit_index() }
}

impl ops::Mul<PowerOf2> for usize {
    type Output = usize;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn mul(self, rhs: PowerOf2) -> usize { self << rhs.bit_index() }
}

impl ops::Rem<PowerOf2> for usize {
    type Output = usize;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn rem(self, rhs: PowerOf2) -> usize { self & rhs.mask() }
}

#[cfg(test)]
mod tests {

use super::*;

fn pow2(value: usize) -> PowerOf2 { PowerOf2::new(value).expect("Power of 2") }

#[test]
fn power_of_2_new() {
    fn new(value: usize) -> Option<usize> {
        PowerOf2::new(value).map(|p| p.value())
    }

    assert_eq!(None, new(0));
    assert_eq!(Some(1), new(1));
    assert_eq!(Some(2), new(2));
    assert_eq!(None, new(3));
    assert_eq!(Some(4), new(4));
    assert_eq!(None, new(6));
    assert_eq!(Some(4096), new(4096));
    assert_eq!(None, new(4095));
}

#[test]
fn power_of_2_div_mul_rem() {
    assert_eq!(0, 4095 / pow2(4096));
    assert_eq!(1, 4096 / pow2(4096));
    assert_eq!(1, 8191 / pow2(4096));
    assert_eq!(2, 8192 / pow2(4096));

    assert_eq!(12288, pow2(4096) * 3);
    assert_eq!(12288, 3 * pow2(4096));

    assert_eq!(0, 4096 % pow2(4096));
    assert_eq!(1, 4097 % pow2(4096));
    assert_eq!(15, 31 % pow2(16));
}

#[test]
fn power_of_2_round_up() {
    assert_eq!(Some(0), pow2(16).round_up(0));
    assert_eq!(Some(16), pow2(16).round_up(1));
    assert_eq!(Some(16), pow2(16).round_up(16));
    assert_eq!(Some(32), pow2(16).round_up(17));

    assert_eq!(Some(4096), pow2(4096).round_up(4000));
    assert_eq!(None, pow2(4096).round_up(usize::MAX));
    assert_eq!(None, pow2(4096).round_up(usize::MAX - 4094));
}

#[test]
fn power_of_2_units_for() {
    assert_eq!(Some(0), pow2(4096).units_for(0));
    assert_eq!(Some(1), pow2(4096).units_for(1));
    assert_eq!(Some(1), pow2(4096).units_for(4096));
    assert_eq!(Some(2), pow2(4096).units_for(4097));
    assert_eq!(None, pow2(4096).units_for(usize::MAX));
}

}
