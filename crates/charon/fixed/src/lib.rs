//! Deterministic fixed-point decimal arithmetic
//!
//! The finality gadget accounts for deposits in scaled units and converts
//! them to wei through a per-epoch scale factor. Both quantities are carried
//! as [`Decimal`]: a signed fixed-point number with ten decimal places and an
//! `I256` mantissa. Multiplication and division truncate toward zero, which
//! is floor rounding for the non-negative operands the gadget uses at every
//! conversion boundary.
//!
//! Reward computation also needs a square root; [`sqrt`] runs a fixed number
//! of Newton iterations so the result is bit-for-bit reproducible across
//! implementations.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Decimal places carried by [`Decimal`].
pub const DECIMAL_PLACES: u32 = 10;

/// Newton iterations performed by [`sqrt`].
pub const SQRT_ITERATIONS: usize = 20;

const SCALE_U: U256 = U256::from_limbs([10_000_000_000, 0, 0, 0]);
const SCALE: I256 = I256::from_raw(SCALE_U);

/// Signed fixed-point decimal with ten decimal places.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Decimal(I256);

impl Decimal {
    /// The value `0`.
    pub const ZERO: Self = Self(I256::ZERO);

    /// The value `1`.
    pub const ONE: Self = Self(SCALE);

    /// Build from a whole number.
    pub fn from_int(value: u64) -> Self {
        Self(I256::from_raw(U256::from(value) * SCALE_U))
    }

    /// Build from a wei amount. Exact; wei values are far below the mantissa
    /// range.
    pub fn from_wei(value: U256) -> Self {
        Self(I256::from_raw(value * SCALE_U))
    }

    /// The fraction `numer / denom`, truncated to ten decimal places.
    pub fn ratio(numer: u64, denom: u64) -> Self {
        Self::from_int(numer) / Self::from_int(denom)
    }

    /// Wrap a raw mantissa (`value * 10^10`).
    pub const fn from_raw(mantissa: I256) -> Self {
        Self(mantissa)
    }

    /// The raw mantissa.
    pub const fn raw(self) -> I256 {
        self.0
    }

    /// Whether the value is exactly zero.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Whether the value is strictly positive.
    pub fn is_positive(self) -> bool {
        self.0.is_positive()
    }

    /// Whether the value is strictly negative.
    pub fn is_negative(self) -> bool {
        self.0.is_negative()
    }

    /// Truncate toward zero, keeping decimal form.
    pub fn trunc(self) -> Self {
        Self(self.0 / SCALE * SCALE)
    }

    /// Truncate to a whole-number `U256`. Negative values clamp to zero.
    pub fn floor_u256(self) -> U256 {
        if self.0.is_negative() {
            return U256::ZERO;
        }
        self.0.into_raw() / SCALE_U
    }

    /// The smaller of two values.
    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    /// The larger of two values.
    pub fn max(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }
}

fn widen(value: u64) -> I256 {
    I256::from_raw(U256::from(value))
}

impl Add for Decimal {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Decimal {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Decimal {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul for Decimal {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0 / SCALE)
    }
}

impl Div for Decimal {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self(self.0 * SCALE / rhs.0)
    }
}

impl Mul<u64> for Decimal {
    type Output = Self;

    fn mul(self, rhs: u64) -> Self {
        Self(self.0 * widen(rhs))
    }
}

impl Div<u64> for Decimal {
    type Output = Self;

    fn div(self, rhs: u64) -> Self {
        Self(self.0 / widen(rhs))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        let int = magnitude / SCALE_U;
        let frac = magnitude % SCALE_U;
        let sign = if self.0.is_negative() { "-" } else { "" };
        if frac.is_zero() {
            write!(f, "{sign}{int}")
        } else {
            let digits = format!("{frac:010}");
            write!(f, "{sign}{int}.{}", digits.trim_end_matches('0'))
        }
    }
}

/// Fixed-iteration Newton square root.
///
/// Runs exactly [`SQRT_ITERATIONS`] rounds of `x <- (x + value / x) / 2`
/// seeded with `value / 2`, in decimal arithmetic. Callers pass values of at
/// least one; smaller inputs return unrefined.
pub fn sqrt(value: Decimal) -> Decimal {
    if !value.is_positive() {
        return Decimal::ZERO;
    }
    let mut x = value / 2u64;
    if x.is_zero() {
        return value;
    }
    for _ in 0..SQRT_ITERATIONS {
        x = (x + value / x) / 2u64;
    }
    x
}
