//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A sale total recomputed from float prices can disagree with the       │
//! │  client's own sum by a fraction of a cent, and the offline sync        │
//! │  total check would then reject an honest record.                       │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every price, line total and sale total is an i64 count of cents.    │
//! │    Equality checks are exact.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use retail_core::money::Money;
//!
//! let price = Money::from_cents(6_500); // KES 65.00
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.cents(), 19_500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: subtraction never wraps and differences are meaningful
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialises as a bare integer**: wire format is plain cents
///
/// ## Where Money is Used
/// ```text
/// Product.price_cents ──► SaleItem.unit_price_cents ──► SaleItem.line_total_cents
///                                                            │
///                                   Σ line totals ◄──────────┘
///                                        │
///                                        ▼
///                     Sale.total_cents / Order.total_cents ──► Payment.amount_cents
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use retail_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units (shillings and cents).
    ///
    /// ## Example
    /// ```rust
    /// use retail_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(65, 50).cents(), 6_550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion (shillings), truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns the amount in whole units, rounding any fraction up.
    ///
    /// The mobile-money gateway only accepts whole shillings, so a
    /// KES 99.50 order is charged KES 100.
    ///
    /// ## Example
    /// ```rust
    /// use retail_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(9_950).major_rounded_up(), 100);
    /// assert_eq!(Money::from_cents(10_000).major_rounded_up(), 100);
    /// ```
    #[inline]
    pub const fn major_rounded_up(&self) -> i64 {
        let whole = self.0 / 100;
        if self.0 % 100 > 0 {
            whole + 1
        } else {
            whole
        }
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use retail_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies money by a quantity, returning `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Integer average over a count; zero when the count is zero.
    pub fn average_over(&self, count: i64) -> Money {
        if count == 0 {
            Money::zero()
        } else {
            Money(self.0 / count)
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the amount in shillings for logs.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}KES {}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(6_550).to_string(), "KES 65.50");
        assert_eq!(Money::from_cents(0).to_string(), "KES 0.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-KES 5.50");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_checked_multiply_overflow() {
        assert!(Money::from_cents(i64::MAX).checked_multiply_quantity(2).is_none());
        assert_eq!(
            Money::from_cents(250).checked_multiply_quantity(4),
            Some(Money::from_cents(1000))
        );
    }

    #[test]
    fn test_major_rounded_up() {
        assert_eq!(Money::from_cents(1).major_rounded_up(), 1);
        assert_eq!(Money::from_cents(100).major_rounded_up(), 1);
        assert_eq!(Money::from_cents(101).major_rounded_up(), 2);
        assert_eq!(Money::zero().major_rounded_up(), 0);
    }

    #[test]
    fn test_average_over_zero_count() {
        assert_eq!(Money::from_cents(900).average_over(0), Money::zero());
        assert_eq!(Money::from_cents(900).average_over(3).cents(), 300);
    }

    #[test]
    fn test_serialises_as_plain_integer() {
        let json = serde_json::to_string(&Money::from_cents(4200)).unwrap();
        assert_eq!(json, "4200");
    }
}
