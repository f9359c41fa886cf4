use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

/// Where an integer lies relative to a [`Subrange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// The value is below the lower bound.
    Less,
    /// The value is above the upper bound.
    Greater,
    /// The value is within the bounds.
    Contains,
}

/// How a [`Subrange`] relates to another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeOrdering {
    /// Entirely below the other range.
    Less,
    /// Entirely above the other range.
    Greater,
    /// The ranges share at least one integer.
    Overlaps,
}

/// A closed interval of integers `[low, high]`, with `low <= high`.
///
/// ```rust
/// use ranged_enum::Subrange;
///
/// let reserved = Subrange::new(11, 14).unwrap();
/// assert!(reserved.contains(12));
/// assert!(15i64 > reserved);
/// assert_eq!(reserved.to_string(), "11..14");
/// assert_eq!(format!("0x{:02X}", reserved), "0x0B..0E");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Subrange {
    low: i64,
    high: i64,
}

impl Subrange {
    /// Creates the subrange `[low, high]`.
    ///
    /// Fails with [`Error::InvalidRange`] when `low > high`.
    pub fn new(low: i64, high: i64) -> Result<Self> {
        if low > high {
            return Err(Error::InvalidRange {
                member: None,
                low,
                high,
            });
        }
        Ok(Self { low, high })
    }

    /// Creates the subrange holding only `value`.
    pub const fn singleton(value: i64) -> Self {
        Self {
            low: value,
            high: value,
        }
    }

    pub const fn low(&self) -> i64 {
        self.low
    }

    pub const fn high(&self) -> i64 {
        self.high
    }

    /// True when the subrange holds exactly one integer.
    pub const fn is_singleton(&self) -> bool {
        self.low == self.high
    }

    /// True when the subrange holds more than one integer.
    pub const fn is_extended(&self) -> bool {
        self.low < self.high
    }

    /// Number of integers in the subrange. Never zero.
    pub const fn len(&self) -> u128 {
        (self.high as i128 - self.low as i128) as u128 + 1
    }

    pub const fn contains(&self, value: i64) -> bool {
        self.low <= value && value <= self.high
    }

    /// Locates `value` relative to the subrange.
    pub fn compare_to_value(&self, value: i64) -> Placement {
        if value < self.low {
            Placement::Less
        } else if value > self.high {
            Placement::Greater
        } else {
            Placement::Contains
        }
    }

    /// Compares with `other` under strict separation: touching bounds overlap.
    pub fn compare_to_range(&self, other: &Subrange) -> RangeOrdering {
        if self.high < other.low {
            RangeOrdering::Less
        } else if self.low > other.high {
            RangeOrdering::Greater
        } else {
            RangeOrdering::Overlaps
        }
    }

    pub fn iter(&self) -> RangeInclusive<i64> {
        self.low..=self.high
    }

    /// Writes both bounds through `write_bound`, joined by `..` unless singleton.
    fn write_bounds(
        &self,
        f: &mut fmt::Formatter<'_>,
        write_bound: fn(&i64, &mut fmt::Formatter<'_>) -> fmt::Result,
    ) -> fmt::Result {
        write_bound(&self.low, f)?;
        if self.is_extended() {
            f.write_str("..")?;
            write_bound(&self.high, f)?;
        }
        Ok(())
    }
}

impl From<Subrange> for RangeInclusive<i64> {
    fn from(range: Subrange) -> Self {
        range.low..=range.high
    }
}

impl IntoIterator for Subrange {
    type Item = i64;
    type IntoIter = RangeInclusive<i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl PartialOrd for Subrange {
    /// Strictly separated subranges are ordered; overlapping ones are not.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match self.compare_to_range(other) {
            RangeOrdering::Less => Some(Ordering::Less),
            RangeOrdering::Greater => Some(Ordering::Greater),
            RangeOrdering::Overlaps => None,
        }
    }
}

impl PartialEq<i64> for Subrange {
    fn eq(&self, other: &i64) -> bool {
        self.is_singleton() && self.low == *other
    }
}

impl PartialEq<Subrange> for i64 {
    fn eq(&self, other: &Subrange) -> bool {
        other == self
    }
}

impl PartialOrd<i64> for Subrange {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        match self.compare_to_value(*other) {
            Placement::Greater => Some(Ordering::Less),
            Placement::Less => Some(Ordering::Greater),
            Placement::Contains if self.is_singleton() => Some(Ordering::Equal),
            Placement::Contains => None,
        }
    }
}

impl PartialOrd<Subrange> for i64 {
    fn partial_cmp(&self, other: &Subrange) -> Option<Ordering> {
        other.partial_cmp(self).map(Ordering::reverse)
    }
}

impl fmt::Display for Subrange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_bounds(f, fmt::Display::fmt)
    }
}

impl fmt::LowerHex for Subrange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_bounds(f, fmt::LowerHex::fmt)
    }
}

impl fmt::UpperHex for Subrange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_bounds(f, fmt::UpperHex::fmt)
    }
}

impl fmt::Octal for Subrange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_bounds(f, fmt::Octal::fmt)
    }
}

impl fmt::Binary for Subrange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_bounds(f, fmt::Binary::fmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        assert_eq!(
            Subrange::new(10, 3),
            Err(Error::InvalidRange {
                member: None,
                low: 10,
                high: 3
            })
        );
        assert!(Subrange::new(3, 3).unwrap().is_singleton());
    }

    #[test]
    fn value_placement() {
        let range = Subrange::new(3, 10).unwrap();
        assert_eq!(range.compare_to_value(2), Placement::Less);
        assert_eq!(range.compare_to_value(3), Placement::Contains);
        assert_eq!(range.compare_to_value(10), Placement::Contains);
        assert_eq!(range.compare_to_value(11), Placement::Greater);
    }

    #[test]
    fn touching_ranges_overlap() {
        let a = Subrange::new(1, 5).unwrap();
        let b = Subrange::new(5, 10).unwrap();
        let c = Subrange::new(6, 10).unwrap();
        assert_eq!(a.compare_to_range(&b), RangeOrdering::Overlaps);
        assert_eq!(a.compare_to_range(&c), RangeOrdering::Less);
        assert_eq!(c.compare_to_range(&a), RangeOrdering::Greater);
        assert_eq!(a.partial_cmp(&b), None);
        assert!(a < c);
    }

    #[test]
    fn integer_comparisons() {
        let user_defined = Subrange::new(3, 10).unwrap();
        let secondary = Subrange::singleton(2);
        assert!(11i64 > user_defined);
        assert!(2i64 < user_defined);
        assert!(!(7i64 < user_defined) && !(7i64 > user_defined) && 7i64 != user_defined);
        assert!(2i64 == secondary);
        assert!(secondary == 2i64);
    }

    #[test]
    fn length_spans_full_domain() {
        assert_eq!(Subrange::singleton(0).len(), 1);
        assert_eq!(Subrange::new(3, 10).unwrap().len(), 8);
        assert_eq!(Subrange::new(i64::MIN, i64::MAX).unwrap().len(), 1u128 << 64);
    }

    #[test]
    fn radix_formatting_applies_to_each_bound() {
        let range = Subrange::new(3, 10).unwrap();
        assert_eq!(range.to_string(), "3..10");
        assert_eq!(format!("{:02x}", range), "03..0a");
        assert_eq!(format!("{:#b}", Subrange::singleton(5)), "0b101");
        assert_eq!(format!("{:o}", range), "3..12");
        assert_eq!(range.iter().sum::<i64>(), 52);
    }
}
