//! # Interval Sets
//!
//! Symbol sets used as transition labels and as results of lookahead analysis.
//!
//! Symbols are `i32` so that the negative sentinels [`EOF`] and [`EPSILON`]
//! can live in the same set as ordinary token types or code points.

use smallvec::SmallVec;
use std::fmt;

/// End of input, for both characters and tokens
pub const EOF: i32 = -1;

/// Marker placed in lookahead sets when the end of a rule is reachable
pub const EPSILON: i32 = -2;

/// Token type that never matches anything; also signals "hit a predicate" in LL(1) analysis
pub const INVALID_TYPE: i32 = 0;

/// Smallest token type a grammar may define
pub const MIN_USER_TOKEN_TYPE: i32 = 1;

/// Smallest code point a lexer can match
pub const MIN_CHAR: i32 = 0;

/// Largest code point a lexer can match
pub const MAX_CHAR: i32 = 0x10_FFFF;

/// Inclusive interval `a..=b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    pub a: i32,
    pub b: i32,
}

impl Interval {
    #[must_use]
    pub const fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    #[must_use]
    pub const fn contains(&self, symbol: i32) -> bool {
        self.a <= symbol && symbol <= self.b
    }

    /// Number of symbols covered, zero for an inverted interval
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.b < self.a {
            0
        } else {
            (self.b as i64 - self.a as i64 + 1) as usize
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.b < self.a
    }

    /// True when the intervals overlap or touch
    const fn adjacent_or_overlapping(&self, other: &Self) -> bool {
        (self.a as i64) <= other.b as i64 + 1 && (other.a as i64) <= self.b as i64 + 1
    }
}

/// Set of symbols stored as sorted, disjoint, non-adjacent intervals
///
/// Most labels are a single interval, so storage is inline for that case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalSet {
    intervals: SmallVec<[Interval; 1]>,
}

impl IntervalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set containing a single symbol
    #[must_use]
    pub fn of(symbol: i32) -> Self {
        Self::of_range(symbol, symbol)
    }

    /// Set containing `a..=b`
    #[must_use]
    pub fn of_range(a: i32, b: i32) -> Self {
        let mut set = Self::new();
        set.add_range(a, b);
        set
    }

    pub fn add(&mut self, symbol: i32) {
        self.add_range(symbol, symbol);
    }

    /// Insert `a..=b`, coalescing with neighbours so the representation stays canonical
    pub fn add_range(&mut self, a: i32, b: i32) {
        if b < a {
            return;
        }
        let mut added = Interval::new(a, b);
        // First interval that could touch the new one
        let mut i = self
            .intervals
            .partition_point(|existing| (existing.b as i64) + 1 < added.a as i64);
        while i < self.intervals.len() && self.intervals[i].adjacent_or_overlapping(&added) {
            let existing = self.intervals.remove(i);
            added = Interval::new(existing.a.min(added.a), existing.b.max(added.b));
        }
        self.intervals.insert(i, added);
    }

    pub fn add_set(&mut self, other: &Self) {
        for interval in &other.intervals {
            self.add_range(interval.a, interval.b);
        }
    }

    /// Union of two sets
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.add_set(other);
        result
    }

    pub fn remove(&mut self, symbol: i32) {
        let Some(i) = self.position(symbol) else {
            return;
        };
        let existing = self.intervals[i];
        self.intervals.remove(i);
        if existing.b > symbol {
            self.intervals.insert(i, Interval::new(symbol + 1, existing.b));
        }
        if existing.a < symbol {
            self.intervals.insert(i, Interval::new(existing.a, symbol - 1));
        }
    }

    /// Symbols of `self` not in `other`
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        let mut result = Self::new();
        for interval in &self.intervals {
            let mut start = interval.a as i64;
            let end = interval.b as i64;
            for hole in &other.intervals {
                if (hole.b as i64) < start || (hole.a as i64) > end {
                    continue;
                }
                if (hole.a as i64) > start {
                    result.add_range(start as i32, hole.a - 1);
                }
                start = hole.b as i64 + 1;
            }
            if start <= end {
                result.add_range(start as i32, end as i32);
            }
        }
        result
    }

    /// Symbols in `min..=max` that are not in `self`
    #[must_use]
    pub fn complement(&self, min: i32, max: i32) -> Self {
        Self::of_range(min, max).subtract(self)
    }

    #[must_use]
    pub fn contains(&self, symbol: i32) -> bool {
        self.position(symbol).is_some()
    }

    fn position(&self, symbol: i32) -> Option<usize> {
        self.intervals
            .binary_search_by(|interval| {
                if symbol < interval.a {
                    std::cmp::Ordering::Greater
                } else if symbol > interval.b {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of symbols in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.iter().map(Interval::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_nil()
    }

    #[must_use]
    pub fn min_element(&self) -> Option<i32> {
        self.intervals.first().map(|interval| interval.a)
    }

    #[must_use]
    pub fn max_element(&self) -> Option<i32> {
        self.intervals.last().map(|interval| interval.b)
    }

    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Iterate every symbol in ascending order
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|interval| interval.a..=interval.b)
    }
}

impl FromIterator<i32> for IntervalSet {
    fn from_iter<T: IntoIterator<Item = i32>>(iter: T) -> Self {
        let mut set = Self::new();
        for symbol in iter {
            set.add(symbol);
        }
        set
    }
}

fn fmt_symbol(f: &mut fmt::Formatter<'_>, symbol: i32) -> fmt::Result {
    match symbol {
        EOF => f.write_str("<EOF>"),
        EPSILON => f.write_str("<EPSILON>"),
        _ => write!(f, "{symbol}"),
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return f.write_str("{}");
        }
        let single = self.len() == 1;
        if !single {
            f.write_str("{")?;
        }
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt_symbol(f, interval.a)?;
            if interval.b != interval.a {
                f.write_str("..")?;
                fmt_symbol(f, interval.b)?;
            }
        }
        if !single {
            f.write_str("}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_coalesces_adjacent_ranges() {
        let mut set = IntervalSet::of_range(1, 3);
        set.add_range(4, 6);
        set.add(10);
        assert_eq!(set.intervals(), &[Interval::new(1, 6), Interval::new(10, 10)]);
        set.add_range(7, 9);
        assert_eq!(set.intervals(), &[Interval::new(1, 10)]);
    }

    #[test]
    fn test_remove_splits_interval() {
        let mut set = IntervalSet::of_range(1, 5);
        set.remove(3);
        assert_eq!(set.intervals(), &[Interval::new(1, 2), Interval::new(4, 5)]);
        assert!(!set.contains(3));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_complement_and_subtract() {
        let set: IntervalSet = [2, 3, 7].into_iter().collect();
        let complement = set.complement(1, 8);
        assert_eq!(
            complement.intervals(),
            &[Interval::new(1, 1), Interval::new(4, 6), Interval::new(8, 8)]
        );
        assert!(complement.subtract(&IntervalSet::of_range(0, 100)).is_nil());
    }

    #[test]
    fn test_sentinels_sort_first() {
        let mut set = IntervalSet::of(5);
        set.add(EOF);
        set.add(EPSILON);
        assert_eq!(set.min_element(), Some(EPSILON));
        assert_eq!(format!("{set}"), "{<EPSILON>..<EOF>, 5}");
    }

    #[test]
    fn test_display_single_symbol() {
        assert_eq!(format!("{}", IntervalSet::of(42)), "42");
        assert_eq!(format!("{}", IntervalSet::new()), "{}");
    }
}
