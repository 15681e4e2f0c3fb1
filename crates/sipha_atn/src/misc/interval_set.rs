use crate::recognizer::Vocabulary;
use crate::token::{EOF, EPSILON};
use smallvec::SmallVec;
use std::fmt;

/// Inclusive range of symbol values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    pub start: i32,
    pub stop: i32,
}

impl Interval {
    #[must_use]
    pub const fn new(start: i32, stop: i32) -> Self {
        Self { start, stop }
    }

    /// Number of values covered by the interval.
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.stop < self.start {
            0
        } else {
            (self.stop as i64 - self.start as i64 + 1) as usize
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stop < self.start
    }

    #[must_use]
    pub const fn contains(&self, value: i32) -> bool {
        self.start <= value && value <= self.stop
    }
}

/// A set of symbol values stored as sorted, disjoint, non-adjacent inclusive ranges.
///
/// Adjacent and overlapping ranges are coalesced on insertion, so two sets with the
/// same members always have the same interval list.
///
/// ```rust
/// use sipha_atn::misc::IntervalSet;
///
/// let mut set = IntervalSet::of_range(1, 3);
/// set.add_range(4, 6);
/// set.add(10);
/// assert_eq!(set.intervals().len(), 2);
/// assert!(set.contains(5));
/// assert_eq!(set.to_string(), "{1..6, 10}");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalSet {
    intervals: SmallVec<[Interval; 2]>,
}

impl IntervalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set containing a single value.
    #[must_use]
    pub fn of(value: i32) -> Self {
        Self::of_range(value, value)
    }

    /// Set containing every value in `start..=stop`.
    #[must_use]
    pub fn of_range(start: i32, stop: i32) -> Self {
        let mut set = Self::new();
        set.add_range(start, stop);
        set
    }

    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of values in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.iter().map(Interval::len).sum()
    }

    pub fn add(&mut self, value: i32) {
        self.add_range(value, value);
    }

    /// Inserts `start..=stop`, merging with any overlapping or adjacent range.
    pub fn add_range(&mut self, start: i32, stop: i32) {
        if stop < start {
            return;
        }
        let lo = self
            .intervals
            .partition_point(|iv| iv.stop < start.saturating_sub(1));
        let hi = self
            .intervals
            .partition_point(|iv| iv.start <= stop.saturating_add(1));
        if lo == hi {
            self.intervals.insert(lo, Interval::new(start, stop));
            return;
        }
        let merged = Interval::new(
            start.min(self.intervals[lo].start),
            stop.max(self.intervals[hi - 1].stop),
        );
        self.intervals.drain(lo..hi);
        self.intervals.insert(lo, merged);
    }

    pub fn add_set(&mut self, other: &IntervalSet) {
        for iv in &other.intervals {
            self.add_range(iv.start, iv.stop);
        }
    }

    #[must_use]
    pub fn contains(&self, value: i32) -> bool {
        let idx = self.intervals.partition_point(|iv| iv.stop < value);
        self.intervals
            .get(idx)
            .is_some_and(|iv| iv.start <= value)
    }

    pub fn remove(&mut self, value: i32) {
        self.remove_range(value, value);
    }

    fn remove_range(&mut self, start: i32, stop: i32) {
        if stop < start {
            return;
        }
        let mut out: SmallVec<[Interval; 2]> = SmallVec::with_capacity(self.intervals.len() + 1);
        for iv in &self.intervals {
            if iv.stop < start || iv.start > stop {
                out.push(*iv);
                continue;
            }
            if iv.start < start {
                out.push(Interval::new(iv.start, start - 1));
            }
            if iv.stop > stop {
                out.push(Interval::new(stop + 1, iv.stop));
            }
        }
        self.intervals = out;
    }

    /// Values in `self` that are not in `other`.
    #[must_use]
    pub fn subtract(&self, other: &IntervalSet) -> IntervalSet {
        let mut result = self.clone();
        for iv in &other.intervals {
            result.remove_range(iv.start, iv.stop);
        }
        result
    }

    /// Values of `vocabulary` that are not in `self`.
    #[must_use]
    pub fn complement(&self, vocabulary: &IntervalSet) -> IntervalSet {
        vocabulary.subtract(self)
    }

    #[must_use]
    pub fn min_element(&self) -> Option<i32> {
        self.intervals.first().map(|iv| iv.start)
    }

    #[must_use]
    pub fn max_element(&self) -> Option<i32> {
        self.intervals.last().map(|iv| iv.stop)
    }

    /// Every value in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|iv| iv.start..=iv.stop)
    }

    /// Renders the set using token names from `vocabulary`.
    #[must_use]
    pub fn to_string_with(&self, vocabulary: &Vocabulary) -> String {
        let names: Vec<String> = self
            .iter()
            .map(|t| match t {
                EOF => "<EOF>".to_string(),
                EPSILON => "<EPSILON>".to_string(),
                _ => vocabulary.display_name(t),
            })
            .collect();
        if names.len() == 1 {
            names.into_iter().next().unwrap_or_default()
        } else {
            format!("{{{}}}", names.join(", "))
        }
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |iv: &Interval| -> String {
            let one = |v: i32| match v {
                EOF => "<EOF>".to_string(),
                EPSILON => "<EPSILON>".to_string(),
                _ => v.to_string(),
            };
            if iv.start == iv.stop {
                one(iv.start)
            } else {
                format!("{}..{}", one(iv.start), one(iv.stop))
            }
        };
        if self.len() == 1 {
            return f.write_str(&render(&self.intervals[0]));
        }
        let parts: Vec<String> = self.intervals.iter().map(render).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl FromIterator<i32> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut set = IntervalSet::new();
        for v in iter {
            set.add(v);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_ranges_coalesce() {
        let mut set = IntervalSet::new();
        set.add_range(5, 7);
        set.add_range(1, 3);
        set.add(4);
        assert_eq!(set.intervals(), &[Interval::new(1, 7)]);
    }

    #[test]
    fn test_insert_between_disjoint_ranges() {
        let mut set = IntervalSet::of_range(1, 2);
        set.add_range(10, 12);
        set.add(6);
        assert_eq!(
            set.intervals(),
            &[Interval::new(1, 2), Interval::new(6, 6), Interval::new(10, 12)]
        );
        set.add_range(3, 9);
        assert_eq!(set.intervals(), &[Interval::new(1, 12)]);
    }

    #[test]
    fn test_contains_and_remove() {
        let mut set = IntervalSet::of_range(EOF, 3);
        assert!(set.contains(EOF));
        assert!(set.contains(0));
        assert!(!set.contains(4));
        set.remove(1);
        assert!(!set.contains(1));
        assert_eq!(set.intervals().len(), 2);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_complement() {
        let vocabulary = IntervalSet::of_range(1, 10);
        let mut set = IntervalSet::of_range(3, 4);
        set.add(8);
        let complement = set.complement(&vocabulary);
        assert_eq!(
            complement.intervals(),
            &[Interval::new(1, 2), Interval::new(5, 7), Interval::new(9, 10)]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(IntervalSet::of(EOF).to_string(), "<EOF>");
        assert_eq!(IntervalSet::new().to_string(), "{}");
        let set: IntervalSet = [1, 2, 3, 7].into_iter().collect();
        assert_eq!(set.to_string(), "{1..3, 7}");
    }

    #[test]
    fn test_min_max() {
        let set: IntervalSet = [9, 2, 5].into_iter().collect();
        assert_eq!(set.min_element(), Some(2));
        assert_eq!(set.max_element(), Some(9));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 5, 9]);
    }
}
