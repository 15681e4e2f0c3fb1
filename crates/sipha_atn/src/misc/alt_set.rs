use smallvec::SmallVec;
use std::fmt;

/// A small ordered set of alternative numbers.
///
/// Alternatives are numbered from 1. Most decisions have a handful of
/// alternatives, so the set is kept as a sorted inline vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AltSet {
    alts: SmallVec<[usize; 4]>,
}

impl AltSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn of(alt: usize) -> Self {
        let mut set = Self::new();
        set.insert(alt);
        set
    }

    /// Adds `alt`, returning false if it was already present.
    pub fn insert(&mut self, alt: usize) -> bool {
        match self.alts.binary_search(&alt) {
            Ok(_) => false,
            Err(pos) => {
                self.alts.insert(pos, alt);
                true
            }
        }
    }

    #[must_use]
    pub fn contains(&self, alt: usize) -> bool {
        self.alts.binary_search(&alt).is_ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alts.is_empty()
    }

    /// Lowest alternative in the set.
    #[must_use]
    pub fn min(&self) -> Option<usize> {
        self.alts.first().copied()
    }

    pub fn union_with(&mut self, other: &AltSet) {
        for &alt in &other.alts {
            self.insert(alt);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.alts.iter().copied()
    }
}

impl FromIterator<usize> for AltSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = AltSet::new();
        for alt in iter {
            set.insert(alt);
        }
        set
    }
}

impl fmt::Display for AltSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.alts.iter().map(ToString::to_string).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
