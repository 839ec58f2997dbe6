use smallvec::SmallVec;
use std::fmt;

const WORD_BITS: usize = 64;

/// Set of small non-negative integers, normally alternative numbers
///
/// Grammars rarely have more than 64 alternatives per decision, so one
/// inline word covers the common case.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct AltSet {
    words: SmallVec<[u64; 1]>,
}

impl AltSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(value: usize) -> Self {
        let mut set = Self::new();
        set.insert(value);
        set
    }

    /// Returns true if the value was not present
    pub fn insert(&mut self, value: usize) -> bool {
        let (word, bit) = (value / WORD_BITS, value % WORD_BITS);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_set = self.words[word] & (1 << bit) != 0;
        self.words[word] |= 1 << bit;
        !was_set
    }

    pub fn remove(&mut self, value: usize) -> bool {
        let (word, bit) = (value / WORD_BITS, value % WORD_BITS);
        let Some(slot) = self.words.get_mut(word) else {
            return false;
        };
        let was_set = *slot & (1 << bit) != 0;
        *slot &= !(1 << bit);
        self.trim();
        was_set
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    #[must_use]
    pub fn contains(&self, value: usize) -> bool {
        self.words
            .get(value / WORD_BITS)
            .is_some_and(|word| word & (1 << (value % WORD_BITS)) != 0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Smallest member
    #[must_use]
    pub fn min(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != 0)
            .map(|(i, word)| i * WORD_BITS + word.trailing_zeros() as usize)
    }

    pub fn union_with(&mut self, other: &Self) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (mine, theirs) in self.words.iter_mut().zip(other.words.iter()) {
            *mine |= theirs;
        }
    }

    /// Members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros() as usize;
                remaining &= remaining - 1;
                Some(i * WORD_BITS + bit)
            })
        })
    }
}

impl FromIterator<usize> for AltSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl fmt::Display for AltSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for AltSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
