// flags.rs - Invalidation flags and the bitsets that carry them
//
// A flag is a dense bit position. Flags are handed out once, while the
// model seals, and every node keeps several FlagSets (invalid, should-read,
// read-so-far) that the scheduler combines on every pass.
//
// Preconditions: none.
// Postconditions: the allocator never hands out the same bit twice.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::expr::ExprId;

/// A dirty-bit position.
pub type Flag = usize;

const WORD_BITS: usize = 64;

// ── FlagSet ─────────────────────────────────────────────────────────────────

/// Growable bitset over flags. Trailing zero words are insignificant, so two
/// sets with the same members compare equal whatever their capacity.
#[derive(Clone, Default)]
pub struct FlagSet {
    words: Vec<u64>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(flag: Flag) -> Self {
        let mut set = Self::new();
        set.insert(flag);
        set
    }

    /// Insert a flag. Returns true if it was not already present.
    pub fn insert(&mut self, flag: Flag) -> bool {
        let (word, mask) = locate(flag);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    /// Remove a flag. Returns true if it was present.
    pub fn remove(&mut self, flag: Flag) -> bool {
        let (word, mask) = locate(flag);
        match self.words.get_mut(word) {
            Some(w) if *w & mask != 0 => {
                *w &= !mask;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, flag: Flag) -> bool {
        let (word, mask) = locate(flag);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of flags in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn union_with(&mut self, other: &FlagSet) {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            *mine |= theirs;
        }
    }

    pub fn intersect_with(&mut self, other: &FlagSet) {
        for (i, mine) in self.words.iter_mut().enumerate() {
            *mine &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    pub fn difference_with(&mut self, other: &FlagSet) {
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            *mine &= !theirs;
        }
    }

    /// True if every flag of `self` is also in `other`.
    pub fn is_subset(&self, other: &FlagSet) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0) == 0)
    }

    pub fn intersects(&self, other: &FlagSet) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(mine, theirs)| mine & theirs != 0)
    }

    /// Flags in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * WORD_BITS + bit)
            })
        })
    }
}

fn locate(flag: Flag) -> (usize, u64) {
    (flag / WORD_BITS, 1u64 << (flag % WORD_BITS))
}

impl PartialEq for FlagSet {
    fn eq(&self, other: &Self) -> bool {
        let width = self.words.len().max(other.words.len());
        (0..width).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for FlagSet {}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        let mut set = FlagSet::new();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl fmt::Debug for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{flag}")?;
        }
        write!(f, "}}")
    }
}

// ── Allocator ───────────────────────────────────────────────────────────────

/// What a flag stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagPurpose {
    /// Direct invalidation of a variable, an observable or a bindable field.
    Invalidation(ExprId),
    /// The reserved "everything is invalid" bit.
    InvalidateAll,
    /// A conditional requires its predicate to have taken `branch`.
    Requirement { expr: ExprId, branch: bool },
}

/// Hands out flags in allocation order. The allocator lives inside the model
/// and is only reachable mutably until the model is sealed.
#[derive(Debug, Default)]
pub struct FlagAllocator {
    purposes: Vec<FlagPurpose>,
}

impl FlagAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, purpose: FlagPurpose) -> Flag {
        let flag = self.purposes.len();
        self.purposes.push(purpose);
        flag
    }

    /// Allocate the false/true requirement pair for a conditional and return
    /// the base. `base` means the predicate was false, `base + 1` true.
    pub fn allocate_requirement_pair(&mut self, expr: ExprId) -> Flag {
        let base = self.allocate(FlagPurpose::Requirement {
            expr,
            branch: false,
        });
        self.allocate(FlagPurpose::Requirement { expr, branch: true });
        base
    }

    /// Total number of allocated flags.
    pub fn len(&self) -> usize {
        self.purposes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.purposes.is_empty()
    }

    pub fn purpose(&self, flag: Flag) -> Option<FlagPurpose> {
        self.purposes.get(flag).copied()
    }

    /// The conditional and branch behind a requirement flag.
    pub fn requirement(&self, flag: Flag) -> Option<(ExprId, bool)> {
        match self.purpose(flag)? {
            FlagPurpose::Requirement { expr, branch } => Some((expr, branch)),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Flag, FlagPurpose)> + '_ {
        self.purposes.iter().copied().enumerate()
    }
}

/// Requirement flag for `branch` of a conditional whose pair starts at `base`.
pub fn requirement_flag(base: Flag, branch: bool) -> Flag {
    base + usize::from(branch)
}
