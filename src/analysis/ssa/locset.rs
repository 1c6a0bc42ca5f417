//! Sets of locations exchanged between use queries and the propagation engine.

use std::{collections::BTreeSet, fmt};

use crate::analysis::ssa::{ExpId, ExpPool};

/// A set of expressions keyed by structural identity.
///
/// Since expressions are interned, structural identity is handle identity.
/// Iteration follows handle order, which keeps every consumer deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationSet {
    set: BTreeSet<ExpId>,
}

impl LocationSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `e`, returning `true` if it was not present.
    pub fn insert(&mut self, e: ExpId) -> bool {
        self.set.insert(e)
    }

    /// Removes `e`, returning `true` if it was present.
    pub fn remove(&mut self, e: ExpId) -> bool {
        self.set.remove(&e)
    }

    /// Returns `true` if `e` is a member.
    #[must_use]
    pub fn contains(&self, e: ExpId) -> bool {
        self.set.contains(&e)
    }

    /// Adds every member of `other`.
    pub fn union(&mut self, other: &LocationSet) {
        self.set.extend(other.set.iter().copied());
    }

    /// Finds a member equal to `loc` when subscripts are ignored.
    ///
    /// Used to look up "some version of `loc`" in a set of subscripted
    /// references.
    #[must_use]
    pub fn find_ns(&self, pool: &ExpPool, loc: ExpId) -> Option<ExpId> {
        self.set
            .iter()
            .copied()
            .find(|e| pool.eq_ignoring_subscripts(*e, loc))
    }

    /// Returns an iterator over the members in handle order.
    pub fn iter(&self) -> impl Iterator<Item = ExpId> + '_ {
        self.set.iter().copied()
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Returns a displayable rendering of the set.
    #[must_use]
    pub fn display<'a>(&'a self, pool: &'a ExpPool) -> LocationSetDisplay<'a> {
        LocationSetDisplay { set: self, pool }
    }
}

impl FromIterator<ExpId> for LocationSet {
    fn from_iter<T: IntoIterator<Item = ExpId>>(iter: T) -> Self {
        Self {
            set: iter.into_iter().collect(),
        }
    }
}

impl Extend<ExpId> for LocationSet {
    fn extend<T: IntoIterator<Item = ExpId>>(&mut self, iter: T) {
        self.set.extend(iter);
    }
}

/// Display adapter for [`LocationSet`].
pub struct LocationSetDisplay<'a> {
    set: &'a LocationSet,
    pool: &'a ExpPool,
}

impl fmt::Display for LocationSetDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, e) in self.set.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.pool.display(e))?;
        }
        write!(f, "}}")
    }
}
