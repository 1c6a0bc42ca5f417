//! Basic blocks holding ordered statement sequences.
//!
//! A block owns the order of its statements and nothing else: the statements
//! themselves live in the procedure's arena. The sequence order is the
//! execution order within the block.
//!
//! # Block Structure
//!
//! ```text
//! B2 (0x401020):
//!     7 r24 := phi{3 5}
//!     8 r25 := r24{7} + 4
//!     9 BRANCH 0x401040, condition equals
//! ```
//!
//! Neighbour queries (`previous`/`next`) are answered by scanning this
//! sequence every time, so edits by other passes can never leave a stale link
//! behind.

use std::fmt;

use crate::analysis::ssa::StmtId;

/// Index of a basic block inside its procedure.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    /// Creates a block id from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A basic block: an address and an ordered list of statements.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    id: BlockId,
    address: u64,
    statements: Vec<StmtId>,
}

impl BasicBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new(id: BlockId, address: u64) -> Self {
        Self {
            id,
            address,
            statements: Vec::new(),
        }
    }

    /// Returns the block id.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the lowest native address of the block.
    #[must_use]
    pub const fn address(&self) -> u64 {
        self.address
    }

    /// Returns the statements in execution order.
    #[must_use]
    pub fn statements(&self) -> &[StmtId] {
        &self.statements
    }

    /// Returns the number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns `true` if the block holds no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Returns the position of `stmt` in the sequence.
    #[must_use]
    pub fn position(&self, stmt: StmtId) -> Option<usize> {
        self.statements.iter().position(|s| *s == stmt)
    }

    /// Appends a statement.
    pub(crate) fn push(&mut self, stmt: StmtId) {
        self.statements.push(stmt);
    }

    /// Inserts a statement at `index`, clamped to the end of the sequence.
    pub(crate) fn insert(&mut self, index: usize, stmt: StmtId) {
        let index = index.min(self.statements.len());
        self.statements.insert(index, stmt);
    }

    /// Removes `stmt` from the sequence, returning `true` if it was present.
    pub(crate) fn remove(&mut self, stmt: StmtId) -> bool {
        match self.position(stmt) {
            Some(pos) => {
                self.statements.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x}): {} statements", self.id, self.address, self.len())
    }
}
