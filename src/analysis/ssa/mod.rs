//! SSA-form intermediate representation of decompiled machine code.
//!
//! This module holds the data model every analysis works on: hash-consed
//! expressions, statements with their basic-block linkage, and the procedure
//! that owns them all.
//!
//! # Architecture
//!
//! - [`exp`] - expression nodes, operators and the [`Def`] of a reference
//! - [`pool`] - the [`ExpPool`] arena interning every expression
//! - [`simplify`](mod@simplify) - algebraic simplification to a fixed point
//! - [`types`] - machine-level types attached to definitions and casts
//! - [`locset`] - sets of locations exchanged between queries
//! - [`statement`] - the closed set of statement kinds
//! - [`block`] - basic blocks as ordered statement sequences
//! - [`procedure`] - the owner of statements, blocks and symbols
//!
//! # Expressions
//!
//! Expressions are immutable and interned: building the same tree twice
//! yields the same [`ExpId`], so structural equality is handle equality.
//! Rewrites build new nodes and leave the old ones in place.
//!
//! ```text
//! r24{7}          Ref(Register(24), Stmt(s7))
//! m[r28{-} - 4]   MemOf(Binary(Minus, Ref(Register(28), Implicit), Const 4))
//! %flags          Terminal(Flags)
//! ```
//!
//! # SSA References
//!
//! A use of a location carries the definition reaching it: `Def::Stmt(id)`
//! for a statement of the procedure, or [`Def::Implicit`] for a value live on
//! entry. Propagation replaces such a reference by the right-hand side of its
//! defining assignment.

pub mod block;
pub mod exp;
pub mod locset;
pub mod pool;
pub mod procedure;
pub mod simplify;
pub mod statement;
pub mod types;

pub use block::{BasicBlock, BlockId};
pub use exp::{BinaryOp, ConstValue, Def, ExpId, ExpNode, Terminal, UnaryOp};
pub use locset::{LocationSet, LocationSetDisplay};
pub use pool::{ExpDisplay, ExpPool};
pub use procedure::{ProcId, Procedure, SymbolMap};
pub use simplify::simplify;
pub use statement::{
    Argument, Assign, BoolAssign, Branch, BranchType, Call, Case, CollectedDef, DefCollector,
    Define, ExpRole, ImpRef, ImplicitAssign, Phi, Statement, StatementDisplay, StmtId, StmtKind,
    SwitchInfo,
};
pub use types::{Signedness, Type};
