//! Analysis infrastructure for SSA-form procedures.
//!
//! # Architecture
//!
//! - [`ssa`] - the IR: expressions, statements, blocks and procedures
//! - [`visitor`] - the traversal framework (finders, expression modifiers,
//!   statement modifiers) shared by every query and rewrite
//! - [`alias`] - heuristic may-alias test for memory accesses
//! - [`flags`] - rewriting of condition-code calls into relational expressions
//! - `traversal` - the statement-level operations built on the visitors,
//!   exposed as methods of [`Procedure`]
//!
//! The propagation engine driving these lives in [`crate::compiler`].

pub mod alias;
pub mod flags;
pub mod ssa;
mod traversal;
pub mod visitor;

pub use alias::may_alias;
pub use ssa::{
    Argument, Assign, BasicBlock, BinaryOp, BlockId, BoolAssign, Branch, BranchType, Call, Case,
    CollectedDef, ConstValue, Def, DefCollector, Define, ExpId, ExpNode, ExpPool, ExpRole,
    ImpRef, ImplicitAssign, LocationSet, Phi, ProcId, Procedure, Signedness, Statement, StmtId,
    StmtKind, SwitchInfo, SymbolMap, Terminal, Type, UnaryOp,
};
pub use visitor::{
    modify_exp, walk_exp, ExpModifier, ExpVisitor, StmtModifier, VisitControl, VisitFlags,
};
