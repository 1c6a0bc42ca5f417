//! Traversal framework shared by every IR query and rewrite.
//!
//! One walking engine, many behaviours: a pass describes *what* happens at
//! each node by implementing a small trait, and the generic drivers in this
//! module take care of *how* the expression trees of a statement are walked.
//!
//! # Architecture
//!
//! - [`ExpVisitor`] + [`walk_exp`] - read-only finders collecting facts
//!   (used locations, constants, memory hazards).
//! - [`ExpModifier`] + [`modify_exp`] - expression rewriters. `pre_modify`
//!   runs top-down and may replace a node outright; `post_modify` runs
//!   bottom-up on the node rebuilt from its rewritten children.
//! - [`StmtModifier`] - statement-level rewriters that may change the
//!   statement's own structure, not just a sub-expression.
//! - [`Statement::accept_visitor`], [`Statement::accept_modifier`] and
//!   [`Statement::accept_stmt_modifier`] - the statement side of the
//!   protocol. [`VisitFlags`] select collectors and the "part" behaviour.
//!
//! # Part Modifiers
//!
//! With [`VisitFlags::SKIP_DEF_TOP`] the location a statement defines is not
//! walked itself; only the address inside a memory left-hand side is. Call
//! bypassing relies on this so it never rewrites the very location being
//! defined, and used-location queries use it because `m[x] := ...` uses `x`
//! but not `m[x]`.
//!
//! # Change Tracking
//!
//! Modifiers carry their own change accumulator, exposed through
//! [`ExpModifier::changed`]. Drivers never inspect trees to detect changes.

mod finders;
mod modifiers;

pub use finders::{
    BadMemOfFinder, ComplexityFinder, ConstFinder, RefFinder, StackMemOfFinder, UsedLocalFinder,
    UsedLocsFinder,
};
pub use modifiers::{
    CallBypasser, CastInserter, ConscriptSetter, ConstCaster, ExpSubscripter, SizeStripper,
    SsaXformer, StmtCastInserter, StmtSsaXformer,
};

use bitflags::bitflags;

use crate::analysis::ssa::{ExpId, ExpNode, ExpPool, ExpRole, Statement, StmtId, StmtKind};

bitflags! {
    /// Options selecting which slots of a statement a traversal covers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VisitFlags: u8 {
        /// Include the values recorded in call definition collectors.
        const COLLECTORS = 0x01;
        /// Walk only the address of a memory left-hand side, never the
        /// defined location itself.
        const SKIP_DEF_TOP = 0x02;
    }
}

/// What a visitor wants to happen after seeing a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    /// Visit the children.
    Continue,
    /// Do not visit the children, but keep walking the rest of the tree.
    SkipChildren,
    /// Abandon the whole traversal.
    Stop,
}

/// Read-only expression visitor.
pub trait ExpVisitor {
    /// Called before the children of `id` are visited.
    fn pre_visit(&mut self, pool: &ExpPool, id: ExpId) -> VisitControl;

    /// Called after the children of `id` were visited (or skipped).
    fn post_visit(&mut self, _pool: &ExpPool, _id: ExpId) {}
}

/// Walks the tree rooted at `id` in pre-order.
///
/// Returns `false` if the visitor stopped the traversal.
pub fn walk_exp<V: ExpVisitor + ?Sized>(pool: &ExpPool, id: ExpId, visitor: &mut V) -> bool {
    match visitor.pre_visit(pool, id) {
        VisitControl::Stop => return false,
        VisitControl::SkipChildren => {}
        VisitControl::Continue => {
            for child in pool.node(id).children() {
                if !walk_exp(pool, child, visitor) {
                    return false;
                }
            }
        }
    }
    visitor.post_visit(pool, id);
    true
}

/// Expression rewriter.
///
/// `depth` is the nesting level of the node within the slot being rewritten:
/// 0 for the slot's root, 1 for its direct children (and for the address of a
/// memory left-hand side under [`VisitFlags::SKIP_DEF_TOP`]).
pub trait ExpModifier {
    /// Called top-down. Returning `Some` replaces the node and skips its children.
    fn pre_modify(&mut self, _pool: &mut ExpPool, _id: ExpId, _depth: usize) -> Option<ExpId> {
        None
    }

    /// Called bottom-up with the node rebuilt from its rewritten children.
    fn post_modify(&mut self, _pool: &mut ExpPool, id: ExpId, _depth: usize) -> ExpId {
        id
    }

    /// Returns `true` once the modifier changed anything.
    fn changed(&self) -> bool;
}

/// Rewrites the tree rooted at `id`, returning the handle of the result.
///
/// Parents are re-interned only when a child actually changed.
pub fn modify_exp<M: ExpModifier + ?Sized>(
    pool: &mut ExpPool,
    id: ExpId,
    modifier: &mut M,
    depth: usize,
) -> ExpId {
    if let Some(replaced) = modifier.pre_modify(pool, id, depth) {
        return replaced;
    }

    let node = pool.node(id).clone();
    let children = node.children();
    let mut rebuilt = id;
    if !children.is_empty() {
        let rewritten: Vec<ExpId> = children
            .iter()
            .map(|c| modify_exp(pool, *c, modifier, depth + 1))
            .collect();
        if rewritten != children {
            rebuilt = pool.intern(node.with_children(&rewritten));
        }
    }
    modifier.post_modify(pool, rebuilt, depth)
}

/// Statement-level rewriter.
pub trait StmtModifier {
    /// Rewrites the statement `id`, returning `true` if it changed.
    fn modify_stmt(&mut self, pool: &mut ExpPool, id: StmtId, kind: &mut StmtKind) -> bool;
}

impl Statement {
    /// Runs a finder over the statement's expressions.
    ///
    /// Returns `false` if the visitor stopped the traversal early.
    pub fn accept_visitor<V: ExpVisitor + ?Sized>(
        &self,
        pool: &ExpPool,
        visitor: &mut V,
        flags: VisitFlags,
    ) -> bool {
        for (e, role) in self.kind().slots() {
            let completed = match role {
                ExpRole::Collector if !flags.contains(VisitFlags::COLLECTORS) => continue,
                ExpRole::Def if flags.contains(VisitFlags::SKIP_DEF_TOP) => match pool.node(e) {
                    ExpNode::MemOf(addr) => walk_exp(pool, *addr, visitor),
                    _ => true,
                },
                _ => walk_exp(pool, e, visitor),
            };
            if !completed {
                return false;
            }
        }
        true
    }

    /// Runs an expression modifier over the statement's expressions.
    ///
    /// Returns the modifier's change accumulator afterwards.
    pub fn accept_modifier<M: ExpModifier + ?Sized>(
        &mut self,
        pool: &mut ExpPool,
        modifier: &mut M,
        flags: VisitFlags,
    ) -> bool {
        for (slot, role) in self.kind_mut().slots_mut() {
            match role {
                ExpRole::Collector if !flags.contains(VisitFlags::COLLECTORS) => {}
                ExpRole::Def if flags.contains(VisitFlags::SKIP_DEF_TOP) => {
                    if let ExpNode::MemOf(addr) = *pool.node(*slot) {
                        let rewritten = modify_exp(pool, addr, modifier, 1);
                        if rewritten != addr {
                            *slot = pool.mem_of(rewritten);
                        }
                    }
                }
                _ => *slot = modify_exp(pool, *slot, modifier, 0),
            }
        }
        modifier.changed()
    }

    /// Runs a statement modifier.
    pub fn accept_stmt_modifier<S: StmtModifier + ?Sized>(
        &mut self,
        pool: &mut ExpPool,
        modifier: &mut S,
    ) -> bool {
        let id = self.id();
        modifier.modify_stmt(pool, id, self.kind_mut())
    }
}
