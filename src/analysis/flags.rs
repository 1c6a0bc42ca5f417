//! Recognition and rewriting of condition-code producing calls.
//!
//! Front ends describe the flag effects of an instruction with calls such as
//! `SUBFLAGS32(a, b, a - b)`, `SUBFLAGSFL(x, y)` or `LOGICALFLAGS32(r)`.
//! Once such a call reaches a branch, or a single flag is read, it can be
//! turned into an ordinary relational expression:
//!
//! ```text
//! %flags := SUBFLAGS32(r24{3}, 5, r24{3} - 5)
//! BRANCH 0x401040, condition signed less      =>   [r24{3} < 5]
//! %CF{7}                                      =>   r24{3} <u 5
//! %ZF{7}                                      =>   (r24{3} - 5) == 0
//! ```

use crate::analysis::ssa::{BinaryOp, BranchType, ExpId, ExpPool};

/// Returns `true` for an integer subtract-and-compare flag call.
#[must_use]
pub fn is_sub_flags(name: &str) -> bool {
    name.starts_with("SUBFLAGS") && !is_sub_flags_fl(name)
}

/// Returns `true` for the floating-point compare flag call.
#[must_use]
pub fn is_sub_flags_fl(name: &str) -> bool {
    name == "SUBFLAGSFL"
}

/// Returns `true` for a logical-operation flag call.
#[must_use]
pub fn is_logical_flags(name: &str) -> bool {
    name.starts_with("LOGICALFLAGS")
}

fn flag_call(pool: &ExpPool, e: ExpId) -> Option<(String, Vec<ExpId>)> {
    pool.as_flag_call(e)
        .map(|(name, args)| (name.to_string(), args.to_vec()))
}

/// Returns the carry flag computed by `rhs`, as `P1 <u P2`.
///
/// Only integer subtract-and-compare calls qualify.
pub fn carry_condition(pool: &mut ExpPool, rhs: ExpId) -> Option<ExpId> {
    let (name, args) = flag_call(pool, rhs)?;
    if !is_sub_flags(&name) || args.len() < 2 {
        return None;
    }
    Some(pool.binary(BinaryOp::LessUns, args[0], args[1]))
}

/// Returns the zero flag computed by `rhs`.
///
/// `SUBFLAGS*(P1, P2, P3)` gives `P3 == 0` and `SUBFLAGSFL(P1, P2)` gives
/// `P1 == P2`.
pub fn zero_condition(pool: &mut ExpPool, rhs: ExpId) -> Option<ExpId> {
    let (name, args) = flag_call(pool, rhs)?;
    if is_sub_flags_fl(&name) && args.len() >= 2 {
        return Some(pool.binary(BinaryOp::Equals, args[0], args[1]));
    }
    if is_sub_flags(&name) && args.len() >= 3 {
        let zero = pool.int(0);
        return Some(pool.binary(BinaryOp::Equals, args[2], zero));
    }
    None
}

/// Rewrites a branch condition computed by a flag call into a relational
/// expression.
///
/// Returns `None` when `cond` is not a recognised flag call, or the condition
/// kind has no relational equivalent for it (overflow, parity).
pub fn cond_to_relational(
    pool: &mut ExpPool,
    cond: ExpId,
    branch: BranchType,
    is_float: bool,
) -> Option<ExpId> {
    let (name, args) = flag_call(pool, cond)?;

    if is_sub_flags_fl(&name) {
        if args.len() < 2 {
            return None;
        }
        let op = match branch {
            BranchType::Je => BinaryOp::Equals,
            BranchType::Jne => BinaryOp::NotEqual,
            BranchType::Jsl | BranchType::Jul => BinaryOp::FLess,
            BranchType::Jsle | BranchType::Jule => BinaryOp::FLessEq,
            BranchType::Jsge | BranchType::Juge => BinaryOp::FGtrEq,
            BranchType::Jsg | BranchType::Jug => BinaryOp::FGtr,
            _ => return None,
        };
        return Some(pool.binary(op, args[0], args[1]));
    }
    if is_float {
        return None;
    }

    if is_sub_flags(&name) {
        if args.len() < 3 {
            return None;
        }
        let (p1, p2, p3) = (args[0], args[1], args[2]);
        let zero = pool.int(0);
        let (op, l, r) = match branch {
            BranchType::Je => (BinaryOp::Equals, p1, p2),
            BranchType::Jne => (BinaryOp::NotEqual, p1, p2),
            BranchType::Jsl => (BinaryOp::Less, p1, p2),
            BranchType::Jsle => (BinaryOp::LessEq, p1, p2),
            BranchType::Jsge => (BinaryOp::GtrEq, p1, p2),
            BranchType::Jsg => (BinaryOp::Gtr, p1, p2),
            BranchType::Jul => (BinaryOp::LessUns, p1, p2),
            BranchType::Jule => (BinaryOp::LessEqUns, p1, p2),
            BranchType::Juge => (BinaryOp::GtrEqUns, p1, p2),
            BranchType::Jug => (BinaryOp::GtrUns, p1, p2),
            BranchType::Jmi => (BinaryOp::Less, p3, zero),
            BranchType::Jpos => (BinaryOp::GtrEq, p3, zero),
            BranchType::Jof | BranchType::Jnof | BranchType::Jpar => return None,
        };
        return Some(pool.binary(op, l, r));
    }

    if is_logical_flags(&name) {
        let p1 = *args.first()?;
        let zero = pool.int(0);
        let op = match branch {
            BranchType::Je | BranchType::Jule => BinaryOp::Equals,
            BranchType::Jne | BranchType::Jug => BinaryOp::NotEqual,
            BranchType::Jmi | BranchType::Jsl => BinaryOp::Less,
            BranchType::Jpos | BranchType::Jsge => BinaryOp::GtrEq,
            BranchType::Jsle => BinaryOp::LessEq,
            BranchType::Jsg => BinaryOp::Gtr,
            _ => return None,
        };
        return Some(pool.binary(op, p1, zero));
    }

    None
}
