//! Heuristic may-alias test for memory accesses.
//!
//! Two accesses are proven disjoint only for three address shapes, at a
//! given access width in bits:
//!
//! | Shape                         | Disjoint when         |
//! |-------------------------------|-----------------------|
//! | `m[K1]` vs `m[K2]`            | `|K1 - K2| * 8 >= w`  |
//! | `m[b op K1]` vs `m[b op K2]`  | `|K1 - K2| * 8 >= w`  |
//! | `m[b]` vs `m[b ± K]`          | `|K| * 8 >= w`        |
//!
//! Anything else may alias. Expressions that are not memory accesses are
//! never reported as aliasing by this test, unless they are identical.

use crate::analysis::ssa::{BinaryOp, ExpId, ExpNode, ExpPool};

/// Returns `true` if `e1` and `e2` may denote overlapping storage when
/// accessed `size` bits wide.
///
/// The test is symmetric: both operand orders must fail to prove the
/// accesses disjoint.
///
/// # Examples
///
/// ```rust
/// use ssaflow::analysis::{alias::may_alias, ExpPool};
///
/// let mut pool = ExpPool::new();
/// let a = pool.addr(0x1000);
/// let b = pool.addr(0x1004);
/// let (m1, m2) = (pool.mem_of(a), pool.mem_of(b));
/// assert!(!may_alias(&pool, m1, m2, 32));
/// assert!(may_alias(&pool, m1, m2, 40));
/// ```
#[must_use]
pub fn may_alias(pool: &ExpPool, e1: ExpId, e2: ExpId, size: u32) -> bool {
    if e1 == e2 {
        return true;
    }
    calc_may_alias(pool, e1, e2, size) && calc_may_alias(pool, e2, e1, size)
}

/// One-directional disjointness test behind [`may_alias`].
#[must_use]
pub fn calc_may_alias(pool: &ExpPool, e1: ExpId, e2: ExpId, size: u32) -> bool {
    let (ExpNode::MemOf(a1), ExpNode::MemOf(a2)) = (pool.node(e1), pool.node(e2)) else {
        return false;
    };
    let (a1, a2) = (*a1, *a2);

    if let (Some(k1), Some(k2)) = (pool.int_value(a1), pool.int_value(a2)) {
        if disjoint(k1, k2, size) {
            return false;
        }
    }

    if let (Some((op1, base1, off1)), Some((op2, base2, off2))) =
        (pool.as_binary(a1), pool.as_binary(a2))
    {
        if op1 == op2 && base1 == base2 {
            if let (Some(k1), Some(k2)) = (pool.int_value(off1), pool.int_value(off2)) {
                if disjoint(k1, k2, size) {
                    return false;
                }
            }
        }
    }

    if let Some((BinaryOp::Plus | BinaryOp::Minus, base2, off2)) = pool.as_binary(a2) {
        if a1 == base2 {
            if let Some(k2) = pool.int_value(off2) {
                if disjoint(0, k2, size) {
                    return false;
                }
            }
        }
    }

    true
}

fn disjoint(k1: i64, k2: i64, size: u32) -> bool {
    let diff = (i128::from(k1) - i128::from(k2)).abs();
    diff * 8 >= i128::from(size)
}
