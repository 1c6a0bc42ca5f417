//! Algebraic simplification of interned expressions.
//!
//! A compact bottom-up rewriter: constant folding, identity elimination,
//! offset re-association and operand canonicalisation. It is the
//! normalisation step the propagation engine runs once a statement has
//! converged, so it favours cheap, always-valid rewrites over completeness.
//!
//! # Rules
//!
//! | Pattern | Result |
//! |---------|--------|
//! | `K1 op K2` | folded constant |
//! | `x + 0`, `x - 0`, `x * 1`, `x \| 0`, `x ^ 0` | `x` |
//! | `x * 0`, `x & 0`, `x - x`, `x ^ x` | `0` |
//! | `(x + K1) + K2`, `(x - K1) + K2`, ... | `x + K` |
//! | `K + x` (commutative) | `x + K` |
//! | `x + -K` | `x - K` |
//! | `--x`, `~~x` | `x` |
//! | `!(a < b)` | `a >= b` |
//! | `m[a[x]]`, `a[m[x]]` | `x` |

use crate::analysis::ssa::{
    exp::{BinaryOp, ExpId, ExpNode, UnaryOp},
    ExpPool,
};

/// Simplifies `root`, returning the handle of the normalised expression.
///
/// Runs the rewrite rules to a fixed point; the result is `root` itself when
/// nothing applies.
pub fn simplify(pool: &mut ExpPool, root: ExpId) -> ExpId {
    let mut current = root;
    // Every rule shrinks or canonicalises the tree, so this settles quickly.
    for _ in 0..8 {
        let next = simplify_once(pool, current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn simplify_once(pool: &mut ExpPool, id: ExpId) -> ExpId {
    let node = pool.node(id).clone();
    let children = node.children();
    if children.is_empty() {
        return id;
    }

    let simplified: Vec<ExpId> = children.iter().map(|c| simplify_once(pool, *c)).collect();
    let rebuilt = if simplified == children {
        id
    } else {
        pool.intern(node.with_children(&simplified))
    };

    match pool.node(rebuilt).clone() {
        ExpNode::Unary(op, operand) => simplify_unary(pool, rebuilt, op, operand),
        ExpNode::Binary(op, l, r) => simplify_binary(pool, rebuilt, op, l, r),
        ExpNode::MemOf(inner) => match pool.node(inner) {
            ExpNode::AddrOf(x) => *x,
            _ => rebuilt,
        },
        ExpNode::AddrOf(inner) => match pool.node(inner) {
            ExpNode::MemOf(x) => *x,
            _ => rebuilt,
        },
        _ => rebuilt,
    }
}

fn simplify_unary(pool: &mut ExpPool, id: ExpId, op: UnaryOp, operand: ExpId) -> ExpId {
    if let Some(v) = pool.int_value(operand) {
        let folded = match op {
            UnaryOp::Neg => v.wrapping_neg(),
            UnaryOp::Not => !v,
            UnaryOp::LNot => i64::from(v == 0),
        };
        return pool.int(folded);
    }

    match pool.node(operand).clone() {
        // --x = x, ~~x = x
        ExpNode::Unary(inner_op, inner) if inner_op == op && op != UnaryOp::LNot => inner,
        ExpNode::Unary(UnaryOp::LNot, inner) if op == UnaryOp::LNot => {
            // !!x only normalises when x is already a truth value.
            match pool.as_binary(inner) {
                Some((cmp, _, _)) if cmp.is_comparison() => inner,
                _ => id,
            }
        }
        ExpNode::Binary(cmp, l, r) if op == UnaryOp::LNot => match cmp.negated() {
            Some(neg) => pool.binary(neg, l, r),
            None => id,
        },
        _ => id,
    }
}

fn simplify_binary(pool: &mut ExpPool, id: ExpId, op: BinaryOp, l: ExpId, r: ExpId) -> ExpId {
    let lk = pool.int_value(l);
    let rk = pool.int_value(r);

    if let (Some(a), Some(b)) = (lk, rk) {
        if let Some(v) = fold_binary(op, a, b) {
            return pool.int(v);
        }
    }

    // Canonical order: constants on the right of commutative operators.
    if lk.is_some() && rk.is_none() && op.is_commutative() {
        return pool.binary(op, r, l);
    }

    if l == r {
        match op {
            BinaryOp::Minus | BinaryOp::BitXor => return pool.int(0),
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::And | BinaryOp::Or => return l,
            BinaryOp::Equals | BinaryOp::LessEq | BinaryOp::GtrEq => return pool.int(1),
            BinaryOp::NotEqual | BinaryOp::Less | BinaryOp::Gtr => return pool.int(0),
            _ => {}
        }
    }

    if let Some(k) = rk {
        match (op, k) {
            (BinaryOp::Plus | BinaryOp::Minus, 0)
            | (BinaryOp::BitOr | BinaryOp::BitXor, 0)
            | (BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Sar, 0)
            | (BinaryOp::Mult | BinaryOp::Mults, 1)
            | (BinaryOp::Div | BinaryOp::Divs, 1) => return l,
            (BinaryOp::Mult | BinaryOp::Mults | BinaryOp::BitAnd, 0) => return pool.int(0),
            _ => {}
        }

        if matches!(op, BinaryOp::Plus | BinaryOp::Minus) {
            return reassociate(pool, id, op, l, k);
        }
    }

    id
}

/// Merges `(x ± K1) ± K2` into `x ± K` and normalises the sign of the offset.
fn reassociate(pool: &mut ExpPool, id: ExpId, op: BinaryOp, l: ExpId, k: i64) -> ExpId {
    let offset = if op == BinaryOp::Plus {
        k
    } else {
        k.wrapping_neg()
    };

    let (base, total) = match pool.as_binary(l) {
        Some((BinaryOp::Plus, x, inner)) => match pool.int_value(inner) {
            Some(k1) => (x, k1.wrapping_add(offset)),
            None => (l, offset),
        },
        Some((BinaryOp::Minus, x, inner)) => match pool.int_value(inner) {
            Some(k1) => (x, offset.wrapping_sub(k1)),
            None => (l, offset),
        },
        _ => (l, offset),
    };

    if base == l && ((op == BinaryOp::Plus && k >= 0) || (op == BinaryOp::Minus && k > 0)) {
        return id;
    }
    if total == 0 {
        return base;
    }
    if total < 0 {
        let magnitude = pool.int(total.wrapping_neg());
        pool.binary(BinaryOp::Minus, base, magnitude)
    } else {
        let magnitude = pool.int(total);
        pool.binary(BinaryOp::Plus, base, magnitude)
    }
}

fn fold_binary(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    let ua = a as u64;
    let ub = b as u64;
    let v = match op {
        BinaryOp::Plus => a.wrapping_add(b),
        BinaryOp::Minus => a.wrapping_sub(b),
        BinaryOp::Mult => ua.wrapping_mul(ub) as i64,
        BinaryOp::Mults => a.wrapping_mul(b),
        BinaryOp::Div => ua.checked_div(ub)? as i64,
        BinaryOp::Divs => a.checked_div(b)?,
        BinaryOp::Mod => ua.checked_rem(ub)? as i64,
        BinaryOp::Mods => a.checked_rem(b)?,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl => a.checked_shl(u32::try_from(b).ok()?)?,
        BinaryOp::Shr => ua.checked_shr(u32::try_from(b).ok()?)? as i64,
        BinaryOp::Sar => a.checked_shr(u32::try_from(b).ok()?)?,
        BinaryOp::And => i64::from(a != 0 && b != 0),
        BinaryOp::Or => i64::from(a != 0 || b != 0),
        BinaryOp::Equals => i64::from(a == b),
        BinaryOp::NotEqual => i64::from(a != b),
        BinaryOp::Less => i64::from(a < b),
        BinaryOp::Gtr => i64::from(a > b),
        BinaryOp::LessEq => i64::from(a <= b),
        BinaryOp::GtrEq => i64::from(a >= b),
        BinaryOp::LessUns => i64::from(ua < ub),
        BinaryOp::GtrUns => i64::from(ua > ub),
        BinaryOp::LessEqUns => i64::from(ua <= ub),
        BinaryOp::GtrEqUns => i64::from(ua >= ub),
        BinaryOp::FLess | BinaryOp::FGtr | BinaryOp::FLessEq | BinaryOp::FGtrEq => return None,
    };
    Some(v)
}
