//! Expression nodes of the SSA IR.
//!
//! Expressions are trees of operators over constants, registers, memory
//! dereferences and subscripted references. Nodes live in an
//! [`ExpPool`](crate::analysis::ExpPool) and refer to their children through
//! [`ExpId`] handles. Because the pool hash-conses every node, two handles are
//! equal exactly when the trees they denote are structurally equal.
//!
//! # SSA Subscripts
//!
//! [`ExpNode::Ref`] is the SSA version tag: `r24{12}` reads register 24 as
//! defined by statement 12. [`Def::Implicit`] stands for a value live on entry
//! to the procedure and prints as `r24{-}`.

use std::fmt;

use crate::analysis::ssa::{StmtId, Type};

/// Handle of an interned expression inside an [`ExpPool`](crate::analysis::ExpPool).
///
/// Handles are only meaningful for the pool that created them. Equality of
/// handles is structural equality of the expressions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpId(u32);

impl ExpId {
    /// Creates a handle from a raw pool index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw pool index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ExpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// The definition a subscripted reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Def {
    /// Value live on entry; no real assignment exists.
    Implicit,
    /// Defined by the given statement.
    Stmt(StmtId),
}

impl Def {
    /// Returns the defining statement, `None` for implicit definitions.
    #[must_use]
    pub const fn stmt(self) -> Option<StmtId> {
        match self {
            Def::Implicit => None,
            Def::Stmt(id) => Some(id),
        }
    }

    /// Returns `true` for the implicit sentinel.
    #[must_use]
    pub const fn is_implicit(self) -> bool {
        matches!(self, Def::Implicit)
    }
}

/// Literal payload of a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstValue {
    /// Signed integer.
    Int(i64),
    /// Code or data address.
    Addr(u64),
    /// IEEE-754 double, stored by bit pattern so it can be hashed.
    Float(u64),
    /// String literal.
    Str(String),
}

impl ConstValue {
    /// Returns the value as an integer for `Int` and `Addr` constants.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::Addr(a) => Some(*a as i64),
            ConstValue::Float(_) | ConstValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Addr(a) => write!(f, "0x{:x}", a),
            ConstValue::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            ConstValue::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Special locations and markers without children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// The integer condition-code aggregate.
    Flags,
    /// The floating-point condition-code aggregate.
    FFlags,
    /// Carry flag.
    Cf,
    /// Zero flag.
    Zf,
    /// Negative (sign) flag.
    Nf,
    /// Overflow flag.
    Of,
    /// Program counter.
    Pc,
    /// Stands for every location (`<all>`).
    DefineAll,
    /// Empty list terminator.
    Nil,
    /// Floating-point stack push pseudo-location.
    FPush,
    /// Floating-point stack pop pseudo-location.
    FPop,
}

impl Terminal {
    /// Returns `true` for the single-bit flags.
    #[must_use]
    pub const fn is_main_flag(self) -> bool {
        matches!(self, Terminal::Cf | Terminal::Zf | Terminal::Nf | Terminal::Of)
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Terminal::Flags => "%flags",
            Terminal::FFlags => "%fflags",
            Terminal::Cf => "%CF",
            Terminal::Zf => "%ZF",
            Terminal::Nf => "%NF",
            Terminal::Of => "%OF",
            Terminal::Pc => "%pc",
            Terminal::DefineAll => "<all>",
            Terminal::Nil => "nil",
            Terminal::FPush => "FPUSH",
            Terminal::FPop => "FPOP",
        };
        f.write_str(s)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Bitwise complement.
    Not,
    /// Logical not.
    LNot,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "~",
            UnaryOp::LNot => "!",
        };
        f.write_str(s)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition.
    Plus,
    /// Subtraction.
    Minus,
    /// Unsigned multiplication.
    Mult,
    /// Signed multiplication.
    Mults,
    /// Unsigned division.
    Div,
    /// Signed division.
    Divs,
    /// Unsigned remainder.
    Mod,
    /// Signed remainder.
    Mods,
    /// Bitwise and.
    BitAnd,
    /// Bitwise or.
    BitOr,
    /// Bitwise xor.
    BitXor,
    /// Shift left.
    Shl,
    /// Logical shift right.
    Shr,
    /// Arithmetic shift right.
    Sar,
    /// Logical and.
    And,
    /// Logical or.
    Or,
    /// Equality.
    Equals,
    /// Inequality.
    NotEqual,
    /// Signed less-than.
    Less,
    /// Signed greater-than.
    Gtr,
    /// Signed less-or-equal.
    LessEq,
    /// Signed greater-or-equal.
    GtrEq,
    /// Unsigned less-than.
    LessUns,
    /// Unsigned greater-than.
    GtrUns,
    /// Unsigned less-or-equal.
    LessEqUns,
    /// Unsigned greater-or-equal.
    GtrEqUns,
    /// Floating less-than.
    FLess,
    /// Floating greater-than.
    FGtr,
    /// Floating less-or-equal.
    FLessEq,
    /// Floating greater-or-equal.
    FGtrEq,
}

impl BinaryOp {
    /// Returns `true` if operands can be swapped without changing the result.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Plus
                | BinaryOp::Mult
                | BinaryOp::Mults
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Equals
                | BinaryOp::NotEqual
        )
    }

    /// Returns `true` for relational operators producing a truth value.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equals
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::Gtr
                | BinaryOp::LessEq
                | BinaryOp::GtrEq
                | BinaryOp::LessUns
                | BinaryOp::GtrUns
                | BinaryOp::LessEqUns
                | BinaryOp::GtrEqUns
                | BinaryOp::FLess
                | BinaryOp::FGtr
                | BinaryOp::FLessEq
                | BinaryOp::FGtrEq
        )
    }

    /// Returns the comparison that holds exactly when `self` does not.
    #[must_use]
    pub const fn negated(self) -> Option<BinaryOp> {
        let op = match self {
            BinaryOp::Equals => BinaryOp::NotEqual,
            BinaryOp::NotEqual => BinaryOp::Equals,
            BinaryOp::Less => BinaryOp::GtrEq,
            BinaryOp::GtrEq => BinaryOp::Less,
            BinaryOp::Gtr => BinaryOp::LessEq,
            BinaryOp::LessEq => BinaryOp::Gtr,
            BinaryOp::LessUns => BinaryOp::GtrEqUns,
            BinaryOp::GtrEqUns => BinaryOp::LessUns,
            BinaryOp::GtrUns => BinaryOp::LessEqUns,
            BinaryOp::LessEqUns => BinaryOp::GtrUns,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mult => "*",
            BinaryOp::Mults => "*!",
            BinaryOp::Div => "/",
            BinaryOp::Divs => "/!",
            BinaryOp::Mod => "%",
            BinaryOp::Mods => "%!",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Sar => ">>A",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Equals => "=",
            BinaryOp::NotEqual => "~=",
            BinaryOp::Less => "<",
            BinaryOp::Gtr => ">",
            BinaryOp::LessEq => "<=",
            BinaryOp::GtrEq => ">=",
            BinaryOp::LessUns => "<u",
            BinaryOp::GtrUns => ">u",
            BinaryOp::LessEqUns => "<=u",
            BinaryOp::GtrEqUns => ">=u",
            BinaryOp::FLess => "<f",
            BinaryOp::FGtr => ">f",
            BinaryOp::FLessEq => "<=f",
            BinaryOp::FGtrEq => ">=f",
        };
        f.write_str(s)
    }
}

/// One interned expression node.
///
/// Children are [`ExpId`] handles into the same pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpNode {
    /// A literal with its disambiguation tag (`conscript`, 0 when untagged).
    Const {
        /// The literal
        value: ConstValue,
        /// Disambiguation tag
        conscript: u32,
    },
    /// A special location or marker.
    Terminal(Terminal),
    /// Machine register `r{n}`.
    Register(u16),
    /// Decoder temporary.
    Temp(String),
    /// Named local variable.
    Local(String),
    /// Named parameter.
    Param(String),
    /// Named global variable.
    Global(String),
    /// Memory dereference `m[addr]`.
    MemOf(ExpId),
    /// Address-of `a[e]`.
    AddrOf(ExpId),
    /// Unary operation.
    Unary(UnaryOp, ExpId),
    /// Binary operation.
    Binary(BinaryOp, ExpId, ExpId),
    /// Condition-code producer such as `SUBFLAGS(a, b, a - b)`.
    FlagCall(String, Vec<ExpId>),
    /// Subscripted reference `base{def}`.
    Ref(ExpId, Def),
    /// Explicit bit-width annotation.
    Size(u16, ExpId),
    /// Explicit cast.
    Typed(Type, ExpId),
}

impl ExpNode {
    /// Returns the child handles in positional order.
    #[must_use]
    pub fn children(&self) -> Vec<ExpId> {
        match self {
            ExpNode::Const { .. }
            | ExpNode::Terminal(_)
            | ExpNode::Register(_)
            | ExpNode::Temp(_)
            | ExpNode::Local(_)
            | ExpNode::Param(_)
            | ExpNode::Global(_) => Vec::new(),
            ExpNode::MemOf(e)
            | ExpNode::AddrOf(e)
            | ExpNode::Unary(_, e)
            | ExpNode::Ref(e, _)
            | ExpNode::Size(_, e)
            | ExpNode::Typed(_, e) => vec![*e],
            ExpNode::Binary(_, l, r) => vec![*l, *r],
            ExpNode::FlagCall(_, args) => args.clone(),
        }
    }

    /// Returns a copy of this node with its children replaced, in order.
    ///
    /// `children` must have exactly as many elements as [`ExpNode::children`]
    /// returned; surplus elements are ignored and missing ones keep the old child.
    #[must_use]
    pub fn with_children(&self, children: &[ExpId]) -> ExpNode {
        let pick = |i: usize, old: ExpId| children.get(i).copied().unwrap_or(old);
        match self {
            ExpNode::MemOf(e) => ExpNode::MemOf(pick(0, *e)),
            ExpNode::AddrOf(e) => ExpNode::AddrOf(pick(0, *e)),
            ExpNode::Unary(op, e) => ExpNode::Unary(*op, pick(0, *e)),
            ExpNode::Ref(e, def) => ExpNode::Ref(pick(0, *e), *def),
            ExpNode::Size(bits, e) => ExpNode::Size(*bits, pick(0, *e)),
            ExpNode::Typed(ty, e) => ExpNode::Typed(ty.clone(), pick(0, *e)),
            ExpNode::Binary(op, l, r) => ExpNode::Binary(*op, pick(0, *l), pick(1, *r)),
            ExpNode::FlagCall(name, args) => ExpNode::FlagCall(
                name.clone(),
                args.iter()
                    .enumerate()
                    .map(|(i, a)| pick(i, *a))
                    .collect(),
            ),
            leaf => leaf.clone(),
        }
    }

    /// Returns `true` for nodes denoting storage.
    #[must_use]
    pub fn is_location(&self) -> bool {
        matches!(
            self,
            ExpNode::Register(_)
                | ExpNode::Temp(_)
                | ExpNode::Local(_)
                | ExpNode::Param(_)
                | ExpNode::Global(_)
                | ExpNode::MemOf(_)
        ) || matches!(self, ExpNode::Terminal(t) if *t != Terminal::Nil && *t != Terminal::DefineAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negated_comparisons_are_involutive() {
        for op in [
            BinaryOp::Equals,
            BinaryOp::Less,
            BinaryOp::GtrUns,
            BinaryOp::LessEqUns,
        ] {
            let neg = op.negated().unwrap();
            assert_eq!(neg.negated(), Some(op));
        }
        assert_eq!(BinaryOp::Plus.negated(), None);
    }

    #[test]
    fn test_with_children() {
        let node = ExpNode::Binary(BinaryOp::Plus, ExpId::new(1), ExpId::new(2));
        let swapped = node.with_children(&[ExpId::new(2), ExpId::new(1)]);
        assert_eq!(
            swapped,
            ExpNode::Binary(BinaryOp::Plus, ExpId::new(2), ExpId::new(1))
        );
        assert_eq!(swapped.children(), vec![ExpId::new(2), ExpId::new(1)]);
    }

    #[test]
    fn test_def_sentinel() {
        assert!(Def::Implicit.is_implicit());
        assert_eq!(Def::Stmt(StmtId::new(3)).stmt(), Some(StmtId::new(3)));
    }
}
