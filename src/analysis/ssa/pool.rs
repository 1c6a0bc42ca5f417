//! Hash-consing arena for expressions.
//!
//! Every expression of a procedure is interned exactly once in its
//! [`ExpPool`]. Interning makes structural equality a handle comparison and
//! lets any number of statements share a sub-tree safely: nothing is ever
//! edited in place, a rewrite always interns a new node and hands back its
//! handle.
//!
//! # Architecture
//!
//! - Constructors (`int`, `reg`, `mem_of`, `binary`, ...) intern a node and
//!   return its [`ExpId`].
//! - Predicates (`is_mem_of`, `is_subscript`, ...) inspect a node.
//! - [`ExpPool::substitute`] is the search-and-replace service used by the
//!   propagation engine.
//! - [`ExpPool::display`] renders an expression for diagnostics.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::analysis::ssa::{
    exp::{BinaryOp, ConstValue, Def, ExpId, ExpNode, Terminal, UnaryOp},
    Type,
};

/// Interning arena for the expressions of one procedure.
#[derive(Debug, Clone, Default)]
pub struct ExpPool {
    nodes: Vec<ExpNode>,
    lookup: FxHashMap<ExpNode, ExpId>,
}

impl ExpPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct nodes interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Interns `node`, returning the existing handle if an equal node exists.
    pub fn intern(&mut self, node: ExpNode) -> ExpId {
        if let Some(id) = self.lookup.get(&node) {
            return *id;
        }
        let id = ExpId::new(self.nodes.len() as u32);
        self.nodes.push(node.clone());
        self.lookup.insert(node, id);
        id
    }

    /// Returns the node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this pool.
    #[must_use]
    pub fn node(&self, id: ExpId) -> &ExpNode {
        &self.nodes[id.index()]
    }

    /// Returns the node behind `id`, or `None` for a foreign handle.
    #[must_use]
    pub fn get(&self, id: ExpId) -> Option<&ExpNode> {
        self.nodes.get(id.index())
    }

    // Constructors

    /// Interns an untagged integer constant.
    pub fn int(&mut self, value: i64) -> ExpId {
        self.constant(ConstValue::Int(value), 0)
    }

    /// Interns an untagged address constant.
    pub fn addr(&mut self, value: u64) -> ExpId {
        self.constant(ConstValue::Addr(value), 0)
    }

    /// Interns a constant with the given disambiguation tag.
    pub fn constant(&mut self, value: ConstValue, conscript: u32) -> ExpId {
        self.intern(ExpNode::Const { value, conscript })
    }

    /// Interns a terminal.
    pub fn terminal(&mut self, t: Terminal) -> ExpId {
        self.intern(ExpNode::Terminal(t))
    }

    /// Interns `%flags`.
    pub fn flags(&mut self) -> ExpId {
        self.terminal(Terminal::Flags)
    }

    /// Interns register `r{n}`.
    pub fn reg(&mut self, n: u16) -> ExpId {
        self.intern(ExpNode::Register(n))
    }

    /// Interns a decoder temporary.
    pub fn temp(&mut self, name: &str) -> ExpId {
        self.intern(ExpNode::Temp(name.to_string()))
    }

    /// Interns a named local.
    pub fn local(&mut self, name: &str) -> ExpId {
        self.intern(ExpNode::Local(name.to_string()))
    }

    /// Interns a named parameter.
    pub fn param(&mut self, name: &str) -> ExpId {
        self.intern(ExpNode::Param(name.to_string()))
    }

    /// Interns a named global.
    pub fn global(&mut self, name: &str) -> ExpId {
        self.intern(ExpNode::Global(name.to_string()))
    }

    /// Interns `m[addr]`.
    pub fn mem_of(&mut self, addr: ExpId) -> ExpId {
        self.intern(ExpNode::MemOf(addr))
    }

    /// Interns `a[e]`.
    pub fn addr_of(&mut self, e: ExpId) -> ExpId {
        self.intern(ExpNode::AddrOf(e))
    }

    /// Interns a unary operation.
    pub fn unary(&mut self, op: UnaryOp, e: ExpId) -> ExpId {
        self.intern(ExpNode::Unary(op, e))
    }

    /// Interns a binary operation.
    pub fn binary(&mut self, op: BinaryOp, left: ExpId, right: ExpId) -> ExpId {
        self.intern(ExpNode::Binary(op, left, right))
    }

    /// Interns a condition-code producing call.
    pub fn flag_call(&mut self, name: &str, args: Vec<ExpId>) -> ExpId {
        self.intern(ExpNode::FlagCall(name.to_string(), args))
    }

    /// Interns the subscripted reference `base{def}`.
    pub fn ref_exp(&mut self, base: ExpId, def: Def) -> ExpId {
        self.intern(ExpNode::Ref(base, def))
    }

    /// Interns a bit-width annotation.
    pub fn size(&mut self, bits: u16, e: ExpId) -> ExpId {
        self.intern(ExpNode::Size(bits, e))
    }

    /// Interns a cast.
    pub fn typed(&mut self, ty: Type, e: ExpId) -> ExpId {
        self.intern(ExpNode::Typed(ty, e))
    }

    // Predicates and accessors

    /// Returns `true` for `m[..]`.
    #[must_use]
    pub fn is_mem_of(&self, id: ExpId) -> bool {
        matches!(self.node(id), ExpNode::MemOf(_))
    }

    /// Returns `true` for integer (or address) constants.
    #[must_use]
    pub fn is_int_const(&self, id: ExpId) -> bool {
        self.int_value(id).is_some()
    }

    /// Returns `true` for any constant.
    #[must_use]
    pub fn is_const(&self, id: ExpId) -> bool {
        matches!(self.node(id), ExpNode::Const { .. })
    }

    /// Returns `true` for subscripted references.
    #[must_use]
    pub fn is_subscript(&self, id: ExpId) -> bool {
        matches!(self.node(id), ExpNode::Ref(..))
    }

    /// Returns `true` for `%flags`.
    #[must_use]
    pub fn is_flags(&self, id: ExpId) -> bool {
        matches!(self.node(id), ExpNode::Terminal(Terminal::Flags))
    }

    /// Returns `true` for the single-bit flags `%CF`, `%ZF`, `%NF`, `%OF`.
    #[must_use]
    pub fn is_main_flag(&self, id: ExpId) -> bool {
        matches!(self.node(id), ExpNode::Terminal(t) if t.is_main_flag())
    }

    /// Returns `true` for a specific terminal.
    #[must_use]
    pub fn is_terminal(&self, id: ExpId, t: Terminal) -> bool {
        matches!(self.node(id), ExpNode::Terminal(x) if *x == t)
    }

    /// Returns `true` for register nodes.
    #[must_use]
    pub fn is_reg(&self, id: ExpId) -> bool {
        matches!(self.node(id), ExpNode::Register(_))
    }

    /// Returns `true` for nodes denoting storage.
    #[must_use]
    pub fn is_location(&self, id: ExpId) -> bool {
        self.node(id).is_location()
    }

    /// Returns `true` for condition-code producing calls.
    #[must_use]
    pub fn is_flag_call(&self, id: ExpId) -> bool {
        matches!(self.node(id), ExpNode::FlagCall(..))
    }

    /// Returns the integer value of an `Int` or `Addr` constant.
    #[must_use]
    pub fn int_value(&self, id: ExpId) -> Option<i64> {
        match self.node(id) {
            ExpNode::Const { value, .. } => value.as_int(),
            _ => None,
        }
    }

    /// Returns the conscript of a constant.
    #[must_use]
    pub fn conscript(&self, id: ExpId) -> Option<u32> {
        match self.node(id) {
            ExpNode::Const { conscript, .. } => Some(*conscript),
            _ => None,
        }
    }

    /// Returns the first operand of a unary-shaped or binary node.
    #[must_use]
    pub fn sub1(&self, id: ExpId) -> Option<ExpId> {
        self.node(id).children().first().copied()
    }

    /// Returns the second operand of a binary node.
    #[must_use]
    pub fn sub2(&self, id: ExpId) -> Option<ExpId> {
        match self.node(id) {
            ExpNode::Binary(_, _, r) => Some(*r),
            _ => None,
        }
    }

    /// Splits a binary node into its parts.
    #[must_use]
    pub fn as_binary(&self, id: ExpId) -> Option<(BinaryOp, ExpId, ExpId)> {
        match self.node(id) {
            ExpNode::Binary(op, l, r) => Some((*op, *l, *r)),
            _ => None,
        }
    }

    /// Splits a subscripted reference into base and definition.
    #[must_use]
    pub fn as_subscript(&self, id: ExpId) -> Option<(ExpId, Def)> {
        match self.node(id) {
            ExpNode::Ref(base, def) => Some((*base, *def)),
            _ => None,
        }
    }

    /// Returns name and arguments of a flag call.
    #[must_use]
    pub fn as_flag_call(&self, id: ExpId) -> Option<(&str, &[ExpId])> {
        match self.node(id) {
            ExpNode::FlagCall(name, args) => Some((name.as_str(), args.as_slice())),
            _ => None,
        }
    }

    /// Strips one level of subscript.
    #[must_use]
    pub fn base_of(&self, id: ExpId) -> ExpId {
        match self.node(id) {
            ExpNode::Ref(base, _) => *base,
            _ => id,
        }
    }

    /// Returns `true` if `%flags` (or `%fflags`) occurs anywhere in `id`.
    #[must_use]
    pub fn contains_flags(&self, id: ExpId) -> bool {
        self.any_node(id, &|n| {
            matches!(
                n,
                ExpNode::Terminal(Terminal::Flags) | ExpNode::Terminal(Terminal::FFlags)
            )
        })
    }

    /// Returns `true` if some node of the tree satisfies `pred`.
    pub fn any_node(&self, id: ExpId, pred: &dyn Fn(&ExpNode) -> bool) -> bool {
        let node = self.node(id);
        if pred(node) {
            return true;
        }
        node.children().into_iter().any(|c| self.any_node(c, pred))
    }

    /// Compares two expressions treating every `x{d}` as plain `x`.
    #[must_use]
    pub fn eq_ignoring_subscripts(&self, a: ExpId, b: ExpId) -> bool {
        let a = self.base_of(a);
        let b = self.base_of(b);
        if a == b {
            return true;
        }
        let (na, nb) = (self.node(a), self.node(b));
        if std::mem::discriminant(na) != std::mem::discriminant(nb) {
            return false;
        }
        let (ca, cb) = (na.children(), nb.children());
        if ca.len() != cb.len() || ca.is_empty() {
            return false;
        }
        // Same shape: the nodes must agree on everything but their children.
        if na.with_children(&cb) != *nb {
            return false;
        }
        ca.iter()
            .zip(cb.iter())
            .all(|(x, y)| self.eq_ignoring_subscripts(*x, *y))
    }

    /// Replaces every occurrence of `search` within `root` by `replace`.
    ///
    /// Returns the rewritten root and whether anything was replaced. The
    /// replacement is not searched again, so `replace` may contain `search`.
    pub fn substitute(&mut self, root: ExpId, search: ExpId, replace: ExpId) -> (ExpId, bool) {
        if root == search {
            return (replace, true);
        }
        let node = self.node(root).clone();
        let children = node.children();
        if children.is_empty() {
            return (root, false);
        }
        let mut changed = false;
        let mut rebuilt = Vec::with_capacity(children.len());
        for child in children {
            let (c, ch) = self.substitute(child, search, replace);
            changed |= ch;
            rebuilt.push(c);
        }
        if !changed {
            return (root, false);
        }
        (self.intern(node.with_children(&rebuilt)), true)
    }

    /// Returns a displayable wrapper printing `{n}` subscripts by statement index.
    #[must_use]
    pub fn display(&self, id: ExpId) -> ExpDisplay<'_> {
        ExpDisplay {
            pool: self,
            id,
            numbering: None,
        }
    }

    /// Returns a displayable wrapper that prints subscripts as statement numbers.
    ///
    /// `numbering` maps a statement index to the number printed for it.
    #[must_use]
    pub fn display_numbered<'a>(
        &'a self,
        id: ExpId,
        numbering: &'a dyn Fn(crate::analysis::ssa::StmtId) -> u32,
    ) -> ExpDisplay<'a> {
        ExpDisplay {
            pool: self,
            id,
            numbering: Some(numbering),
        }
    }
}

/// Display adapter for an expression.
pub struct ExpDisplay<'a> {
    pool: &'a ExpPool,
    id: ExpId,
    numbering: Option<&'a dyn Fn(crate::analysis::ssa::StmtId) -> u32>,
}

impl ExpDisplay<'_> {
    fn child(&self, id: ExpId) -> Self {
        ExpDisplay {
            pool: self.pool,
            id,
            numbering: self.numbering,
        }
    }
}

impl fmt::Display for ExpDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pool.node(self.id) {
            ExpNode::Const { value, conscript } => {
                if *conscript == 0 {
                    write!(f, "{}", value)
                } else {
                    write!(f, "{}\\{}\\", value, conscript)
                }
            }
            ExpNode::Terminal(t) => write!(f, "{}", t),
            ExpNode::Register(n) => write!(f, "r{}", n),
            ExpNode::Temp(name)
            | ExpNode::Local(name)
            | ExpNode::Param(name)
            | ExpNode::Global(name) => f.write_str(name),
            ExpNode::MemOf(a) => write!(f, "m[{}]", self.child(*a)),
            ExpNode::AddrOf(e) => write!(f, "a[{}]", self.child(*e)),
            ExpNode::Unary(op, e) => write!(f, "{}{}", op, self.child(*e)),
            ExpNode::Binary(op, l, r) => {
                write!(f, "({} {} {})", self.child(*l), op, self.child(*r))
            }
            ExpNode::FlagCall(name, args) => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.child(*a))?;
                }
                write!(f, ")")
            }
            ExpNode::Ref(base, def) => match def {
                Def::Implicit => write!(f, "{}{{-}}", self.child(*base)),
                Def::Stmt(s) => {
                    let n = match self.numbering {
                        Some(number) => number(*s),
                        None => s.index() as u32,
                    };
                    write!(f, "{}{{{}}}", self.child(*base), n)
                }
            },
            ExpNode::Size(bits, e) => write!(f, "{}*{}*", self.child(*e), bits),
            ExpNode::Typed(ty, e) => write!(f, "({}){}", ty, self.child(*e)),
        }
    }
}
