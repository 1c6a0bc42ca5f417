//! Expression and statement rewriters built on [`ExpModifier`] and
//! [`StmtModifier`].
//!
//! Rewriters needing facts about other statements (types of definitions,
//! symbol mappings, call collectors) receive those facts precomputed as
//! owned maps, so they never borrow the procedure while rewriting it.

use rustc_hash::FxHashMap;

use crate::analysis::{
    ssa::{BinaryOp, Def, ExpId, ExpNode, ExpPool, ExpRole, Signedness, StmtId, StmtKind, Type},
    visitor::{modify_exp, ExpModifier, StmtModifier},
};

/// Subscripts every bare occurrence of a location with a definition.
///
/// Occurrences already subscripted are left alone; addresses inside memory
/// reads are still searched.
pub struct ExpSubscripter {
    search: ExpId,
    def: Def,
    changed: bool,
}

impl ExpSubscripter {
    /// Creates a subscripter turning `search` into `search{def}`.
    #[must_use]
    pub fn new(search: ExpId, def: Def) -> Self {
        Self {
            search,
            def,
            changed: false,
        }
    }
}

impl ExpModifier for ExpSubscripter {
    fn pre_modify(&mut self, pool: &mut ExpPool, id: ExpId, depth: usize) -> Option<ExpId> {
        if id == self.search {
            self.changed = true;
            let base = match *pool.node(id) {
                ExpNode::MemOf(addr) => {
                    let addr = modify_exp(pool, addr, self, depth + 1);
                    pool.mem_of(addr)
                }
                _ => id,
            };
            return Some(pool.ref_exp(base, self.def));
        }

        let ExpNode::Ref(base, def) = *pool.node(id) else {
            return None;
        };
        if base != self.search {
            if let ExpNode::MemOf(addr) = *pool.node(base) {
                let rewritten = modify_exp(pool, addr, self, depth + 2);
                if rewritten != addr {
                    let m = pool.mem_of(rewritten);
                    return Some(pool.ref_exp(m, def));
                }
            }
        }
        Some(id)
    }

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Numbers untagged constants, or clears every tag.
pub struct ConscriptSetter {
    last: u32,
    clear: bool,
    changed: bool,
}

impl ConscriptSetter {
    /// Creates a setter numbering from `start + 1`.
    #[must_use]
    pub fn numbering(start: u32) -> Self {
        Self {
            last: start,
            clear: false,
            changed: false,
        }
    }

    /// Creates a setter resetting every tag to zero.
    #[must_use]
    pub fn clearing() -> Self {
        Self {
            last: 0,
            clear: true,
            changed: false,
        }
    }

    /// Returns the last number handed out.
    #[must_use]
    pub fn last(&self) -> u32 {
        self.last
    }
}

impl ExpModifier for ConscriptSetter {
    fn pre_modify(&mut self, pool: &mut ExpPool, id: ExpId, _depth: usize) -> Option<ExpId> {
        let ExpNode::Const { value, conscript } = pool.node(id) else {
            return None;
        };
        let (value, conscript) = (value.clone(), *conscript);
        if self.clear {
            if conscript == 0 {
                return Some(id);
            }
            self.changed = true;
            return Some(pool.constant(value, 0));
        }
        if conscript != 0 {
            return Some(id);
        }
        self.last += 1;
        self.changed = true;
        Some(pool.constant(value, self.last))
    }

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Wraps the constant carrying a given conscript in a cast.
pub struct ConstCaster {
    num: u32,
    ty: Type,
    changed: bool,
}

impl ConstCaster {
    /// Creates a caster retyping the constant tagged `num` as `ty`.
    #[must_use]
    pub fn new(num: u32, ty: Type) -> Self {
        Self {
            num,
            ty,
            changed: false,
        }
    }

    fn is_target(&self, pool: &ExpPool, id: ExpId) -> bool {
        self.num != 0 && pool.conscript(id) == Some(self.num)
    }
}

impl ExpModifier for ConstCaster {
    fn pre_modify(&mut self, pool: &mut ExpPool, id: ExpId, _depth: usize) -> Option<ExpId> {
        if let ExpNode::Typed(ty, inner) = pool.node(id) {
            // Already cast to the wanted type.
            if *ty == self.ty && self.is_target(pool, *inner) {
                return Some(id);
            }
        }
        if self.is_target(pool, id) {
            self.changed = true;
            return Some(pool.typed(self.ty.clone(), id));
        }
        None
    }

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Removes size annotations, except on temporaries.
#[derive(Debug, Default)]
pub struct SizeStripper {
    changed: bool,
}

impl SizeStripper {
    /// Creates a stripper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExpModifier for SizeStripper {
    fn post_modify(&mut self, pool: &mut ExpPool, id: ExpId, _depth: usize) -> ExpId {
        match *pool.node(id) {
            ExpNode::Size(_, inner) if !matches!(pool.node(inner), ExpNode::Temp(_)) => {
                self.changed = true;
                inner
            }
            _ => id,
        }
    }

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Replaces references to call definitions by the value reaching the call.
///
/// `replacements` maps each `loc{call}` to the call's collected value for
/// `loc`; it holds only locations the callee preserves.
pub struct CallBypasser {
    replacements: FxHashMap<ExpId, ExpId>,
    changed: bool,
    top_changed: bool,
}

impl CallBypasser {
    /// Creates a bypasser applying `replacements`.
    #[must_use]
    pub fn new(replacements: FxHashMap<ExpId, ExpId>) -> Self {
        Self {
            replacements,
            changed: false,
            top_changed: false,
        }
    }

    /// Returns `true` if a replacement happened in the top two levels of a slot.
    ///
    /// Such rewrites can expose new simplifications, e.g. of `m[esp{call}]`.
    #[must_use]
    pub fn top_changed(&self) -> bool {
        self.top_changed
    }
}

impl ExpModifier for CallBypasser {
    fn pre_modify(&mut self, pool: &mut ExpPool, id: ExpId, depth: usize) -> Option<ExpId> {
        let ExpNode::Ref(base, _) = *pool.node(id) else {
            return None;
        };
        if let Some(&value) = self.replacements.get(&id) {
            self.changed = true;
            if depth <= 1 {
                self.top_changed = true;
            }
            return Some(value);
        }
        if pool.is_mem_of(base) {
            None
        } else {
            Some(id)
        }
    }

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Casts the operands of signedness-sensitive operators.
///
/// `types` holds the known type of every reference and local of the
/// statement. Only integers known to have the opposite signedness are cast.
pub struct CastInserter {
    types: FxHashMap<ExpId, Type>,
    changed: bool,
}

impl CastInserter {
    /// Creates an inserter using `types`.
    #[must_use]
    pub fn new(types: FxHashMap<ExpId, Type>) -> Self {
        Self {
            types,
            changed: false,
        }
    }

    fn cast(&mut self, pool: &mut ExpPool, e: ExpId, want: Signedness) -> ExpId {
        if matches!(pool.node(e), ExpNode::Typed(..)) {
            return e;
        }
        match self.types.get(&e) {
            Some(Type::Integer { bits, sign })
                if *sign != want && *sign != Signedness::Unknown =>
            {
                let ty = Type::Integer {
                    bits: *bits,
                    sign: want,
                };
                pool.typed(ty, e)
            }
            _ => e,
        }
    }
}

impl ExpModifier for CastInserter {
    fn post_modify(&mut self, pool: &mut ExpPool, id: ExpId, _depth: usize) -> ExpId {
        let Some((op, l, r)) = pool.as_binary(id) else {
            return id;
        };
        let (want, both) = match op {
            BinaryOp::LessUns | BinaryOp::GtrUns | BinaryOp::LessEqUns | BinaryOp::GtrEqUns => {
                (Signedness::Unsigned, true)
            }
            BinaryOp::Shr => (Signedness::Unsigned, false),
            BinaryOp::Less | BinaryOp::Gtr | BinaryOp::LessEq | BinaryOp::GtrEq => {
                (Signedness::Signed, true)
            }
            BinaryOp::Sar => (Signedness::Signed, false),
            _ => return id,
        };

        let new_l = self.cast(pool, l, want);
        let new_r = if both { self.cast(pool, r, want) } else { r };
        if new_l == l && new_r == r {
            return id;
        }
        self.changed = true;
        pool.binary(op, new_l, new_r)
    }

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Casts the address of a typed memory store to a pointer of the stored type.
#[derive(Debug, Default)]
pub struct StmtCastInserter;

impl StmtModifier for StmtCastInserter {
    fn modify_stmt(&mut self, pool: &mut ExpPool, _id: StmtId, kind: &mut StmtKind) -> bool {
        let StmtKind::Assign(assign) = kind else {
            return false;
        };
        if assign.ty.is_unknown() {
            return false;
        }
        let ExpNode::MemOf(addr) = *pool.node(assign.lhs) else {
            return false;
        };
        if matches!(pool.node(addr), ExpNode::Typed(..)) {
            return false;
        }
        let cast = pool.typed(assign.ty.clone().pointer_to(), addr);
        assign.lhs = pool.mem_of(cast);
        true
    }
}

/// Replaces subscripted references by the symbols mapped to them.
///
/// `symbols` maps each reference of the statement that has a symbol to it.
pub struct SsaXformer {
    symbols: FxHashMap<ExpId, ExpId>,
    changed: bool,
}

impl SsaXformer {
    /// Creates a transformer applying `symbols`.
    #[must_use]
    pub fn new(symbols: FxHashMap<ExpId, ExpId>) -> Self {
        Self {
            symbols,
            changed: false,
        }
    }
}

impl ExpModifier for SsaXformer {
    fn pre_modify(&mut self, pool: &mut ExpPool, id: ExpId, _depth: usize) -> Option<ExpId> {
        let ExpNode::Ref(base, _) = *pool.node(id) else {
            return None;
        };
        if let Some(&sym) = self.symbols.get(&id) {
            self.changed = true;
            return Some(sym);
        }
        if pool.is_mem_of(base) {
            None
        } else {
            Some(id)
        }
    }

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Replaces the locations a statement defines by their symbols.
///
/// `symbols` maps each defined location to its symbol.
pub struct StmtSsaXformer {
    symbols: FxHashMap<ExpId, ExpId>,
}

impl StmtSsaXformer {
    /// Creates a transformer applying `symbols` to defined locations.
    #[must_use]
    pub fn new(symbols: FxHashMap<ExpId, ExpId>) -> Self {
        Self { symbols }
    }
}

impl StmtModifier for StmtSsaXformer {
    fn modify_stmt(&mut self, _pool: &mut ExpPool, _id: StmtId, kind: &mut StmtKind) -> bool {
        let mut changed = false;
        for (slot, role) in kind.slots_mut() {
            if role != ExpRole::Def {
                continue;
            }
            if let Some(&sym) = self.symbols.get(slot) {
                *slot = sym;
                changed = true;
            }
        }
        changed
    }
}
