//! Statements of the SSA IR.
//!
//! A [`Statement`] is one node of a procedure's IR: an assignment, a branch, a
//! call, a phi-function and so on. The statement kinds form a closed set
//! ([`StmtKind`]); each kind implements the subset of the capabilities
//! (defines locations, uses locations, is a call, is a branch) that applies to
//! it.
//!
//! # Ownership
//!
//! Statements live in the [`Procedure`](crate::analysis::Procedure)'s arena
//! and are addressed by [`StmtId`]. The owning block and procedure are stored
//! as plain indices: they are bookkeeping, never ownership. A statement's
//! position in its block is always re-derived from the block's sequence.
//!
//! # Expression Slots
//!
//! Every expression a statement holds sits in a *slot* with a role:
//! [`ExpRole::Def`] for a location being defined, [`ExpRole::Use`] for
//! everything read, and [`ExpRole::Collector`] for the values a call's
//! definition collector records. The traversal framework walks statements
//! through these slots, so adding a statement kind means teaching only
//! [`StmtKind::slots`] and [`StmtKind::slots_mut`] about it.

use std::{
    collections::BTreeMap,
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use strum::{Display, EnumIter};

use crate::analysis::{
    flags,
    ssa::{
        simplify::simplify, BlockId, Def, ExpId, ExpNode, ExpPool, LocationSet, ProcId, Terminal,
        Type,
    },
};

static NEXT_NUMBER: AtomicU32 = AtomicU32::new(1);

/// Index of a statement inside its procedure's statement arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(usize);

impl StmtId {
    /// Creates a statement id from a raw arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Condition kinds of branches and boolean assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BranchType {
    /// Jump if equal.
    #[strum(to_string = "equals")]
    Je,
    /// Jump if not equal.
    #[strum(to_string = "not equals")]
    Jne,
    /// Jump if signed less.
    #[strum(to_string = "signed less")]
    Jsl,
    /// Jump if signed less or equal.
    #[strum(to_string = "signed less or equals")]
    Jsle,
    /// Jump if signed greater or equal.
    #[strum(to_string = "signed greater or equals")]
    Jsge,
    /// Jump if signed greater.
    #[strum(to_string = "signed greater")]
    Jsg,
    /// Jump if unsigned less.
    #[strum(to_string = "unsigned less")]
    Jul,
    /// Jump if unsigned less or equal.
    #[strum(to_string = "unsigned less or equals")]
    Jule,
    /// Jump if unsigned greater or equal.
    #[strum(to_string = "unsigned greater or equals")]
    Juge,
    /// Jump if unsigned greater.
    #[strum(to_string = "unsigned greater")]
    Jug,
    /// Jump if minus.
    #[strum(to_string = "minus")]
    Jmi,
    /// Jump if positive.
    #[strum(to_string = "plus")]
    Jpos,
    /// Jump if overflow.
    #[strum(to_string = "overflow")]
    Jof,
    /// Jump if no overflow.
    #[strum(to_string = "no overflow")]
    Jnof,
    /// Jump if parity.
    #[strum(to_string = "parity")]
    Jpar,
}

/// Role of an expression slot within its statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpRole {
    /// A location being defined (left-hand side).
    Def,
    /// An expression being read.
    Use,
    /// A value recorded in a call's definition collector.
    Collector,
}

/// Plain assignment `lhs := rhs`, optionally guarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    /// Location defined
    pub lhs: ExpId,
    /// Value assigned
    pub rhs: ExpId,
    /// Type of the assigned value
    pub ty: Type,
    /// Condition under which the assignment takes place
    pub guard: Option<ExpId>,
}

/// Assignment of a condition's truth value, `lhs := CC(kind)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolAssign {
    /// Location defined
    pub lhs: ExpId,
    /// High level condition, once known
    pub cond: Option<ExpId>,
    /// Condition kind
    pub branch: BranchType,
    /// Whether the condition tests floating-point flags
    pub is_float: bool,
    /// Width of the result in bits
    pub size: u16,
}

/// Conditional branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// High level condition, once known
    pub cond: Option<ExpId>,
    /// Condition kind
    pub branch: BranchType,
    /// Whether the condition tests floating-point flags
    pub is_float: bool,
    /// Branch target
    pub dest: Option<ExpId>,
}

/// An actual argument of a call: `param := value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Callee side location receiving the argument
    pub param: ExpId,
    /// Value passed
    pub value: ExpId,
    /// Type of the argument
    pub ty: Type,
}

/// A location a call defines.
#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    /// Location defined by the callee
    pub loc: ExpId,
    /// Type of the defined value
    pub ty: Type,
}

/// One entry of a [`DefCollector`]: `loc` reaches the call as `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectedDef {
    /// Location
    pub loc: ExpId,
    /// Subscripted value of the location at the call
    pub value: ExpId,
}

/// Records which definition of each location reaches a call.
///
/// Propagation substitutes into the collected values as well, so a call's
/// view of the world stays in step with the rest of the procedure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefCollector {
    defs: Vec<CollectedDef>,
}

impl DefCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `loc` reaches the call as `value`, replacing any earlier entry.
    pub fn insert(&mut self, loc: ExpId, value: ExpId) {
        match self.defs.iter_mut().find(|d| d.loc == loc) {
            Some(existing) => existing.value = value,
            None => self.defs.push(CollectedDef { loc, value }),
        }
    }

    /// Returns the value recorded for `loc`.
    #[must_use]
    pub fn find_def_for(&self, loc: ExpId) -> Option<ExpId> {
        self.defs.iter().find(|d| d.loc == loc).map(|d| d.value)
    }

    /// Returns an iterator over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &CollectedDef> {
        self.defs.iter()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// A call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Call {
    /// Call target expression
    pub dest: Option<ExpId>,
    /// Whether the target is computed at runtime
    pub computed: bool,
    /// Name of the statically known callee
    pub callee: Option<String>,
    /// Actual arguments
    pub arguments: Vec<Argument>,
    /// Locations the call defines
    pub defines: Vec<Define>,
    /// Definitions reaching the call
    pub collector: DefCollector,
    /// Locations the callee is proven to preserve
    pub preserved: Vec<ExpId>,
}

impl Call {
    /// Returns the value `base` has after the call if the callee preserves it.
    ///
    /// A preserved location holds after the call whatever reached the call,
    /// which the definition collector records.
    #[must_use]
    pub fn bypass_ref(&self, base: ExpId) -> Option<ExpId> {
        if !self.preserved.contains(&base) {
            return None;
        }
        self.collector.find_def_for(base)
    }
}

/// Jump table description of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchInfo {
    /// Expression being switched on
    pub var: ExpId,
    /// Table form, as classified by the switch analysis (`'A'`, `'O'`, `'H'`, ...)
    pub form: char,
    /// Lowest case value
    pub lower: i64,
    /// Highest case value
    pub upper: i64,
    /// Address of the jump table
    pub table: u64,
    /// Number of table entries
    pub entries: u32,
    /// Offset added to table entries
    pub offset: i64,
}

/// A computed jump, possibly a recognised switch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Case {
    /// Jump target expression
    pub dest: Option<ExpId>,
    /// Switch description, once analysed
    pub switch: Option<SwitchInfo>,
}

/// Phi-function `lhs := phi(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Phi {
    /// Location defined
    pub lhs: ExpId,
    /// Type of the merged value
    pub ty: Type,
    /// Subscripted reference reaching from each predecessor block
    pub inputs: BTreeMap<BlockId, ExpId>,
}

/// Implicit definition of a value live on entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitAssign {
    /// Location defined
    pub lhs: ExpId,
    /// Type of the value
    pub ty: Type,
}

/// Bookkeeping reference to a memory address.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpRef {
    /// Address referenced
    pub addr: ExpId,
    /// Type at that address
    pub ty: Type,
}

/// The closed set of statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Plain assignment.
    Assign(Assign),
    /// Condition-to-value assignment.
    BoolAssign(BoolAssign),
    /// Conditional branch.
    Branch(Branch),
    /// Call.
    Call(Call),
    /// Computed jump.
    Case(Case),
    /// Phi-function.
    Phi(Phi),
    /// Implicit definition.
    ImplicitAssign(ImplicitAssign),
    /// Reference bookkeeping pseudo-statement.
    ImpRef(ImpRef),
    /// Control-flow join marker.
    Junction,
}

impl StmtKind {
    /// Creates an unguarded assignment of unknown type.
    #[must_use]
    pub fn assign(lhs: ExpId, rhs: ExpId) -> Self {
        StmtKind::Assign(Assign {
            lhs,
            rhs,
            ty: Type::Unknown,
            guard: None,
        })
    }

    /// Creates an unguarded typed assignment.
    #[must_use]
    pub fn assign_typed(lhs: ExpId, rhs: ExpId, ty: Type) -> Self {
        StmtKind::Assign(Assign {
            lhs,
            rhs,
            ty,
            guard: None,
        })
    }

    /// Creates an implicit definition.
    #[must_use]
    pub fn implicit(lhs: ExpId, ty: Type) -> Self {
        StmtKind::ImplicitAssign(ImplicitAssign { lhs, ty })
    }

    /// Creates a branch on `cond`.
    #[must_use]
    pub fn branch(cond: ExpId, branch: BranchType, dest: Option<ExpId>) -> Self {
        StmtKind::Branch(Branch {
            cond: Some(cond),
            branch,
            is_float: false,
            dest,
        })
    }

    /// Returns every expression slot with its role.
    #[must_use]
    pub fn slots(&self) -> Vec<(ExpId, ExpRole)> {
        let mut out = Vec::new();
        match self {
            StmtKind::Assign(a) => {
                out.push((a.lhs, ExpRole::Def));
                out.push((a.rhs, ExpRole::Use));
                out.extend(a.guard.map(|g| (g, ExpRole::Use)));
            }
            StmtKind::BoolAssign(b) => {
                out.push((b.lhs, ExpRole::Def));
                out.extend(b.cond.map(|c| (c, ExpRole::Use)));
            }
            StmtKind::Branch(b) => {
                out.extend(b.cond.map(|c| (c, ExpRole::Use)));
                out.extend(b.dest.map(|d| (d, ExpRole::Use)));
            }
            StmtKind::Call(c) => {
                out.extend(c.dest.map(|d| (d, ExpRole::Use)));
                for arg in &c.arguments {
                    out.push((arg.param, ExpRole::Def));
                    out.push((arg.value, ExpRole::Use));
                }
                out.extend(c.defines.iter().map(|d| (d.loc, ExpRole::Def)));
                out.extend(c.collector.iter().map(|d| (d.value, ExpRole::Collector)));
            }
            StmtKind::Case(c) => {
                out.extend(c.dest.map(|d| (d, ExpRole::Use)));
                out.extend(c.switch.as_ref().map(|s| (s.var, ExpRole::Use)));
            }
            StmtKind::Phi(p) => {
                out.push((p.lhs, ExpRole::Def));
                out.extend(p.inputs.values().map(|e| (*e, ExpRole::Use)));
            }
            StmtKind::ImplicitAssign(i) => out.push((i.lhs, ExpRole::Def)),
            StmtKind::ImpRef(r) => out.push((r.addr, ExpRole::Use)),
            StmtKind::Junction => {}
        }
        out
    }

    /// Returns mutable access to every expression slot with its role.
    ///
    /// The order matches [`StmtKind::slots`].
    pub fn slots_mut(&mut self) -> Vec<(&mut ExpId, ExpRole)> {
        let mut out = Vec::new();
        match self {
            StmtKind::Assign(a) => {
                out.push((&mut a.lhs, ExpRole::Def));
                out.push((&mut a.rhs, ExpRole::Use));
                out.extend(a.guard.as_mut().map(|g| (g, ExpRole::Use)));
            }
            StmtKind::BoolAssign(b) => {
                out.push((&mut b.lhs, ExpRole::Def));
                out.extend(b.cond.as_mut().map(|c| (c, ExpRole::Use)));
            }
            StmtKind::Branch(b) => {
                out.extend(b.cond.as_mut().map(|c| (c, ExpRole::Use)));
                out.extend(b.dest.as_mut().map(|d| (d, ExpRole::Use)));
            }
            StmtKind::Call(c) => {
                out.extend(c.dest.as_mut().map(|d| (d, ExpRole::Use)));
                for arg in &mut c.arguments {
                    out.push((&mut arg.param, ExpRole::Def));
                    out.push((&mut arg.value, ExpRole::Use));
                }
                out.extend(c.defines.iter_mut().map(|d| (&mut d.loc, ExpRole::Def)));
                out.extend(
                    c.collector
                        .defs
                        .iter_mut()
                        .map(|d| (&mut d.value, ExpRole::Collector)),
                );
            }
            StmtKind::Case(c) => {
                out.extend(c.dest.as_mut().map(|d| (d, ExpRole::Use)));
                out.extend(c.switch.as_mut().map(|s| (&mut s.var, ExpRole::Use)));
            }
            StmtKind::Phi(p) => {
                out.push((&mut p.lhs, ExpRole::Def));
                out.extend(p.inputs.values_mut().map(|e| (e, ExpRole::Use)));
            }
            StmtKind::ImplicitAssign(i) => out.push((&mut i.lhs, ExpRole::Def)),
            StmtKind::ImpRef(r) => out.push((&mut r.addr, ExpRole::Use)),
            StmtKind::Junction => {}
        }
        out
    }
}

/// One IR statement with its bookkeeping.
#[derive(Debug, Clone)]
pub struct Statement {
    id: StmtId,
    number: u32,
    block: Option<BlockId>,
    proc: Option<ProcId>,
    dom_number: Option<u32>,
    kind: StmtKind,
}

impl Statement {
    /// Creates a statement with a fresh process-unique number.
    pub(crate) fn new(id: StmtId, kind: StmtKind) -> Self {
        Self {
            id,
            number: NEXT_NUMBER.fetch_add(1, Ordering::Relaxed),
            block: None,
            proc: None,
            dom_number: None,
            kind,
        }
    }

    /// Returns the arena index of this statement.
    #[must_use]
    pub const fn id(&self) -> StmtId {
        self.id
    }

    /// Returns the process-unique statement number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Returns the owning block.
    #[must_use]
    pub const fn block(&self) -> Option<BlockId> {
        self.block
    }

    pub(crate) fn set_block(&mut self, block: Option<BlockId>) {
        self.block = block;
    }

    /// Returns the enclosing procedure.
    #[must_use]
    pub const fn proc(&self) -> Option<ProcId> {
        self.proc
    }

    pub(crate) fn set_proc(&mut self, proc: ProcId) {
        self.proc = Some(proc);
    }

    /// Returns the dominance number assigned by an external dominator pass.
    #[must_use]
    pub const fn dom_number(&self) -> Option<u32> {
        self.dom_number
    }

    /// Records the dominance number of this statement.
    pub fn set_dom_number(&mut self, number: Option<u32>) {
        self.dom_number = number;
    }

    /// Returns the statement kind and payload.
    #[must_use]
    pub const fn kind(&self) -> &StmtKind {
        &self.kind
    }

    /// Returns mutable access to the statement kind and payload.
    pub fn kind_mut(&mut self) -> &mut StmtKind {
        &mut self.kind
    }

    /// Returns the payload of an ordinary assignment.
    #[must_use]
    pub fn as_assign(&self) -> Option<&Assign> {
        match &self.kind {
            StmtKind::Assign(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the payload of a call.
    #[must_use]
    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            StmtKind::Call(c) => Some(c),
            _ => None,
        }
    }

    /// Returns `true` for ordinary assignments.
    #[must_use]
    pub fn is_assign(&self) -> bool {
        matches!(self.kind, StmtKind::Assign(_))
    }

    /// Returns `true` for every assignment-like kind (assign, phi, implicit, bool).
    #[must_use]
    pub fn is_assignment(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Assign(_)
                | StmtKind::Phi(_)
                | StmtKind::ImplicitAssign(_)
                | StmtKind::BoolAssign(_)
        )
    }

    /// Returns `true` for calls.
    #[must_use]
    pub fn is_call(&self) -> bool {
        matches!(self.kind, StmtKind::Call(_))
    }

    /// Returns `true` for conditional branches.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self.kind, StmtKind::Branch(_))
    }

    /// Returns `true` for phi-functions.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, StmtKind::Phi(_))
    }

    /// Returns `true` for implicit definitions.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        matches!(self.kind, StmtKind::ImplicitAssign(_))
    }

    /// Returns `true` if the statement defines at least one location.
    #[must_use]
    pub fn is_definition(&self) -> bool {
        match &self.kind {
            StmtKind::Call(c) => !c.defines.is_empty(),
            _ => self.is_assignment(),
        }
    }

    /// Returns the left-hand side of an assignment-like statement.
    #[must_use]
    pub fn lhs(&self) -> Option<ExpId> {
        match &self.kind {
            StmtKind::Assign(a) => Some(a.lhs),
            StmtKind::BoolAssign(b) => Some(b.lhs),
            StmtKind::Phi(p) => Some(p.lhs),
            StmtKind::ImplicitAssign(i) => Some(i.lhs),
            _ => None,
        }
    }

    /// Returns the set of locations this statement defines.
    #[must_use]
    pub fn definitions(&self) -> LocationSet {
        match &self.kind {
            StmtKind::Call(c) => c.defines.iter().map(|d| d.loc).collect(),
            _ => self.lhs().into_iter().collect(),
        }
    }

    /// Returns `true` if this statement defines `loc`.
    #[must_use]
    pub fn defines_loc(&self, loc: ExpId) -> bool {
        match &self.kind {
            StmtKind::Call(c) => c.defines.iter().any(|d| d.loc == loc),
            _ => self.lhs() == Some(loc),
        }
    }

    /// Returns the type this statement gives to `loc`, if it defines it.
    #[must_use]
    pub fn type_for(&self, loc: ExpId) -> Option<Type> {
        match &self.kind {
            StmtKind::Assign(a) if a.lhs == loc => Some(a.ty.clone()),
            StmtKind::Phi(p) if p.lhs == loc => Some(p.ty.clone()),
            StmtKind::ImplicitAssign(i) if i.lhs == loc => Some(i.ty.clone()),
            StmtKind::BoolAssign(b) if b.lhs == loc => Some(Type::Integer {
                bits: b.size,
                sign: crate::analysis::ssa::Signedness::Unknown,
            }),
            StmtKind::Call(c) => c.defines.iter().find(|d| d.loc == loc).map(|d| d.ty.clone()),
            _ => None,
        }
    }

    /// Returns `true` for an assignment to `%flags`.
    #[must_use]
    pub fn is_flag_assign(&self, pool: &ExpPool) -> bool {
        self.as_assign().is_some_and(|a| pool.is_flags(a.lhs))
    }

    /// Returns `true` for an assignment that does nothing.
    ///
    /// That is `x := x`, or `x := y{self}` where the right-hand side refers
    /// to this very statement.
    #[must_use]
    pub fn is_null_statement(&self, pool: &ExpPool) -> bool {
        let Some(a) = self.as_assign() else {
            return false;
        };
        if a.lhs == a.rhs {
            return true;
        }
        matches!(pool.as_subscript(a.rhs), Some((_, Def::Stmt(d))) if d == self.id)
    }

    /// Returns `true` for an assignment of the floating-point push marker.
    #[must_use]
    pub fn is_fpush(&self, pool: &ExpPool) -> bool {
        self.as_assign()
            .is_some_and(|a| pool.is_terminal(a.rhs, Terminal::FPush))
    }

    /// Returns `true` for an assignment of the floating-point pop marker.
    #[must_use]
    pub fn is_fpop(&self, pool: &ExpPool) -> bool {
        self.as_assign()
            .is_some_and(|a| pool.is_terminal(a.rhs, Terminal::FPop))
    }

    /// Replaces `search` by `replace` in every slot.
    ///
    /// Collector values are included only when `cc` is set. Returns `true`
    /// if anything was replaced.
    pub fn search_and_replace(
        &mut self,
        pool: &mut ExpPool,
        search: ExpId,
        replace: ExpId,
        cc: bool,
    ) -> bool {
        let mut changed = false;
        for (slot, role) in self.kind.slots_mut() {
            if role == ExpRole::Collector && !cc {
                continue;
            }
            let (out, ch) = pool.substitute(*slot, search, replace);
            if ch {
                *slot = out;
                changed = true;
            }
        }
        changed
    }

    /// Simplifies every expression of the statement.
    ///
    /// Defined locations are simplified only inside a memory address; a
    /// branch or bool-assign condition computed by a flag call is turned into
    /// the equivalent relational expression.
    pub fn simplify(&mut self, pool: &mut ExpPool) {
        for (slot, role) in self.kind.slots_mut() {
            match role {
                ExpRole::Def => {
                    if let ExpNode::MemOf(addr) = pool.node(*slot).clone() {
                        let simplified = simplify(pool, addr);
                        if simplified != addr {
                            *slot = pool.mem_of(simplified);
                        }
                    }
                }
                ExpRole::Use | ExpRole::Collector => *slot = simplify(pool, *slot),
            }
        }

        match &mut self.kind {
            StmtKind::Branch(b) => {
                if let Some(cond) = b.cond {
                    if let Some(rel) = flags::cond_to_relational(pool, cond, b.branch, b.is_float) {
                        b.cond = Some(simplify(pool, rel));
                    }
                }
            }
            StmtKind::BoolAssign(b) => {
                if let Some(cond) = b.cond {
                    if let Some(rel) = flags::cond_to_relational(pool, cond, b.branch, b.is_float) {
                        b.cond = Some(simplify(pool, rel));
                    }
                }
            }
            _ => {}
        }
    }

    /// Returns a displayable rendering of the statement.
    ///
    /// `numbering` maps statement indices to printed statement numbers, so
    /// subscripts print the same numbers statements are listed under.
    #[must_use]
    pub fn display<'a>(
        &'a self,
        pool: &'a ExpPool,
        numbering: &'a dyn Fn(StmtId) -> u32,
    ) -> StatementDisplay<'a> {
        StatementDisplay {
            stmt: self,
            pool,
            numbering,
        }
    }
}

/// Display adapter for [`Statement`].
pub struct StatementDisplay<'a> {
    stmt: &'a Statement,
    pool: &'a ExpPool,
    numbering: &'a dyn Fn(StmtId) -> u32,
}

impl StatementDisplay<'_> {
    fn exp(&self, id: ExpId) -> crate::analysis::ssa::ExpDisplay<'_> {
        self.pool.display_numbered(id, self.numbering)
    }
}

impl fmt::Display for StatementDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} ", self.stmt.number)?;
        match &self.stmt.kind {
            StmtKind::Assign(a) => {
                if !a.ty.is_unknown() {
                    write!(f, "*{}* ", a.ty)?;
                }
                if let Some(g) = a.guard {
                    write!(f, "{} => ", self.exp(g))?;
                }
                write!(f, "{} := {}", self.exp(a.lhs), self.exp(a.rhs))
            }
            StmtKind::BoolAssign(b) => {
                write!(f, "BOOL {} := CC({})", self.exp(b.lhs), b.branch)?;
                if b.is_float {
                    write!(f, ", float")?;
                }
                if let Some(c) = b.cond {
                    write!(f, " [{}]", self.exp(c))?;
                }
                Ok(())
            }
            StmtKind::Branch(b) => {
                write!(f, "BRANCH ")?;
                match b.dest {
                    Some(d) => write!(f, "{}", self.exp(d))?,
                    None => write!(f, "*no dest*")?,
                }
                write!(f, ", condition {}", b.branch)?;
                if b.is_float {
                    write!(f, " float")?;
                }
                if let Some(c) = b.cond {
                    write!(f, " [{}]", self.exp(c))?;
                }
                Ok(())
            }
            StmtKind::Call(c) => {
                if !c.defines.is_empty() {
                    write!(f, "{{ ")?;
                    for (i, d) in c.defines.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", self.exp(d.loc))?;
                    }
                    write!(f, " }} := ")?;
                }
                write!(f, "CALL ")?;
                match (&c.callee, c.dest) {
                    (Some(name), _) => write!(f, "{}", name)?,
                    (None, Some(d)) => write!(f, "{}", self.exp(d))?,
                    (None, None) => write!(f, "*unknown*")?,
                }
                write!(f, "(")?;
                for (i, arg) in c.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} := {}", self.exp(arg.param), self.exp(arg.value))?;
                }
                write!(f, ")")
            }
            StmtKind::Case(c) => {
                write!(f, "CASE [")?;
                match (&c.switch, c.dest) {
                    (Some(s), _) => write!(f, "{}", self.exp(s.var))?,
                    (None, Some(d)) => write!(f, "{}", self.exp(d))?,
                    (None, None) => write!(f, "*no dest*")?,
                }
                write!(f, "]")
            }
            StmtKind::Phi(p) => {
                write!(f, "{} := phi{{", self.exp(p.lhs))?;
                for (i, input) in p.inputs.values().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match self.pool.as_subscript(*input) {
                        Some((_, Def::Stmt(d))) => write!(f, "{}", (self.numbering)(d))?,
                        _ => write!(f, "-")?,
                    }
                }
                write!(f, "}}")
            }
            StmtKind::ImplicitAssign(i) => write!(f, "{} := -", self.exp(i.lhs)),
            StmtKind::ImpRef(r) => write!(f, "*{}* IMPREF {}", r.ty, self.exp(r.addr)),
            StmtKind::Junction => write!(f, "JUNCTION"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_numbers_are_unique_and_increasing() {
        let a = Statement::new(StmtId::new(0), StmtKind::Junction);
        let b = Statement::new(StmtId::new(1), StmtKind::Junction);
        assert!(b.number() > a.number());
    }

    #[test]
    fn test_null_statement() {
        let mut pool = ExpPool::new();
        let r1 = pool.reg(1);
        let id = StmtId::new(0);
        let self_ref = pool.ref_exp(r1, Def::Stmt(id));
        let s = Statement::new(id, StmtKind::assign(r1, self_ref));
        assert!(s.is_null_statement(&pool));

        let same = Statement::new(StmtId::new(1), StmtKind::assign(r1, r1));
        assert!(same.is_null_statement(&pool));

        let r2 = pool.reg(2);
        let other = Statement::new(StmtId::new(2), StmtKind::assign(r1, r2));
        assert!(!other.is_null_statement(&pool));
    }

    #[test]
    fn test_definitions() {
        let mut pool = ExpPool::new();
        let r24 = pool.reg(24);
        let r25 = pool.reg(25);
        let call = Statement::new(
            StmtId::new(0),
            StmtKind::Call(Call {
                defines: vec![
                    Define {
                        loc: r24,
                        ty: Type::signed(32),
                    },
                    Define {
                        loc: r25,
                        ty: Type::Unknown,
                    },
                ],
                ..Call::default()
            }),
        );
        assert!(call.is_definition());
        assert_eq!(call.definitions().len(), 2);
        assert!(call.defines_loc(r25));
        assert_eq!(call.type_for(r24), Some(Type::signed(32)));

        let branch = Statement::new(StmtId::new(1), StmtKind::branch(r24, BranchType::Je, None));
        assert!(!branch.is_definition());
        assert!(branch.definitions().is_empty());
    }

    #[test]
    fn test_slots_roles() {
        let mut pool = ExpPool::new();
        let r1 = pool.reg(1);
        let r2 = pool.reg(2);
        let kind = StmtKind::assign(r1, r2);
        assert_eq!(kind.slots(), vec![(r1, ExpRole::Def), (r2, ExpRole::Use)]);
    }

    #[test]
    fn test_search_and_replace_respects_collectors() {
        let mut pool = ExpPool::new();
        let r24 = pool.reg(24);
        let r24_1 = pool.ref_exp(r24, Def::Stmt(StmtId::new(1)));
        let five = pool.int(5);
        let mut collector = DefCollector::new();
        collector.insert(r24, r24_1);
        let mut call = Statement::new(
            StmtId::new(2),
            StmtKind::Call(Call {
                collector,
                ..Call::default()
            }),
        );

        assert!(!call.search_and_replace(&mut pool, r24_1, five, false));
        assert!(call.search_and_replace(&mut pool, r24_1, five, true));
        assert_eq!(call.as_call().unwrap().collector.find_def_for(r24), Some(five));
    }

    #[test]
    fn test_branch_types_display() {
        assert_eq!(BranchType::iter().count(), 15);
        assert_eq!(BranchType::Jul.to_string(), "unsigned less");
    }
}
