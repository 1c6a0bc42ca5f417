//! Read-only finders built on [`ExpVisitor`].

use crate::analysis::{
    ssa::{BinaryOp, ExpId, ExpNode, ExpPool, LocationSet, SymbolMap, Terminal},
    visitor::{walk_exp, ExpVisitor, VisitControl},
};

/// Collects the locations an expression reads.
///
/// Subscripted references are collected whole. In memory-only mode only
/// memory locations (bare or subscripted) are kept, but registers inside
/// memory addresses are still found.
pub struct UsedLocsFinder<'a> {
    used: &'a mut LocationSet,
    mem_only: bool,
}

impl<'a> UsedLocsFinder<'a> {
    /// Creates a finder adding to `used`.
    pub fn new(used: &'a mut LocationSet, mem_only: bool) -> Self {
        Self { used, mem_only }
    }

    fn walk_address(&mut self, pool: &ExpPool, addr: ExpId) {
        let was = self.mem_only;
        self.mem_only = false;
        walk_exp(pool, addr, self);
        self.mem_only = was;
    }
}

impl ExpVisitor for UsedLocsFinder<'_> {
    fn pre_visit(&mut self, pool: &ExpPool, id: ExpId) -> VisitControl {
        match pool.node(id) {
            ExpNode::Ref(base, _) => {
                if !self.mem_only || pool.is_mem_of(*base) {
                    self.used.insert(id);
                }
                if let ExpNode::MemOf(addr) = pool.node(*base) {
                    self.walk_address(pool, *addr);
                }
                VisitControl::SkipChildren
            }
            ExpNode::MemOf(addr) => {
                self.used.insert(id);
                self.walk_address(pool, *addr);
                VisitControl::SkipChildren
            }
            ExpNode::Terminal(t) => {
                if !self.mem_only && !matches!(t, Terminal::Nil | Terminal::FPush | Terminal::FPop)
                {
                    self.used.insert(id);
                }
                VisitControl::SkipChildren
            }
            ExpNode::Register(_)
            | ExpNode::Temp(_)
            | ExpNode::Local(_)
            | ExpNode::Param(_)
            | ExpNode::Global(_) => {
                if !self.mem_only {
                    self.used.insert(id);
                }
                VisitControl::SkipChildren
            }
            _ => VisitControl::Continue,
        }
    }
}

/// Collects the locals an expression reads, resolving locations through the
/// procedure's symbol map.
///
/// `all_found` stays `true` only while every location read resolves to a
/// local or a parameter.
pub struct UsedLocalFinder<'a> {
    used: &'a mut LocationSet,
    symbols: &'a SymbolMap,
    all_found: bool,
}

impl<'a> UsedLocalFinder<'a> {
    /// Creates a finder adding to `used`.
    pub fn new(used: &'a mut LocationSet, symbols: &'a SymbolMap) -> Self {
        Self {
            used,
            symbols,
            all_found: true,
        }
    }

    /// Returns `true` if every location resolved.
    #[must_use]
    pub fn all_found(&self) -> bool {
        self.all_found
    }

    fn resolve(&mut self, pool: &ExpPool, loc: ExpId) -> bool {
        let Some(sym) = self.symbols.find_any(pool, loc) else {
            return false;
        };
        match pool.node(sym) {
            ExpNode::Local(_) => {
                self.used.insert(sym);
                true
            }
            ExpNode::Param(_) => true,
            _ => false,
        }
    }
}

impl ExpVisitor for UsedLocalFinder<'_> {
    fn pre_visit(&mut self, pool: &ExpPool, id: ExpId) -> VisitControl {
        match pool.node(id) {
            ExpNode::Local(_) => {
                self.used.insert(id);
                VisitControl::SkipChildren
            }
            ExpNode::Param(_) => VisitControl::SkipChildren,
            ExpNode::Ref(base, _) => {
                let base = *base;
                if !self.resolve(pool, id) {
                    match pool.node(base) {
                        ExpNode::Local(_) => {
                            self.used.insert(base);
                        }
                        ExpNode::Param(_) => {}
                        ExpNode::MemOf(addr) => {
                            self.all_found = false;
                            walk_exp(pool, *addr, self);
                        }
                        _ => self.all_found = false,
                    }
                }
                VisitControl::SkipChildren
            }
            ExpNode::Terminal(Terminal::DefineAll) => {
                self.all_found = false;
                VisitControl::SkipChildren
            }
            node if node.is_location() => {
                if self.resolve(pool, id) {
                    VisitControl::SkipChildren
                } else {
                    self.all_found = false;
                    VisitControl::Continue
                }
            }
            _ => VisitControl::Continue,
        }
    }
}

/// Collects every constant, in traversal order.
///
/// The same constant appearing twice is reported twice.
pub struct ConstFinder<'a> {
    found: &'a mut Vec<ExpId>,
}

impl<'a> ConstFinder<'a> {
    /// Creates a finder appending to `found`.
    pub fn new(found: &'a mut Vec<ExpId>) -> Self {
        Self { found }
    }
}

impl ExpVisitor for ConstFinder<'_> {
    fn pre_visit(&mut self, pool: &ExpPool, id: ExpId) -> VisitControl {
        if pool.is_const(id) {
            self.found.push(id);
            return VisitControl::SkipChildren;
        }
        VisitControl::Continue
    }
}

/// Collects every subscripted reference, including nested ones.
///
/// `m[r28{3}]{5}` yields both `m[r28{3}]{5}` and `r28{3}`. A reference used
/// twice is reported twice.
#[derive(Debug, Default)]
pub struct RefFinder {
    refs: Vec<ExpId>,
}

impl RefFinder {
    /// Creates an empty finder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the references found.
    #[must_use]
    pub fn refs(&self) -> &[ExpId] {
        &self.refs
    }

    /// Consumes the finder, returning the references found.
    #[must_use]
    pub fn into_refs(self) -> Vec<ExpId> {
        self.refs
    }
}

impl ExpVisitor for RefFinder {
    fn pre_visit(&mut self, pool: &ExpPool, id: ExpId) -> VisitControl {
        if pool.is_subscript(id) {
            self.refs.push(id);
        }
        VisitControl::Continue
    }
}

/// Looks for a memory read no symbol accounts for.
pub struct BadMemOfFinder<'a> {
    symbols: &'a SymbolMap,
    found: bool,
}

impl<'a> BadMemOfFinder<'a> {
    /// Creates a finder consulting `symbols`.
    pub fn new(symbols: &'a SymbolMap) -> Self {
        Self {
            symbols,
            found: false,
        }
    }

    /// Returns `true` if an unaccounted memory read was found.
    #[must_use]
    pub fn found(&self) -> bool {
        self.found
    }
}

impl ExpVisitor for BadMemOfFinder<'_> {
    fn pre_visit(&mut self, pool: &ExpPool, id: ExpId) -> VisitControl {
        match pool.node(id) {
            ExpNode::MemOf(_) => {
                if self.symbols.find(id).is_none() {
                    self.found = true;
                    return VisitControl::Stop;
                }
                VisitControl::Continue
            }
            ExpNode::Ref(base, _) => {
                // A subscripted memory read is accounted for; its address may not be.
                if let ExpNode::MemOf(addr) = pool.node(*base) {
                    walk_exp(pool, *addr, self);
                    if self.found {
                        return VisitControl::Stop;
                    }
                }
                VisitControl::SkipChildren
            }
            _ => VisitControl::Continue,
        }
    }
}

/// Measures the complexity of an expression.
///
/// Every operator, flag call and memory read counts one. Locations with a
/// symbol count as plain names, so nothing below them counts.
pub struct ComplexityFinder<'a> {
    symbols: &'a SymbolMap,
    count: usize,
}

impl<'a> ComplexityFinder<'a> {
    /// Creates a finder consulting `symbols`.
    pub fn new(symbols: &'a SymbolMap) -> Self {
        Self { symbols, count: 0 }
    }

    /// Returns the measured complexity.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.count
    }
}

impl ExpVisitor for ComplexityFinder<'_> {
    fn pre_visit(&mut self, pool: &ExpPool, id: ExpId) -> VisitControl {
        let node = pool.node(id);
        if node.is_location() && self.symbols.find(id).is_some() {
            return VisitControl::SkipChildren;
        }
        match node {
            ExpNode::MemOf(_)
            | ExpNode::AddrOf(_)
            | ExpNode::Unary(..)
            | ExpNode::Binary(..)
            | ExpNode::FlagCall(..) => self.count += 1,
            _ => {}
        }
        VisitControl::Continue
    }
}

/// Collects stack memory locations: `m[sp]`, `m[sp + K]` and `m[sp - K]`,
/// where `sp` may carry any subscript.
///
/// Each hit is paired with the subscripted reference enclosing it, if any,
/// so callers can take the type from the reaching definition.
pub struct StackMemOfFinder {
    sp: u16,
    found: Vec<(ExpId, Option<ExpId>)>,
}

impl StackMemOfFinder {
    /// Creates a finder for stack-pointer register `sp`.
    #[must_use]
    pub fn new(sp: u16) -> Self {
        Self {
            sp,
            found: Vec::new(),
        }
    }

    /// Consumes the finder, returning `(memof, enclosing ref)` pairs.
    #[must_use]
    pub fn into_found(self) -> Vec<(ExpId, Option<ExpId>)> {
        self.found
    }

    fn is_sp(&self, pool: &ExpPool, e: ExpId) -> bool {
        matches!(pool.node(pool.base_of(e)), ExpNode::Register(r) if *r == self.sp)
    }

    fn is_stack_address(&self, pool: &ExpPool, addr: ExpId) -> bool {
        if self.is_sp(pool, addr) {
            return true;
        }
        match pool.as_binary(addr) {
            Some((BinaryOp::Plus | BinaryOp::Minus, l, r)) => {
                self.is_sp(pool, l) && pool.is_int_const(r)
            }
            _ => false,
        }
    }
}

impl ExpVisitor for StackMemOfFinder {
    fn pre_visit(&mut self, pool: &ExpPool, id: ExpId) -> VisitControl {
        match pool.node(id) {
            ExpNode::Ref(base, _) => {
                if let ExpNode::MemOf(addr) = pool.node(*base) {
                    if self.is_stack_address(pool, *addr) {
                        self.found.push((*base, Some(id)));
                    }
                    walk_exp(pool, *addr, self);
                }
                VisitControl::SkipChildren
            }
            ExpNode::MemOf(addr) => {
                if self.is_stack_address(pool, *addr) {
                    self.found.push((id, None));
                }
                VisitControl::Continue
            }
            _ => VisitControl::Continue,
        }
    }
}
