//! A procedure in SSA form - the owner of statements, blocks and expressions.
//!
//! # Structure
//!
//! ```text
//! Procedure
//! ├── pool: ExpPool               // every expression of the procedure
//! ├── statements: Vec<Statement>  // statement arena, indexed by StmtId
//! ├── blocks: Vec<BasicBlock>     // ordered StmtId sequences
//! ├── symbols: SymbolMap          // location -> local/param expression
//! ├── locals: name -> Type        // declared locals
//! └── callees: address -> name    // known procedures, for call conversion
//! ```
//!
//! Statements are created through [`Procedure::push_statement`] and
//! [`Procedure::insert_statement`], which link them into a block and stamp the
//! procedure and block back-references. Those back-references are indices:
//! they never own anything.
//!
//! # Thread Safety
//!
//! `Procedure` is `Send` and `Sync`. Mutation requires `&mut Procedure`, so a
//! procedure is only ever rewritten by one thread at a time.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    analysis::{
        ssa::{
            BasicBlock, BlockId, Def, ExpId, ExpNode, ExpPool, Statement, StmtId, StmtKind, Type,
        },
        visitor::{walk_exp, BadMemOfFinder, ComplexityFinder},
    },
    Result,
};

/// Index of a procedure within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(usize);

impl ProcId {
    /// Creates a procedure id from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Maps locations (bare or subscripted) to the symbol standing for them.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    map: FxHashMap<ExpId, ExpId>,
}

impl SymbolMap {
    /// Records `symbol` as the name of `loc`.
    pub fn insert(&mut self, loc: ExpId, symbol: ExpId) {
        self.map.insert(loc, symbol);
    }

    /// Returns the symbol recorded for exactly `loc`.
    #[must_use]
    pub fn find(&self, loc: ExpId) -> Option<ExpId> {
        self.map.get(&loc).copied()
    }

    /// Returns the symbol for `e`, falling back to its unsubscripted base.
    #[must_use]
    pub fn find_any(&self, pool: &ExpPool, e: ExpId) -> Option<ExpId> {
        self.find(e).or_else(|| {
            let base = pool.base_of(e);
            if base == e {
                None
            } else {
                self.find(base)
            }
        })
    }

    /// Returns the number of mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A procedure in SSA form.
///
/// # Examples
///
/// ```rust
/// use ssaflow::analysis::{ProcId, Procedure, StmtKind};
///
/// let mut proc = Procedure::new(ProcId::new(0), "main");
/// let bb = proc.add_block(0x1000);
/// let r24 = proc.pool_mut().reg(24);
/// let five = proc.pool_mut().int(5);
/// let s = proc.push_statement(bb, StmtKind::assign(r24, five))?;
/// assert!(proc.is_first_in_block(s)?);
/// # Ok::<(), ssaflow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Procedure {
    id: ProcId,
    name: String,
    pool: ExpPool,
    statements: Vec<Statement>,
    blocks: Vec<BasicBlock>,
    symbols: SymbolMap,
    locals: FxHashMap<String, Type>,
    next_local: u32,
    callees: FxHashMap<u64, String>,
    stack_pointer: Option<u16>,
}

impl Procedure {
    /// Creates an empty procedure.
    #[must_use]
    pub fn new(id: ProcId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            pool: ExpPool::new(),
            statements: Vec::new(),
            blocks: Vec::new(),
            symbols: SymbolMap::default(),
            locals: FxHashMap::default(),
            next_local: 0,
            callees: FxHashMap::default(),
            stack_pointer: None,
        }
    }

    /// Returns the procedure id.
    #[must_use]
    pub const fn id(&self) -> ProcId {
        self.id
    }

    /// Returns the procedure name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the expression pool.
    #[must_use]
    pub fn pool(&self) -> &ExpPool {
        &self.pool
    }

    /// Returns the expression pool for building new expressions.
    pub fn pool_mut(&mut self) -> &mut ExpPool {
        &mut self.pool
    }

    /// Returns the symbol map.
    #[must_use]
    pub fn symbols(&self) -> &SymbolMap {
        &self.symbols
    }

    // Blocks and statements

    /// Appends an empty block starting at `address`.
    pub fn add_block(&mut self, address: u64) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, address));
        id
    }

    /// Returns the block `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown block.
    pub fn block(&self, id: BlockId) -> Result<&BasicBlock> {
        self.blocks
            .get(id.index())
            .ok_or_else(|| malformed_ir!("unknown block {}", id))
    }

    /// Returns every block.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Creates a statement and appends it to `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown block.
    pub fn push_statement(&mut self, block: BlockId, kind: StmtKind) -> Result<StmtId> {
        let len = self.block(block)?.len();
        self.insert_statement(block, len, kind)
    }

    /// Creates a statement and inserts it at `index` of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown block.
    pub fn insert_statement(
        &mut self,
        block: BlockId,
        index: usize,
        kind: StmtKind,
    ) -> Result<StmtId> {
        let id = StmtId::new(self.statements.len());
        let bb = self
            .blocks
            .get_mut(block.index())
            .ok_or_else(|| malformed_ir!("unknown block {}", block))?;
        bb.insert(index, id);

        let mut stmt = Statement::new(id, kind);
        stmt.set_block(Some(block));
        stmt.set_proc(self.id);
        self.statements.push(stmt);
        Ok(id)
    }

    /// Unlinks `stmt` from its block. The statement stays in the arena.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn remove_from_block(&mut self, stmt: StmtId) -> Result<bool> {
        let Some(block) = self.statement(stmt)?.block() else {
            return Ok(false);
        };
        let removed = self
            .blocks
            .get_mut(block.index())
            .is_some_and(|bb| bb.remove(stmt));
        self.statement_mut(stmt)?.set_block(None);
        Ok(removed)
    }

    /// Returns the statement `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn statement(&self, id: StmtId) -> Result<&Statement> {
        self.statements
            .get(id.index())
            .ok_or_else(|| malformed_ir!("unknown statement {}", id))
    }

    /// Returns the statement `id` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn statement_mut(&mut self, id: StmtId) -> Result<&mut Statement> {
        self.statements
            .get_mut(id.index())
            .ok_or_else(|| malformed_ir!("unknown statement {}", id))
    }

    /// Returns the pool and one statement, both mutably.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn split_mut(&mut self, id: StmtId) -> Result<(&mut ExpPool, &mut Statement)> {
        let stmt = self
            .statements
            .get_mut(id.index())
            .ok_or_else(|| malformed_ir!("unknown statement {}", id))?;
        Ok((&mut self.pool, stmt))
    }

    /// Returns the statement arena.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Returns every linked statement in block order.
    #[must_use]
    pub fn statements_in_order(&self) -> Vec<StmtId> {
        self.blocks
            .iter()
            .flat_map(|bb| bb.statements().iter().copied())
            .collect()
    }

    /// Stamps this procedure as the enclosing procedure of `stmt`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn set_proc(&mut self, stmt: StmtId) -> Result<()> {
        let id = self.id;
        self.statement_mut(stmt)?.set_proc(id);
        Ok(())
    }

    // Block linkage

    fn owning_block(&self, stmt: StmtId) -> Result<(&BasicBlock, usize)> {
        let block = self
            .statement(stmt)?
            .block()
            .ok_or_else(|| malformed_ir!("statement {} has no owning block", stmt))?;
        let bb = self.block(block)?;
        if bb.is_empty() {
            return Err(malformed_ir!("block {} of statement {} is empty", block, stmt));
        }
        let pos = bb
            .position(stmt)
            .ok_or_else(|| malformed_ir!("statement {} missing from its block {}", stmt, block))?;
        Ok((bb, pos))
    }

    /// Returns `true` if `stmt` is the first statement of its block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] if the statement is not linked
    /// into a non-empty block.
    pub fn is_first_in_block(&self, stmt: StmtId) -> Result<bool> {
        let (_, pos) = self.owning_block(stmt)?;
        Ok(pos == 0)
    }

    /// Returns `true` if `stmt` is the last statement of its block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] if the statement is not linked
    /// into a non-empty block.
    pub fn is_last_in_block(&self, stmt: StmtId) -> Result<bool> {
        let (bb, pos) = self.owning_block(stmt)?;
        Ok(pos + 1 == bb.len())
    }

    /// Returns the statement executed just before `stmt` in its block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] if the statement is not linked
    /// into a non-empty block.
    pub fn previous_in_block(&self, stmt: StmtId) -> Result<Option<StmtId>> {
        let (bb, pos) = self.owning_block(stmt)?;
        Ok(pos.checked_sub(1).map(|p| bb.statements()[p]))
    }

    /// Returns the statement executed just after `stmt` in its block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] if the statement is not linked
    /// into a non-empty block.
    pub fn next_in_block(&self, stmt: StmtId) -> Result<Option<StmtId>> {
        let (bb, pos) = self.owning_block(stmt)?;
        Ok(bb.statements().get(pos + 1).copied())
    }

    // Symbols and locals

    /// Records `symbol` as the name of `loc`.
    pub fn map_symbol(&mut self, loc: ExpId, symbol: ExpId) {
        self.symbols.insert(loc, symbol);
    }

    /// Returns the symbol recorded for exactly `loc`.
    #[must_use]
    pub fn find_first_symbol(&self, loc: ExpId) -> Option<ExpId> {
        self.symbols.find(loc)
    }

    /// Returns the symbol for `e` or, failing that, for its unsubscripted base.
    #[must_use]
    pub fn lookup_sym_from_ref_any(&self, e: ExpId) -> Option<ExpId> {
        self.symbols.find_any(&self.pool, e)
    }

    /// Declares a fresh local `local{n}` of type `ty` and returns its expression.
    pub fn new_local(&mut self, ty: Type) -> ExpId {
        let name = format!("local{}", self.next_local);
        self.next_local += 1;
        self.locals.insert(name.clone(), ty);
        self.pool.local(&name)
    }

    /// Returns the symbol for `loc`, creating a local of type `ty` if needed.
    ///
    /// The second element is `true` when a new local was created.
    pub fn symbol_for(&mut self, loc: ExpId, ty: Type) -> (ExpId, bool) {
        if let Some(sym) = self.symbols.find(loc) {
            return (sym, false);
        }
        let sym = self.new_local(ty);
        self.symbols.insert(loc, sym);
        (sym, true)
    }

    /// Returns the declared type of local `name`.
    #[must_use]
    pub fn local_type(&self, name: &str) -> Option<&Type> {
        self.locals.get(name)
    }

    /// Returns the number of declared locals.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    /// Registers a known procedure at `address`.
    pub fn register_callee(&mut self, address: u64, name: &str) {
        self.callees.insert(address, name.to_string());
    }

    /// Returns the procedure known at `address`.
    #[must_use]
    pub fn callee_at(&self, address: u64) -> Option<&str> {
        self.callees.get(&address).map(String::as_str)
    }

    /// Sets the stack-pointer register used to recognise stack locals.
    pub fn set_stack_pointer(&mut self, reg: u16) {
        self.stack_pointer = Some(reg);
    }

    /// Returns the stack-pointer register, if configured.
    #[must_use]
    pub const fn stack_pointer(&self) -> Option<u16> {
        self.stack_pointer
    }

    // Expression queries needing procedure context

    /// Returns `true` if `e` reads memory no symbol accounts for.
    ///
    /// A bare `m[..]` without a symbol is such a read. Inside a subscripted
    /// `m[..]{d}` only the address is inspected.
    #[must_use]
    pub fn contains_bad_mem_of(&self, e: ExpId) -> bool {
        let mut finder = BadMemOfFinder::new(&self.symbols);
        walk_exp(&self.pool, e, &mut finder);
        finder.found()
    }

    /// Returns the complexity of `e`: its count of operators and memory reads.
    ///
    /// Locations with a symbol count as plain names.
    #[must_use]
    pub fn complexity_depth(&self, e: ExpId) -> usize {
        let mut finder = ComplexityFinder::new(&self.symbols);
        walk_exp(&self.pool, e, &mut finder);
        finder.depth()
    }

    /// Returns the best known type of `e`.
    #[must_use]
    pub fn type_of(&self, e: ExpId) -> Type {
        match self.pool.node(e) {
            ExpNode::Ref(base, Def::Stmt(d)) => self
                .statements
                .get(d.index())
                .and_then(|s| s.type_for(*base))
                .unwrap_or_default(),
            ExpNode::Typed(ty, _) => ty.clone(),
            ExpNode::Size(bits, _) => Type::Size(*bits),
            ExpNode::Local(name) => self.locals.get(name).cloned().unwrap_or_default(),
            _ => Type::Unknown,
        }
    }

    /// Turns a computed call with a statically known target into a direct call.
    ///
    /// The target must be a constant address or a global naming a known
    /// procedure; a subscripted target qualifies only when its definition is
    /// implicit. Returns `true` if the call was converted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn convert_to_direct(&mut self, stmt: StmtId) -> Result<bool> {
        let (dest, computed) = match self.statement(stmt)?.kind() {
            StmtKind::Call(c) => (c.dest, c.computed),
            _ => return Ok(false),
        };
        let Some(mut target) = dest else {
            return Ok(false);
        };
        if !computed {
            return Ok(false);
        }

        if let Some((base, def)) = self.pool.as_subscript(target) {
            if let Def::Stmt(d) = def {
                if !self.statement(d)?.is_implicit() {
                    return Ok(false);
                }
            }
            target = base;
        }

        let resolved = match self.pool.node(target) {
            ExpNode::Const { value, .. } => value
                .as_int()
                .map(|a| a as u64)
                .and_then(|a| self.callees.get(&a).map(|n| (a, n.clone()))),
            ExpNode::Global(name) => self
                .callees
                .iter()
                .find(|(_, n)| *n == name)
                .map(|(a, n)| (*a, n.clone())),
            _ => None,
        };
        let Some((address, name)) = resolved else {
            return Ok(false);
        };

        let fixed = self.pool.addr(address);
        if let StmtKind::Call(call) = self.statement_mut(stmt)?.kind_mut() {
            call.dest = Some(fixed);
            call.computed = false;
            call.callee = Some(name);
        }
        Ok(true)
    }

    // Diagnostics

    /// Renders `e` with subscripts printed as statement numbers.
    #[must_use]
    pub fn display_exp(&self, e: ExpId) -> String {
        let numbering = |s: StmtId| self.number_of(s);
        self.pool.display_numbered(e, &numbering).to_string()
    }

    /// Renders statement `id` as `"{number} {text}"`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn display_statement(&self, id: StmtId) -> Result<String> {
        let stmt = self.statement(id)?;
        let numbering = |s: StmtId| self.number_of(s);
        Ok(stmt.display(&self.pool, &numbering).to_string())
    }

    fn number_of(&self, s: StmtId) -> u32 {
        self.statements
            .get(s.index())
            .map_or(s.index() as u32, Statement::number)
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "proc {}:", self.name)?;
        let numbering = |s: StmtId| self.number_of(s);
        for bb in &self.blocks {
            writeln!(f, "{}:", bb)?;
            for id in bb.statements() {
                if let Some(stmt) = self.statements.get(id.index()) {
                    writeln!(f, "{}", stmt.display(&self.pool, &numbering))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn three_statement_block() -> (Procedure, [StmtId; 3]) {
        let mut proc = Procedure::new(ProcId::new(0), "test");
        let bb = proc.add_block(0x1000);
        let r1 = proc.pool_mut().reg(1);
        let one = proc.pool_mut().int(1);
        let s1 = proc.push_statement(bb, StmtKind::assign(r1, one)).unwrap();
        let s2 = proc.push_statement(bb, StmtKind::assign(r1, one)).unwrap();
        let s3 = proc.push_statement(bb, StmtKind::assign(r1, one)).unwrap();
        (proc, [s1, s2, s3])
    }

    #[test]
    fn test_neighbours() {
        let (proc, [s1, s2, s3]) = three_statement_block();
        assert_eq!(proc.previous_in_block(s2).unwrap(), Some(s1));
        assert_eq!(proc.next_in_block(s2).unwrap(), Some(s3));
        assert_eq!(proc.previous_in_block(s1).unwrap(), None);
        assert_eq!(proc.next_in_block(s3).unwrap(), None);
        assert!(proc.is_first_in_block(s1).unwrap());
        assert!(proc.is_last_in_block(s3).unwrap());
        assert!(!proc.is_last_in_block(s2).unwrap());
    }

    #[test]
    fn test_neighbours_follow_edits() {
        let (mut proc, [s1, s2, s3]) = three_statement_block();
        assert!(proc.remove_from_block(s2).unwrap());
        assert_eq!(proc.next_in_block(s1).unwrap(), Some(s3));
        assert!(matches!(
            proc.next_in_block(s2),
            Err(Error::MalformedIr { .. })
        ));

        let bb = BlockId::new(0);
        let r2 = proc.pool_mut().reg(2);
        let s4 = proc.insert_statement(bb, 0, StmtKind::assign(r2, r2)).unwrap();
        assert_eq!(proc.previous_in_block(s1).unwrap(), Some(s4));
    }

    #[test]
    fn test_unknown_statement_is_malformed() {
        let proc = Procedure::new(ProcId::new(0), "empty");
        assert!(matches!(
            proc.is_first_in_block(StmtId::new(0)),
            Err(Error::MalformedIr { .. })
        ));
    }

    #[test]
    fn test_back_references() {
        let (proc, [s1, _, _]) = three_statement_block();
        let stmt = proc.statement(s1).unwrap();
        assert_eq!(stmt.block(), Some(BlockId::new(0)));
        assert_eq!(stmt.proc(), Some(ProcId::new(0)));
    }

    #[test]
    fn test_symbol_lookup_falls_back_to_base() {
        let mut proc = Procedure::new(ProcId::new(0), "sym");
        let r1 = proc.pool_mut().reg(1);
        let r1_0 = proc.pool_mut().ref_exp(r1, Def::Implicit);
        let (sym, created) = proc.symbol_for(r1, Type::signed(32));
        assert!(created);
        assert_eq!(proc.lookup_sym_from_ref_any(r1_0), Some(sym));
        assert_eq!(proc.find_first_symbol(r1_0), None);
        assert_eq!(proc.local_type("local0"), Some(&Type::signed(32)));
        let (again, created) = proc.symbol_for(r1, Type::Unknown);
        assert!(!created);
        assert_eq!(again, sym);
    }

    #[test]
    fn test_convert_to_direct() {
        let mut proc = Procedure::new(ProcId::new(0), "caller");
        proc.register_callee(0x401000, "callee");
        let bb = proc.add_block(0);
        let target = proc.pool_mut().addr(0x401000);
        let call = proc
            .push_statement(
                bb,
                StmtKind::Call(crate::analysis::ssa::Call {
                    dest: Some(target),
                    computed: true,
                    ..Default::default()
                }),
            )
            .unwrap();
        assert!(proc.convert_to_direct(call).unwrap());
        let c = proc.statement(call).unwrap().as_call().unwrap();
        assert!(!c.computed);
        assert_eq!(c.callee.as_deref(), Some("callee"));
        assert!(!proc.convert_to_direct(call).unwrap());
    }

    #[test]
    fn test_display_uses_statement_numbers() {
        let mut proc = Procedure::new(ProcId::new(0), "disp");
        let bb = proc.add_block(0);
        let r1 = proc.pool_mut().reg(1);
        let five = proc.pool_mut().int(5);
        let s1 = proc.push_statement(bb, StmtKind::assign(r1, five)).unwrap();
        let r1_s1 = proc.pool_mut().ref_exp(r1, Def::Stmt(s1));
        let r2 = proc.pool_mut().reg(2);
        let s2 = proc.push_statement(bb, StmtKind::assign(r2, r1_s1)).unwrap();

        let n1 = proc.statement(s1).unwrap().number();
        let n2 = proc.statement(s2).unwrap().number();
        assert_eq!(
            proc.display_statement(s2).unwrap(),
            format!("{:>4} r2 := r1{{{}}}", n2, n1)
        );
    }
}
