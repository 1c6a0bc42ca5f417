//! Statement-level queries and rewrites driven by the traversal framework.
//!
//! Every operation here takes a [`StmtId`], builds the matching finder or
//! modifier from [`crate::analysis::visitor`] and lets the statement accept it.
//! Facts a rewrite needs about *other* statements (definition types, call
//! collectors, symbol mappings) are gathered first, then the statement is
//! rewritten with only the expression pool borrowed alongside it.
//!
//! # Operations
//!
//! | Operation                          | Walks             | Effect                         |
//! |------------------------------------|-------------------|--------------------------------|
//! | [`Procedure::used_locs`]           | uses, lhs address | locations read                 |
//! | [`Procedure::used_locals`]         | uses, lhs address | locals read                    |
//! | [`Procedure::subscript_var`]       | uses, lhs address | `x` becomes `x{d}`             |
//! | [`Procedure::find_constants`]      | everything        | constants in order             |
//! | [`Procedure::set_conscripts`]      | everything        | tag constants `n+1...`         |
//! | [`Procedure::cast_const`]          | everything        | retype one tagged constant     |
//! | [`Procedure::strip_sizes`]         | everything        | drop size annotations          |
//! | [`Procedure::bypass`]              | uses, lhs address | skip calls preserving a value  |
//! | [`Procedure::map_registers_to_locals`] | uses, defs    | create register locals         |
//! | [`Procedure::insert_casts`]        | uses, lhs address | signedness casts               |
//! | [`Procedure::replace_subscripts_with_locals`] | everything | leave SSA form          |
//! | [`Procedure::dfa_map_locals`]      | everything        | create stack locals            |

use rustc_hash::FxHashMap;

use crate::{
    analysis::{
        ssa::{Def, ExpId, ExpNode, ExpRole, LocationSet, Procedure, StmtId, Type},
        visitor::{
            walk_exp, CallBypasser, CastInserter, ConscriptSetter, ConstCaster, ConstFinder,
            ExpSubscripter, RefFinder, SizeStripper, SsaXformer, StackMemOfFinder,
            StmtCastInserter, StmtSsaXformer, UsedLocalFinder, UsedLocsFinder, VisitFlags,
        },
    },
    Result,
};

impl Procedure {
    /// Returns the locations statement `stmt` reads.
    ///
    /// A memory left-hand side contributes only the locations in its address.
    /// With `cc` the values in a call's definition collector count as reads.
    /// With `mem_only` only memory locations are returned.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn used_locs(&self, stmt: StmtId, cc: bool, mem_only: bool) -> Result<LocationSet> {
        let s = self.statement(stmt)?;
        let pool = self.pool();
        let mut flags = VisitFlags::SKIP_DEF_TOP;
        if cc {
            flags |= VisitFlags::COLLECTORS;
        }

        let mut used = LocationSet::new();
        s.accept_visitor(pool, &mut UsedLocsFinder::new(&mut used, mem_only), flags);
        if mem_only {
            // Addresses of stored-to locations are reads in every mode.
            for (e, role) in s.kind().slots() {
                if role != ExpRole::Def {
                    continue;
                }
                if let ExpNode::MemOf(addr) = pool.node(e) {
                    walk_exp(pool, *addr, &mut UsedLocsFinder::new(&mut used, false));
                }
            }
        }
        Ok(used)
    }

    /// Returns the locals statement `stmt` reads, and whether every location
    /// it reads resolved to a local or parameter.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn used_locals(&self, stmt: StmtId) -> Result<(LocationSet, bool)> {
        let s = self.statement(stmt)?;
        let mut used = LocationSet::new();
        let mut finder = UsedLocalFinder::new(&mut used, self.symbols());
        s.accept_visitor(self.pool(), &mut finder, VisitFlags::SKIP_DEF_TOP);
        let all_found = finder.all_found();
        Ok((used, all_found))
    }

    /// Subscripts every bare occurrence of `loc` in statement `stmt` with `def`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn subscript_var(&mut self, stmt: StmtId, loc: ExpId, def: Def) -> Result<bool> {
        let (pool, s) = self.split_mut(stmt)?;
        let mut subscripter = ExpSubscripter::new(loc, def);
        Ok(s.accept_modifier(pool, &mut subscripter, VisitFlags::SKIP_DEF_TOP))
    }

    /// Returns every constant of statement `stmt`, in traversal order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn find_constants(&self, stmt: StmtId) -> Result<Vec<ExpId>> {
        let s = self.statement(stmt)?;
        let mut found = Vec::new();
        s.accept_visitor(self.pool(), &mut ConstFinder::new(&mut found), VisitFlags::empty());
        Ok(found)
    }

    /// Numbers the untagged constants of statement `stmt` from `start + 1`.
    ///
    /// Returns the last number used, `start` if nothing was tagged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn set_conscripts(&mut self, stmt: StmtId, start: u32) -> Result<u32> {
        let (pool, s) = self.split_mut(stmt)?;
        let mut setter = ConscriptSetter::numbering(start);
        s.accept_modifier(pool, &mut setter, VisitFlags::empty());
        Ok(setter.last())
    }

    /// Resets every constant tag of statement `stmt` to zero.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn clear_conscripts(&mut self, stmt: StmtId) -> Result<bool> {
        let (pool, s) = self.split_mut(stmt)?;
        Ok(s.accept_modifier(pool, &mut ConscriptSetter::clearing(), VisitFlags::empty()))
    }

    /// Casts the constant tagged `num` in statement `stmt` to `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn cast_const(&mut self, stmt: StmtId, num: u32, ty: Type) -> Result<bool> {
        let (pool, s) = self.split_mut(stmt)?;
        let mut caster = ConstCaster::new(num, ty);
        Ok(s.accept_modifier(pool, &mut caster, VisitFlags::empty()))
    }

    /// Removes size annotations from statement `stmt`, except on temporaries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn strip_sizes(&mut self, stmt: StmtId) -> Result<bool> {
        let (pool, s) = self.split_mut(stmt)?;
        Ok(s.accept_modifier(pool, &mut SizeStripper::new(), VisitFlags::empty()))
    }

    /// Replaces each `loc{call}` in statement `stmt` by the value of `loc`
    /// reaching the call, when the callee preserves `loc`.
    ///
    /// The defined location itself is never rewritten. The statement is
    /// re-simplified when a replacement happened near the top of a slot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement, or a
    /// reference to one.
    pub fn bypass(&mut self, stmt: StmtId) -> Result<bool> {
        let mut refs = RefFinder::new();
        self.statement(stmt)?
            .accept_visitor(self.pool(), &mut refs, VisitFlags::SKIP_DEF_TOP);

        let mut replacements = FxHashMap::default();
        for r in refs.into_refs() {
            let Some((base, Def::Stmt(d))) = self.pool().as_subscript(r) else {
                continue;
            };
            if d == stmt {
                continue;
            }
            if let Some(value) = self.statement(d)?.as_call().and_then(|c| c.bypass_ref(base)) {
                replacements.insert(r, value);
            }
        }
        if replacements.is_empty() {
            return Ok(false);
        }

        let (pool, s) = self.split_mut(stmt)?;
        let mut bypasser = CallBypasser::new(replacements);
        let changed = s.accept_modifier(pool, &mut bypasser, VisitFlags::SKIP_DEF_TOP);
        if bypasser.top_changed() {
            s.simplify(pool);
        }
        Ok(changed)
    }

    /// Gives every register or temporary that statement `stmt` reads or
    /// defines a local symbol.
    ///
    /// New locals take the type of the reaching definition. Returns `true`
    /// if any local was created.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn map_registers_to_locals(&mut self, stmt: StmtId) -> Result<bool> {
        let s = self.statement(stmt)?;
        let mut refs = RefFinder::new();
        s.accept_visitor(self.pool(), &mut refs, VisitFlags::SKIP_DEF_TOP);
        let defined: Vec<(ExpId, Type)> = s
            .definitions()
            .iter()
            .filter(|lhs| is_register_like(self.pool().node(*lhs)))
            .map(|lhs| (lhs, s.type_for(lhs).unwrap_or_default()))
            .collect();

        let mut wanted: Vec<(ExpId, Type)> = refs
            .into_refs()
            .into_iter()
            .filter(|r| is_register_like(self.pool().node(self.pool().base_of(*r))))
            .map(|r| (r, self.type_of(r)))
            .collect();
        for (lhs, ty) in defined {
            let r = self.pool_mut().ref_exp(lhs, Def::Stmt(stmt));
            wanted.push((r, ty));
        }

        let mut changed = false;
        for (loc, ty) in wanted {
            changed |= self.symbol_for(loc, ty).1;
        }
        Ok(changed)
    }

    /// Casts operands of signedness-sensitive operators in statement `stmt`,
    /// and the address of a typed memory store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn insert_casts(&mut self, stmt: StmtId) -> Result<bool> {
        let mut refs = RefFinder::new();
        self.statement(stmt)?
            .accept_visitor(self.pool(), &mut refs, VisitFlags::SKIP_DEF_TOP);
        let types: FxHashMap<ExpId, Type> = refs
            .into_refs()
            .into_iter()
            .map(|r| (r, self.type_of(r)))
            .filter(|(_, ty)| ty.is_integer())
            .collect();

        let (pool, s) = self.split_mut(stmt)?;
        let mut inserter = CastInserter::new(types);
        let mut changed = s.accept_modifier(pool, &mut inserter, VisitFlags::SKIP_DEF_TOP);
        changed |= s.accept_stmt_modifier(pool, &mut StmtCastInserter);
        Ok(changed)
    }

    /// Replaces every subscripted reference with a symbol by that symbol,
    /// including the locations statement `stmt` defines.
    ///
    /// A reference's own mapping wins over a mapping of its base.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn replace_subscripts_with_locals(&mut self, stmt: StmtId) -> Result<bool> {
        let s = self.statement(stmt)?;
        let mut refs = RefFinder::new();
        s.accept_visitor(self.pool(), &mut refs, VisitFlags::SKIP_DEF_TOP);
        let defined: Vec<ExpId> = s.definitions().iter().collect();
        let uses: FxHashMap<ExpId, ExpId> = refs
            .into_refs()
            .into_iter()
            .filter_map(|r| self.lookup_sym_from_ref_any(r).map(|sym| (r, sym)))
            .collect();

        let mut defs = FxHashMap::default();
        for lhs in defined {
            let r = self.pool_mut().ref_exp(lhs, Def::Stmt(stmt));
            if let Some(sym) = self
                .find_first_symbol(r)
                .or_else(|| self.find_first_symbol(lhs))
            {
                defs.insert(lhs, sym);
            }
        }

        let (pool, s) = self.split_mut(stmt)?;
        let mut changed = s.accept_stmt_modifier(pool, &mut StmtSsaXformer::new(defs));
        changed |= s.accept_modifier(pool, &mut SsaXformer::new(uses), VisitFlags::SKIP_DEF_TOP);
        Ok(changed)
    }

    /// Creates a local for every stack memory location in statement `stmt`
    /// that has no symbol yet.
    ///
    /// Does nothing unless a stack-pointer register is configured.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn dfa_map_locals(&mut self, stmt: StmtId) -> Result<bool> {
        let Some(sp) = self.stack_pointer() else {
            return Ok(false);
        };
        let s = self.statement(stmt)?;
        let mut finder = StackMemOfFinder::new(sp);
        s.accept_visitor(self.pool(), &mut finder, VisitFlags::empty());
        let found: Vec<(ExpId, Type)> = finder
            .into_found()
            .into_iter()
            .map(|(mem, enclosing)| {
                let ty = match enclosing {
                    Some(r) => self.type_of(r),
                    None => s.type_for(mem).unwrap_or_default(),
                };
                (mem, ty)
            })
            .collect();

        let mut changed = false;
        for (mem, ty) in found {
            changed |= self.symbol_for(mem, ty).1;
        }
        Ok(changed)
    }

    /// Replaces `search` by `replace` in statement `stmt`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn search_and_replace(
        &mut self,
        stmt: StmtId,
        search: ExpId,
        replace: ExpId,
        cc: bool,
    ) -> Result<bool> {
        let (pool, s) = self.split_mut(stmt)?;
        Ok(s.search_and_replace(pool, search, replace, cc))
    }

    /// Simplifies statement `stmt`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedIr`] for an unknown statement.
    pub fn simplify_statement(&mut self, stmt: StmtId) -> Result<()> {
        let (pool, s) = self.split_mut(stmt)?;
        s.simplify(pool);
        Ok(())
    }
}

fn is_register_like(node: &ExpNode) -> bool {
    matches!(node, ExpNode::Register(_) | ExpNode::Temp(_))
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::ssa::{BinaryOp, Call, CollectedDef, Def, StmtKind, Type},
        test::ProcBuilder,
        Result,
    };

    #[test]
    fn test_used_locs_memory_lhs() -> Result<()> {
        let mut b = ProcBuilder::new("used");
        let r28 = b.reg(28);
        let sp0 = b.implicit_ref(r28);
        let four = b.int(4);
        let addr = b.bin(BinaryOp::Minus, sp0, four);
        let lhs = b.mem(addr);
        let r24 = b.reg(24);
        let r24_0 = b.implicit_ref(r24);
        let s = b.assign(lhs, r24_0)?;
        let proc = b.finish();

        let used = proc.used_locs(s, false, false)?;
        assert_eq!(used.len(), 2);
        assert!(used.contains(sp0) && used.contains(r24_0));
        assert!(!used.contains(lhs));

        let mem = proc.used_locs(s, false, true)?;
        assert!(mem.contains(sp0));
        assert!(!mem.contains(r24_0));
        Ok(())
    }

    #[test]
    fn test_subscript_var_lhs_address_only() -> Result<()> {
        let mut b = ProcBuilder::new("subscript");
        let r28 = b.reg(28);
        let lhs = b.mem(r28);
        let s = b.assign(lhs, r28)?;
        let mut proc = b.finish();

        assert!(proc.subscript_var(s, r28, Def::Implicit)?);
        assert!(proc.display_statement(s)?.ends_with("m[r28{-}] := r28{-}"));
        // A second pass finds nothing bare left.
        assert!(!proc.subscript_var(s, r28, Def::Implicit)?);
        Ok(())
    }

    #[test]
    fn test_conscripts_and_cast_const() -> Result<()> {
        let mut b = ProcBuilder::new("consts");
        let r24 = b.reg(24);
        let five = b.int(5);
        let sum = b.bin(BinaryOp::Plus, five, five);
        let s = b.assign(r24, sum)?;
        let mut proc = b.finish();

        assert_eq!(proc.find_constants(s)?.len(), 2);
        assert_eq!(proc.set_conscripts(s, 0)?, 2);
        assert_eq!(proc.set_conscripts(s, 2)?, 2);
        assert!(proc.cast_const(s, 2, Type::unsigned(32))?);
        assert!(proc.display_statement(s)?.ends_with("r24 := (5\\1\\ + (uint32)5\\2\\)"));

        proc.clear_conscripts(s)?;
        let consts = proc.find_constants(s)?;
        assert!(consts.iter().all(|c| proc.pool().conscript(*c) == Some(0)));
        Ok(())
    }

    #[test]
    fn test_strip_sizes_keeps_temps() -> Result<()> {
        let mut b = ProcBuilder::new("sizes");
        let r24 = b.reg(24);
        let r25 = b.reg(25);
        let sized = b.pool().size(16, r25);
        let tmp = b.pool().temp("tmp1");
        let sized_tmp = b.pool().size(16, tmp);
        let sum = b.bin(BinaryOp::Plus, sized, sized_tmp);
        let s = b.assign(r24, sum)?;
        let mut proc = b.finish();

        assert!(proc.strip_sizes(s)?);
        assert!(proc.display_statement(s)?.ends_with("r24 := (r25 + tmp1*16*)"));
        assert!(!proc.strip_sizes(s)?);
        Ok(())
    }

    #[test]
    fn test_bypass_preserved_register() -> Result<()> {
        let mut b = ProcBuilder::new("bypass");
        let r28 = b.reg(28);
        let sp0 = b.implicit_ref(r28);
        let call = b.push(StmtKind::Call(Call {
            callee: Some("helper".into()),
            preserved: vec![r28],
            ..Call::default()
        }))?;
        if let StmtKind::Call(c) = b.proc().statement_mut(call)?.kind_mut() {
            c.collector.insert(r28, sp0);
        }
        let sp_call = b.pool().ref_exp(r28, Def::Stmt(call));
        let four = b.int(4);
        let addr = b.bin(BinaryOp::Plus, sp_call, four);
        let lhs = b.mem(addr);
        let r24 = b.reg(24);
        let s = b.assign(lhs, r24)?;
        let mut proc = b.finish();

        assert!(proc.bypass(s)?);
        assert!(proc.display_statement(s)?.ends_with("m[(r28{-} + 4)] := r24"));
        let collected: Vec<CollectedDef> = proc
            .statement(call)?
            .as_call()
            .map(|c| c.collector.iter().copied().collect())
            .unwrap_or_default();
        assert_eq!(collected, vec![CollectedDef { loc: r28, value: sp0 }]);
        Ok(())
    }

    #[test]
    fn test_locals_round_trip() -> Result<()> {
        let mut b = ProcBuilder::new("locals");
        let r24 = b.reg(24);
        let one = b.int(1);
        let def = b.push(StmtKind::assign_typed(r24, one, Type::signed(32)))?;
        let r24_def = b.pool().ref_exp(r24, Def::Stmt(def));
        let r25 = b.reg(25);
        let two = b.int(2);
        let sum = b.bin(BinaryOp::Plus, r24_def, two);
        let user = b.assign(r25, sum)?;
        let mut proc = b.finish();

        assert!(proc.map_registers_to_locals(def)?);
        assert!(proc.map_registers_to_locals(user)?);
        assert!(!proc.map_registers_to_locals(user)?);
        assert_eq!(proc.local_type("local0"), Some(&Type::signed(32)));

        let (_, all_found) = proc.used_locals(user)?;
        assert!(all_found);

        assert!(proc.replace_subscripts_with_locals(def)?);
        assert!(proc.replace_subscripts_with_locals(user)?);
        assert!(proc.display_statement(def)?.ends_with("local0 := 1"));
        assert!(proc.display_statement(user)?.ends_with("local1 := (local0 + 2)"));
        Ok(())
    }

    #[test]
    fn test_insert_casts() -> Result<()> {
        let mut b = ProcBuilder::new("casts");
        let r24 = b.reg(24);
        let one = b.int(1);
        let def = b.push(StmtKind::assign_typed(r24, one, Type::signed(32)))?;
        let r24_def = b.pool().ref_exp(r24, Def::Stmt(def));
        let ten = b.int(10);
        let cmp = b.bin(BinaryOp::LessUns, r24_def, ten);
        let r25 = b.reg(25);
        let addr = b.mem(r25);
        let s = b.push(StmtKind::assign_typed(addr, cmp, Type::Boolean))?;
        let mut proc = b.finish();

        assert!(proc.insert_casts(s)?);
        let text = proc.display_statement(s)?;
        assert!(text.contains("m[(bool*)r25] := ((uint32)r24{"), "{text}");
        assert!(text.ends_with("} <u 10)"), "{text}");
        Ok(())
    }

    #[test]
    fn test_dfa_map_locals() -> Result<()> {
        let mut b = ProcBuilder::new("dfa");
        let r28 = b.reg(28);
        let sp0 = b.implicit_ref(r28);
        let eight = b.int(8);
        let addr = b.bin(BinaryOp::Minus, sp0, eight);
        let slot = b.mem(addr);
        let r24 = b.reg(24);
        let s = b.assign(r24, slot)?;
        let mut proc = b.finish();

        assert!(!proc.dfa_map_locals(s)?);
        proc.set_stack_pointer(28);
        assert!(proc.dfa_map_locals(s)?);
        assert!(proc.find_first_symbol(slot).is_some());
        assert!(!proc.dfa_map_locals(s)?);
        Ok(())
    }
}
