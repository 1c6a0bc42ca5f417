//! The propagation engine: substituting definitions into their uses.
//!
//! [`propagate_to`] takes one statement and repeatedly replaces every
//! subscripted use `x{d}` whose definition `d` is an ordinary assignment by
//! that assignment's right-hand side, until nothing changes any more:
//!
//! ```text
//!  7  r24 := m[r28{-} - 8]{3} + 4
//! 12  r25 := r24{7} * 2              =>   r25 := (m[r28{-} - 8]{3} + 4) * 2
//! ```
//!
//! # Candidate Filters
//!
//! A use that passes [`can_propagate_to_exp`] still goes through these
//! checks, in order:
//!
//! 1. **Unresolved memory.** A right-hand side reading memory no symbol
//!    accounts for is never moved; it could cross a store. In forced mode
//!    (jump-table analysis) a right-hand side that *is* a memory read may
//!    move.
//! 2. **Dominance heuristic** (experimental, opt-in). Refuses to move a value
//!    past a loop-carried overwrite of one of its components.
//! 3. **Depth limit.** A definition used more than once is propagated only
//!    while its complexity stays below the configured depth, so shared
//!    work is not duplicated. Flag definitions are exempt.
//!
//! # Flags
//!
//! Reading a single flag of a `%flags` definition computed by a subtract
//! compare is rewritten into the comparison itself instead of substituting
//! the flag call:
//!
//! ```text
//!  5  %flags := SUBFLAGS32(r24{3}, 5, r24{3} - 5)
//!  6  r8 := %CF{5}                   =>   r8 := r24{3} <u 5
//! ```
//!
//! # Termination
//!
//! A statement is rewritten for at most [`MAX_PROPAGATE_ITERATIONS`] rounds.
//! Hitting the cap is recorded, not treated as an error. The global budget
//! of [`crate::compiler::PropagationBudget`] bounds the whole run.

use rustc_hash::FxHashMap;

use crate::{
    analysis::{
        flags,
        ssa::{Def, ExpId, LocationSet, Procedure, StmtId, Terminal},
        visitor::{walk_exp, UsedLocsFinder},
    },
    compiler::{AnalysisContext, EventKind},
    Result,
};

/// Hard cap on enumerate-and-substitute rounds per statement.
pub const MAX_PROPAGATE_ITERATIONS: usize = 10;

/// Inputs of [`propagate_to`] beyond the statement itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateOptions<'a> {
    /// Number of statements using each subscripted location. Enables the
    /// depth limit when present.
    pub dest_counts: Option<&'a FxHashMap<ExpId, usize>>,
    /// Locations flowing into phi-functions, for the dominance heuristic.
    pub used_by_dom_phi: Option<&'a LocationSet>,
    /// Allow a right-hand side that is itself an unresolved memory read.
    pub force: bool,
}

impl<'a> PropagateOptions<'a> {
    /// Options without limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables the depth limit with the given use counts.
    #[must_use]
    pub fn with_dest_counts(mut self, counts: &'a FxHashMap<ExpId, usize>) -> Self {
        self.dest_counts = Some(counts);
        self
    }

    /// Supplies the phi-input locations for the dominance heuristic.
    #[must_use]
    pub fn with_used_by_dom_phi(mut self, used: &'a LocationSet) -> Self {
        self.used_by_dom_phi = Some(used);
        self
    }

    /// Sets forced mode.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// What a propagation call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagateOutcome {
    /// At least one substitution happened.
    pub changed: bool,
    /// A computed call became a direct call; call-dependent analyses should
    /// be rerun.
    pub converted: bool,
}

impl PropagateOutcome {
    fn merge(&mut self, other: PropagateOutcome) {
        self.changed |= other.changed;
        self.converted |= other.converted;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    BadMemOf,
    Overwritten,
    TooComplex,
}

impl Rejection {
    fn reason(self) -> &'static str {
        match self {
            Rejection::BadMemOf => "reads unresolved memory",
            Rejection::Overwritten => "component overwritten in a loop",
            Rejection::TooComplex => "too complex for a multiply used location",
        }
    }
}

/// Returns the defining statement of `e` if `e` may be replaced in `stmt`.
///
/// `e` must be a reference `x{d}` to a real statement `d` other than `stmt`,
/// and `d` must be an assignment that does something and does not define
/// an array.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedIr`] if `e` refers to an unknown statement.
pub fn can_propagate_to_exp(proc: &Procedure, stmt: StmtId, e: ExpId) -> Result<Option<StmtId>> {
    let Some((_, Def::Stmt(d))) = proc.pool().as_subscript(e) else {
        return Ok(None);
    };
    if d == stmt {
        return Ok(None);
    }
    let def = proc.statement(d)?;
    if def.is_null_statement(proc.pool()) {
        return Ok(None);
    }
    match def.as_assign() {
        Some(assign) if !assign.ty.is_array() => Ok(Some(d)),
        _ => Ok(None),
    }
}

/// Propagates definitions into statement `stmt` until it stops changing.
///
/// Phi-functions are never rewritten. The statement is simplified once at
/// the end.
///
/// # Arguments
///
/// * `proc` - The procedure owning `stmt`.
/// * `stmt` - The statement to rewrite.
/// * `ctx` - Configuration, budget and event log.
/// * `opts` - Use counts, phi inputs and forced mode.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedIr`] if the statement or a definition it
/// refers to is unknown.
pub fn propagate_to(
    proc: &mut Procedure,
    stmt: StmtId,
    ctx: &AnalysisContext,
    opts: PropagateOptions<'_>,
) -> Result<PropagateOutcome> {
    let mut outcome = PropagateOutcome::default();
    if proc.statement(stmt)?.is_phi() {
        return Ok(outcome);
    }

    let mut rounds = 0;
    loop {
        let mut round = PropagateOutcome::default();
        let used = proc.used_locs(stmt, true, false)?;
        for e in used.iter() {
            let Some(def) = can_propagate_to_exp(proc, stmt, e)? else {
                continue;
            };
            if let Some(rejection) = check_candidate(proc, stmt, e, def, ctx, &opts)? {
                if ctx.config.verbose {
                    record_rejection(proc, stmt, e, rejection, ctx)?;
                }
                continue;
            }
            round.merge(do_propagate_to(proc, stmt, e, def, ctx)?);
        }

        rounds += 1;
        outcome.merge(round);
        if !round.changed {
            break;
        }
        if rounds >= MAX_PROPAGATE_ITERATIONS {
            record_cap(proc, stmt, ctx)?;
            break;
        }
    }

    proc.simplify_statement(stmt)?;
    Ok(outcome)
}

/// Propagates flag definitions into statement `stmt`.
///
/// Only uses of `%flags` or a single flag qualify. This pushes condition
/// codes into branches and flag reads ahead of flag simplification.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedIr`] if the statement or a definition it
/// refers to is unknown.
pub fn propagate_flags_to(
    proc: &mut Procedure,
    stmt: StmtId,
    ctx: &AnalysisContext,
) -> Result<bool> {
    if proc.statement(stmt)?.is_phi() {
        return Ok(false);
    }

    let mut any = false;
    let mut rounds = 0;
    loop {
        let mut change = false;
        let used = proc.used_locs(stmt, true, false)?;
        for e in used.iter() {
            let Some((base, Def::Stmt(d))) = proc.pool().as_subscript(e) else {
                continue;
            };
            let pool = proc.pool();
            if d == stmt || !(pool.is_flags(base) || pool.is_main_flag(base)) {
                continue;
            }
            if !proc.statement(d)?.is_assign() {
                continue;
            }
            change |= do_propagate_to(proc, stmt, e, d, ctx)?.changed;
        }

        rounds += 1;
        any |= change;
        if !change {
            break;
        }
        if rounds >= MAX_PROPAGATE_ITERATIONS {
            record_cap(proc, stmt, ctx)?;
            break;
        }
    }

    proc.simplify_statement(stmt)?;
    Ok(any)
}

/// Substitutes the definition `def` for its use `e` in `stmt`, drawing one
/// unit from the budget.
///
/// Returns an unchanged outcome without touching the statement once the
/// budget is exhausted.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedIr`] for unknown statements.
pub fn do_propagate_to(
    proc: &mut Procedure,
    stmt: StmtId,
    e: ExpId,
    def: StmtId,
    ctx: &AnalysisContext,
) -> Result<PropagateOutcome> {
    if !ctx.take_propagation() {
        return Ok(PropagateOutcome::default());
    }
    replace_ref(proc, stmt, e, def, ctx)
}

/// Replaces the use `e` in `stmt` by what its definition `def` computes.
///
/// A `%CF` or `%ZF` read of a subtract-compare `%flags` definition becomes
/// the matching comparison. Anything else is replaced by the definition's
/// right-hand side everywhere in the statement, collectors included; a call
/// whose target became constant is then converted to a direct call.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedIr`] for unknown statements.
pub fn replace_ref(
    proc: &mut Procedure,
    stmt: StmtId,
    e: ExpId,
    def: StmtId,
    ctx: &AnalysisContext,
) -> Result<PropagateOutcome> {
    let mut outcome = PropagateOutcome::default();
    let Some((base, _)) = proc.pool().as_subscript(e) else {
        return Ok(outcome);
    };
    let Some((lhs, rhs)) = proc.statement(def)?.as_assign().map(|a| (a.lhs, a.rhs)) else {
        return Ok(outcome);
    };

    let pool = proc.pool();
    let reads_cf = pool.is_terminal(base, Terminal::Cf);
    let reads_zf = pool.is_terminal(base, Terminal::Zf);
    if (reads_cf || reads_zf) && pool.is_flags(lhs) {
        if !pool.is_flag_call(rhs) {
            return Ok(outcome);
        }
        let condition = if reads_cf {
            flags::carry_condition(proc.pool_mut(), rhs)
        } else {
            flags::zero_condition(proc.pool_mut(), rhs)
        };
        if let Some(condition) = condition {
            outcome.changed = proc.search_and_replace(stmt, e, condition, true)?;
            if outcome.changed {
                let text = format!("{} -> {}", proc.display_exp(e), proc.display_exp(condition));
                record(proc, stmt, EventKind::FlagRewritten, text, ctx)?;
            }
            return Ok(outcome);
        }
    }

    outcome.changed = proc.search_and_replace(stmt, e, rhs, true)?;
    if outcome.changed {
        let text = format!("{} -> {}", proc.display_exp(e), proc.display_exp(rhs));
        record(proc, stmt, EventKind::Propagated, text, ctx)?;
        if proc.statement(stmt)?.is_call() {
            outcome.converted = proc.convert_to_direct(stmt)?;
        }
    }
    Ok(outcome)
}

fn check_candidate(
    proc: &Procedure,
    stmt: StmtId,
    e: ExpId,
    def: StmtId,
    ctx: &AnalysisContext,
    opts: &PropagateOptions<'_>,
) -> Result<Option<Rejection>> {
    let Some(assign) = proc.statement(def)?.as_assign() else {
        return Ok(None);
    };
    let (lhs, rhs) = (assign.lhs, assign.rhs);
    let pool = proc.pool();

    if proc.contains_bad_mem_of(rhs) && !(opts.force && pool.is_mem_of(rhs)) {
        return Ok(Some(Rejection::BadMemOf));
    }

    if ctx.config.experimental_dominance_heuristic {
        if let Some(used_by_dom_phi) = opts.used_by_dom_phi {
            if overwritten_in_loop(proc, stmt, def, rhs, used_by_dom_phi)? {
                return Ok(Some(Rejection::Overwritten));
            }
        }
    }

    if let Some(counts) = opts.dest_counts {
        if !pool.is_flags(lhs)
            && counts.get(&e).is_some_and(|&n| n > 1)
            && proc.complexity_depth(rhs) >= ctx.config.max_propagation_depth
            && !pool.contains_flags(rhs)
        {
            return Ok(Some(Rejection::TooComplex));
        }
    }

    Ok(None)
}

/// The dominance-number heuristic.
///
/// Moving `rhs` of `def` into `stmt` is refused when a component of `rhs`
/// is overwritten by an assignment `OW` feeding a phi, `OW` redefines a
/// location `def` reads, and `OW` lies between `def` and `stmt` in
/// dominance order. Missing dominance numbers never refuse.
fn overwritten_in_loop(
    proc: &Procedure,
    stmt: StmtId,
    def: StmtId,
    rhs: ExpId,
    used_by_dom_phi: &LocationSet,
) -> Result<bool> {
    let pool = proc.pool();
    let mut components = LocationSet::new();
    walk_exp(pool, rhs, &mut UsedLocsFinder::new(&mut components, false));
    let def_uses = proc.used_locs(def, false, false)?;

    for component in components.iter() {
        let Some((base, _)) = pool.as_subscript(component) else {
            continue;
        };
        let Some(ow) = used_by_dom_phi.find_ns(pool, base) else {
            continue;
        };
        let Some((_, Def::Stmt(ow_def))) = pool.as_subscript(ow) else {
            continue;
        };
        let ow_stmt = proc.statement(ow_def)?;
        let Some(ow_lhs) = ow_stmt.as_assign().map(|a| a.lhs) else {
            continue;
        };

        if def_uses
            .iter()
            .any(|u| pool.eq_ignoring_subscripts(u, ow_lhs))
        {
            let numbers = (
                proc.statement(def)?.dom_number(),
                ow_stmt.dom_number(),
                proc.statement(stmt)?.dom_number(),
            );
            return Ok(match numbers {
                (Some(d), Some(ow), Some(s)) => d <= ow && ow < s,
                _ => false,
            });
        }
    }
    Ok(false)
}

fn record(
    proc: &Procedure,
    stmt: StmtId,
    kind: EventKind,
    message: String,
    ctx: &AnalysisContext,
) -> Result<()> {
    ctx.events
        .record(kind)
        .procedure(proc.name())
        .statement(proc.statement(stmt)?.number())
        .message(message);
    Ok(())
}

fn record_rejection(
    proc: &Procedure,
    stmt: StmtId,
    e: ExpId,
    rejection: Rejection,
    ctx: &AnalysisContext,
) -> Result<()> {
    let text = format!("{} not propagated: {}", proc.display_exp(e), rejection.reason());
    record(proc, stmt, EventKind::PropagationRejected, text, ctx)
}

fn record_cap(proc: &Procedure, stmt: StmtId, ctx: &AnalysisContext) -> Result<()> {
    let text = format!("stopped after {MAX_PROPAGATE_ITERATIONS} rounds");
    record(proc, stmt, EventKind::IterationCapReached, text, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ssa::{BinaryOp, Call, StmtKind, Type},
        compiler::AnalysisConfig,
        test::ProcBuilder,
    };

    fn rhs_of(proc: &Procedure, s: StmtId) -> ExpId {
        proc.statement(s).unwrap().as_assign().unwrap().rhs
    }

    #[test]
    fn test_simple_substitution() -> Result<()> {
        let mut b = ProcBuilder::new("simple");
        let r24 = b.reg(24);
        let five = b.int(5);
        let def = b.assign(r24, five)?;
        let use_ = b.use_of(r24, def);
        let r25 = b.reg(25);
        let target = b.assign(r25, use_)?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::default();

        let outcome = propagate_to(&mut proc, target, &ctx, PropagateOptions::new())?;
        assert!(outcome.changed);
        assert!(!outcome.converted);
        assert_eq!(rhs_of(&proc, target), five);
        assert_eq!(ctx.events.count_kind(EventKind::Propagated), 1);

        let again = propagate_to(&mut proc, target, &ctx, PropagateOptions::new())?;
        assert!(!again.changed);
        Ok(())
    }

    #[test]
    fn test_ineligible_definitions() -> Result<()> {
        let mut b = ProcBuilder::new("ineligible");
        let r24 = b.reg(24);
        let implicit = b.implicit_ref(r24);
        let arr = b.reg(26);
        let one = b.int(1);
        let array_def = b.push(StmtKind::assign_typed(
            arr,
            one,
            Type::Array {
                base: Box::new(Type::signed(32)),
                length: Some(4),
            },
        ))?;
        let arr_use = b.use_of(arr, array_def);
        let sum = b.bin(BinaryOp::Plus, implicit, arr_use);
        let r25 = b.reg(25);
        let target = b.assign(r25, sum)?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::default();

        assert_eq!(can_propagate_to_exp(&proc, target, implicit)?, None);
        assert_eq!(can_propagate_to_exp(&proc, target, arr_use)?, None);
        assert_eq!(can_propagate_to_exp(&proc, target, r24)?, None);
        assert!(!propagate_to(&mut proc, target, &ctx, PropagateOptions::new())?.changed);
        Ok(())
    }

    #[test]
    fn test_phi_is_never_rewritten() -> Result<()> {
        let mut b = ProcBuilder::new("phi");
        let r24 = b.reg(24);
        let five = b.int(5);
        let def = b.assign(r24, five)?;
        let input = b.use_of(r24, def);
        let block = proc_block(&mut b);
        let phi = b.push(StmtKind::Phi(crate::analysis::ssa::Phi {
            lhs: r24,
            ty: Type::Unknown,
            inputs: [(block, input)].into_iter().collect(),
        }))?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::default();

        assert!(!propagate_to(&mut proc, phi, &ctx, PropagateOptions::new())?.changed);
        assert!(!propagate_flags_to(&mut proc, phi, &ctx)?);
        Ok(())
    }

    fn proc_block(b: &mut ProcBuilder) -> crate::analysis::ssa::BlockId {
        b.proc().blocks()[0].id()
    }

    #[test]
    fn test_bad_memof_and_force() -> Result<()> {
        let mut b = ProcBuilder::new("memof");
        let r28 = b.reg(28);
        let sp = b.implicit_ref(r28);
        let four = b.int(4);
        let addr = b.bin(BinaryOp::Minus, sp, four);
        let slot = b.mem(addr);
        let r24 = b.reg(24);
        let def = b.assign(r24, slot)?;
        let use_ = b.use_of(r24, def);
        let r25 = b.reg(25);
        let target = b.assign(r25, use_)?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::new(AnalysisConfig::new().with_verbose(true));

        assert!(!propagate_to(&mut proc, target, &ctx, PropagateOptions::new())?.changed);
        assert_eq!(ctx.events.count_kind(EventKind::PropagationRejected), 1);

        let forced = PropagateOptions::new().with_force(true);
        assert!(propagate_to(&mut proc, target, &ctx, forced)?.changed);
        assert_eq!(rhs_of(&proc, target), slot);
        Ok(())
    }

    #[test]
    fn test_force_moves_table_read_past_store() -> Result<()> {
        // r24 := m[r25{-} * 4 + 0x8000]; m[r28{-} - 4] := 0; r26 := r24{..}
        let mut b = ProcBuilder::new("table");
        let r25 = b.reg(25);
        let index = b.implicit_ref(r25);
        let four = b.int(4);
        let scaled = b.bin(BinaryOp::Mult, index, four);
        let base = b.int(0x8000);
        let entry = b.bin(BinaryOp::Plus, scaled, base);
        let read = b.mem(entry);
        let r24 = b.reg(24);
        let def = b.assign(r24, read)?;

        let r28 = b.reg(28);
        let sp = b.implicit_ref(r28);
        let slot_addr = b.bin(BinaryOp::Minus, sp, four);
        let slot = b.mem(slot_addr);
        let zero = b.int(0);
        b.assign(slot, zero)?;

        let use_ = b.use_of(r24, def);
        let r26 = b.reg(26);
        let target = b.assign(r26, use_)?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::default();

        assert!(!propagate_to(&mut proc, target, &ctx, PropagateOptions::new())?.changed);
        let forced = PropagateOptions::new().with_force(true);
        assert!(propagate_to(&mut proc, target, &ctx, forced)?.changed);
        assert_eq!(rhs_of(&proc, target), read);
        Ok(())
    }

    #[test]
    fn test_depth_limit() -> Result<()> {
        let mut b = ProcBuilder::new("depth");
        let r24 = b.reg(24);
        let r26 = b.reg(26);
        let x = b.implicit_ref(r26);
        let one = b.int(1);
        let two = b.int(2);
        let inner = b.bin(BinaryOp::Mult, x, two);
        let rhs = b.bin(BinaryOp::Plus, inner, one);
        let def = b.assign(r24, rhs)?;
        let use_ = b.use_of(r24, def);
        let r25 = b.reg(25);
        let target = b.assign(r25, use_)?;
        let mut proc = b.finish();

        let mut counts = FxHashMap::default();
        counts.insert(use_, 2);
        let limited = AnalysisContext::new(AnalysisConfig::conservative());
        let opts = PropagateOptions::new().with_dest_counts(&counts);
        assert!(!propagate_to(&mut proc, target, &limited, opts)?.changed);

        counts.insert(use_, 1);
        let opts = PropagateOptions::new().with_dest_counts(&counts);
        assert!(propagate_to(&mut proc, target, &limited, opts)?.changed);
        Ok(())
    }

    #[test]
    fn test_depth_limit_spares_flag_definitions() -> Result<()> {
        let mut b = ProcBuilder::new("flag-depth");
        let r24 = b.reg(24);
        let x = b.implicit_ref(r24);
        let two = b.int(2);
        let one = b.int(1);
        let doubled = b.bin(BinaryOp::Mult, x, two);
        let left = b.bin(BinaryOp::Plus, doubled, one);
        let r25 = b.reg(25);
        let y = b.implicit_ref(r25);
        let diff = b.bin(BinaryOp::Minus, left, y);
        let sub = b.pool().flag_call("SUBFLAGS32", vec![left, y, diff]);
        let flags = b.pool().flags();
        let flags_def = b.assign(flags, sub)?;
        let flags_use = b.use_of(flags, flags_def);
        let r8 = b.reg(8);
        let whole = b.assign(r8, flags_use)?;

        // %ZF := (%flags{-} & 64) + r24{-} * 2
        let zf = b.pool().terminal(Terminal::Zf);
        let entry_flags = b.implicit_ref(flags);
        let mask = b.int(64);
        let masked = b.bin(BinaryOp::BitAnd, entry_flags, mask);
        let zf_rhs = b.bin(BinaryOp::Plus, masked, doubled);
        let zf_def = b.assign(zf, zf_rhs)?;
        let zf_use = b.use_of(zf, zf_def);
        let r9 = b.reg(9);
        let single = b.assign(r9, zf_use)?;
        let mut proc = b.finish();

        let mut counts = FxHashMap::default();
        counts.insert(flags_use, 5);
        counts.insert(zf_use, 5);
        let limited = AnalysisContext::new(AnalysisConfig::conservative().with_verbose(true));
        let opts = PropagateOptions::new().with_dest_counts(&counts);

        assert!(proc.complexity_depth(sub) >= limited.config.max_propagation_depth);
        assert!(propagate_to(&mut proc, whole, &limited, opts)?.changed);
        assert_eq!(rhs_of(&proc, whole), sub);

        assert!(proc.complexity_depth(zf_rhs) >= limited.config.max_propagation_depth);
        assert!(propagate_to(&mut proc, single, &limited, opts)?.changed);
        assert!(proc.pool().contains_flags(rhs_of(&proc, single)));
        assert!(!limited.events.has(EventKind::PropagationRejected));
        Ok(())
    }

    #[test]
    fn test_carry_and_zero_flag_rewrites() -> Result<()> {
        let mut b = ProcBuilder::new("flags");
        let r24 = b.reg(24);
        let a = b.implicit_ref(r24);
        let five = b.int(5);
        let diff = b.bin(BinaryOp::Minus, a, five);
        let call = b.pool().flag_call("SUBFLAGS32", vec![a, five, diff]);
        let fl = b.pool().flags();
        let def = b.assign(fl, call)?;
        let cf = b.pool().terminal(Terminal::Cf);
        let zf = b.pool().terminal(Terminal::Zf);
        let cf_use = b.use_of(cf, def);
        let zf_use = b.use_of(zf, def);
        let r8 = b.reg(8);
        let r9 = b.reg(9);
        let carry = b.assign(r8, cf_use)?;
        let zero = b.assign(r9, zf_use)?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::default();

        assert!(propagate_flags_to(&mut proc, carry, &ctx)?);
        assert!(propagate_flags_to(&mut proc, zero, &ctx)?);

        let expected_cf = proc.pool_mut().binary(BinaryOp::LessUns, a, five);
        assert_eq!(rhs_of(&proc, carry), expected_cf);
        let text = proc.display_exp(rhs_of(&proc, zero));
        assert!(text.ends_with(" = 0)"), "{text}");
        assert_eq!(ctx.events.count_kind(EventKind::FlagRewritten), 2);
        Ok(())
    }

    #[test]
    fn test_call_conversion() -> Result<()> {
        let mut b = ProcBuilder::new("caller");
        let r24 = b.reg(24);
        let target_addr = b.pool().addr(0x401000);
        let def = b.assign(r24, target_addr)?;
        let dest = b.use_of(r24, def);
        let call = b.push(StmtKind::Call(Call {
            dest: Some(dest),
            computed: true,
            ..Call::default()
        }))?;
        let mut proc = b.finish();
        proc.register_callee(0x401000, "callee");
        let ctx = AnalysisContext::default();

        let outcome = propagate_to(&mut proc, call, &ctx, PropagateOptions::new())?;
        assert!(outcome.changed);
        assert!(outcome.converted);
        let converted = proc.statement(call)?.as_call().unwrap();
        assert!(!converted.computed);
        assert_eq!(converted.callee.as_deref(), Some("callee"));
        Ok(())
    }

    #[test]
    fn test_budget_stops_substitution() -> Result<()> {
        let mut b = ProcBuilder::new("budget");
        let r24 = b.reg(24);
        let five = b.int(5);
        let def = b.assign(r24, five)?;
        let use_ = b.use_of(r24, def);
        let r25 = b.reg(25);
        let r26 = b.reg(26);
        let first = b.assign(r25, use_)?;
        let second = b.assign(r26, use_)?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::new(AnalysisConfig::new().with_max_propagations(Some(1)));

        assert!(propagate_to(&mut proc, first, &ctx, PropagateOptions::new())?.changed);
        assert!(!propagate_to(&mut proc, second, &ctx, PropagateOptions::new())?.changed);
        assert_eq!(rhs_of(&proc, second), use_);
        assert_eq!(ctx.events.count_kind(EventKind::BudgetExhausted), 1);
        Ok(())
    }

    #[test]
    fn test_dominance_heuristic() -> Result<()> {
        // 1: r25 := r24{-} + 1        (def, dom 1)
        // 2: r24 := r24{-} - 1        (overwrite feeding a phi, dom 2)
        // 3: r26 := r25{1}            (target, dom 3)
        let mut b = ProcBuilder::new("loop");
        let r24 = b.reg(24);
        let r25 = b.reg(25);
        let r26 = b.reg(26);
        let x0 = b.implicit_ref(r24);
        let one = b.int(1);
        let inc = b.bin(BinaryOp::Plus, x0, one);
        let def = b.assign(r25, inc)?;
        let dec = b.bin(BinaryOp::Minus, x0, one);
        let ow = b.assign(r24, dec)?;
        let use_ = b.use_of(r25, def);
        let target = b.assign(r26, use_)?;
        let ow_ref = b.use_of(r24, ow);
        let mut proc = b.finish();

        let dom_phi: LocationSet = [ow_ref].into_iter().collect();
        let ctx = AnalysisContext::new(AnalysisConfig::new().with_dominance_heuristic(true));
        let opts = PropagateOptions::new().with_used_by_dom_phi(&dom_phi);

        // Without dominance numbers nothing is suppressed.
        let mut unnumbered = proc.clone();
        assert!(propagate_to(&mut unnumbered, target, &ctx, opts)?.changed);

        for (s, n) in [(def, 1), (ow, 2), (target, 3)] {
            proc.statement_mut(s)?.set_dom_number(Some(n));
        }
        assert!(!propagate_to(&mut proc, target, &ctx, opts)?.changed);

        let off = AnalysisContext::default();
        assert!(propagate_to(&mut proc, target, &off, opts)?.changed);
        Ok(())
    }
}
