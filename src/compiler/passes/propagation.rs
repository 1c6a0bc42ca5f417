//! Passes driving the propagation engine over whole procedures.

use rustc_hash::FxHashMap;

use crate::{
    analysis::ssa::{ExpId, LocationSet, Procedure, StmtId, StmtKind},
    compiler::{
        propagate::{can_propagate_to_exp, propagate_flags_to, propagate_to, PropagateOptions},
        AnalysisContext, EventKind, SsaPass,
    },
    Result,
};

/// Propagates definitions into every statement of a procedure.
///
/// Statements are visited in block order. Before rewriting, the pass counts
/// how many statements use each subscripted location, which arms the depth
/// limit of [`propagate_to`]: an expression needed in several places is only
/// duplicated while it stays cheap.
#[derive(Debug, Default)]
pub struct PropagationPass;

impl PropagationPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SsaPass for PropagationPass {
    fn name(&self) -> &'static str {
        "propagation"
    }

    fn description(&self) -> &'static str {
        "Substitutes definitions into their uses"
    }

    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool> {
        let order = proc.statements_in_order();
        let dest_counts = dest_counts(proc, &order)?;
        let dom_phi = if ctx.config.experimental_dominance_heuristic {
            Some(used_by_dom_phi(proc, &order)?)
        } else {
            None
        };

        let mut opts = PropagateOptions::new().with_dest_counts(&dest_counts);
        if let Some(used) = &dom_phi {
            opts = opts.with_used_by_dom_phi(used);
        }

        let mut changed = false;
        for &stmt in &order {
            if proc.statement(stmt)?.is_phi() {
                continue;
            }
            let outcome = propagate_to(proc, stmt, ctx, opts)?;
            if outcome.converted {
                let s = proc.statement(stmt)?;
                let callee = s
                    .as_call()
                    .and_then(|c| c.callee.clone())
                    .unwrap_or_default();
                ctx.events
                    .record(EventKind::CallConverted)
                    .procedure(proc.name())
                    .statement(s.number())
                    .message(format!("call to {callee} is now direct"))
                    .pass(self.name());
            }
            changed |= outcome.changed;
        }
        Ok(changed)
    }
}

/// Counts, per subscripted location, the non-phi statements using it.
fn dest_counts(proc: &Procedure, order: &[StmtId]) -> Result<FxHashMap<ExpId, usize>> {
    let mut counts = FxHashMap::default();
    for &stmt in order {
        if proc.statement(stmt)?.is_phi() {
            continue;
        }
        for e in proc.used_locs(stmt, true, false)?.iter() {
            if can_propagate_to_exp(proc, stmt, e)?.is_some() {
                *counts.entry(e).or_insert(0) += 1;
            }
        }
    }
    Ok(counts)
}

/// Collects the subscripted inputs of every phi-function.
fn used_by_dom_phi(proc: &Procedure, order: &[StmtId]) -> Result<LocationSet> {
    let mut used = LocationSet::new();
    for &stmt in order {
        if let StmtKind::Phi(phi) = proc.statement(stmt)?.kind() {
            used.extend(
                phi.inputs
                    .values()
                    .copied()
                    .filter(|e| proc.pool().is_subscript(*e)),
            );
        }
    }
    Ok(used)
}

/// Pushes flag definitions into their consumers.
///
/// Runs ahead of branch simplification: once `%flags{d}` sits in a branch
/// condition the condition can be turned into a comparison.
#[derive(Debug, Default)]
pub struct FlagPropagationPass;

impl FlagPropagationPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SsaPass for FlagPropagationPass {
    fn name(&self) -> &'static str {
        "flag-propagation"
    }

    fn description(&self) -> &'static str {
        "Substitutes condition-code definitions into flag uses"
    }

    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool> {
        let mut changed = false;
        for stmt in proc.statements_in_order() {
            changed |= propagate_flags_to(proc, stmt, ctx)?;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ssa::{BinaryOp, BranchType, Call},
        test::ProcBuilder,
        compiler::AnalysisConfig,
    };

    #[test]
    fn test_dest_counts() -> Result<()> {
        let mut b = ProcBuilder::new("counts");
        let r24 = b.reg(24);
        let five = b.int(5);
        let def = b.assign(r24, five)?;
        let use_ = b.use_of(r24, def);
        let sum = b.bin(BinaryOp::Plus, use_, use_);
        let r25 = b.reg(25);
        let r26 = b.reg(26);
        b.assign(r25, sum)?;
        b.assign(r26, use_)?;
        let proc = b.finish();

        let counts = dest_counts(&proc, &proc.statements_in_order())?;
        assert_eq!(counts.get(&use_), Some(&2));
        Ok(())
    }

    #[test]
    fn test_pass_converts_calls() -> Result<()> {
        let mut b = ProcBuilder::new("main");
        let r24 = b.reg(24);
        let target = b.pool().addr(0x402000);
        let def = b.assign(r24, target)?;
        let dest = b.use_of(r24, def);
        b.push(StmtKind::Call(Call {
            dest: Some(dest),
            computed: true,
            ..Call::default()
        }))?;
        let mut proc = b.finish();
        proc.register_callee(0x402000, "helper");
        let ctx = AnalysisContext::default();

        assert!(PropagationPass::new().run_on_procedure(&mut proc, &ctx)?);
        assert_eq!(ctx.events.count_kind(EventKind::CallConverted), 1);
        assert!(!PropagationPass::new().run_on_procedure(&mut proc, &ctx)?);
        Ok(())
    }

    #[test]
    fn test_flag_pass_simplifies_branch() -> Result<()> {
        let mut b = ProcBuilder::new("branchy");
        let r24 = b.reg(24);
        let x = b.implicit_ref(r24);
        let five = b.int(5);
        let diff = b.bin(BinaryOp::Minus, x, five);
        let call = b.pool().flag_call("SUBFLAGS32", vec![x, five, diff]);
        let fl = b.pool().flags();
        let def = b.assign(fl, call)?;
        let cond = b.use_of(fl, def);
        let branch = b.push(StmtKind::branch(cond, BranchType::Jsl, None))?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::new(AnalysisConfig::default());

        assert!(FlagPropagationPass::new().run_on_procedure(&mut proc, &ctx)?);
        let text = proc.display_statement(branch)?;
        assert!(text.contains("(r24{-} < 5)"), "{text}");
        Ok(())
    }
}
