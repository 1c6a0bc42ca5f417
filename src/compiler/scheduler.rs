//! Running passes over many procedures.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::{
    analysis::Procedure,
    compiler::{AnalysisContext, EventKind, SsaPass},
    Error, Result,
};

/// Runs `passes` in order on every procedure.
///
/// Procedures are processed in parallel; each one is owned by a single
/// worker for the whole sequence. A pass failing on a procedure aborts the
/// remaining passes for that procedure only and is recorded in the event
/// log; the first such failure is returned once all procedures are done.
///
/// # Arguments
///
/// * `procs` - The procedures to rewrite.
/// * `passes` - The passes, run in order.
/// * `ctx` - The shared analysis context.
///
/// # Returns
///
/// The number of procedures changed by at least one pass.
///
/// # Errors
///
/// Returns [`Error::PassFailed`] wrapping the first error a pass returned.
pub fn run_passes(
    procs: &mut [Procedure],
    passes: &[Box<dyn SsaPass>],
    ctx: &AnalysisContext,
) -> Result<usize> {
    let changed = AtomicUsize::new(0);

    let results: Vec<Result<()>> = procs
        .par_iter_mut()
        .map(|proc| {
            if run_on_procedure(proc, passes, ctx)? {
                changed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })
        .collect();

    for result in results {
        result?;
    }
    Ok(changed.load(Ordering::Relaxed))
}

fn run_on_procedure(
    proc: &mut Procedure,
    passes: &[Box<dyn SsaPass>],
    ctx: &AnalysisContext,
) -> Result<bool> {
    let mut changed = false;
    for pass in passes {
        if !pass.should_run(proc, ctx) {
            continue;
        }
        ctx.events
            .record(EventKind::PassStarted)
            .procedure(proc.name())
            .pass(pass.name());

        match pass.run_on_procedure(proc, ctx) {
            Ok(pass_changed) => {
                ctx.events
                    .record(EventKind::PassCompleted)
                    .procedure(proc.name())
                    .pass(pass.name())
                    .message(if pass_changed { "changed" } else { "unchanged" });
                changed |= pass_changed;
            }
            Err(e) => {
                ctx.events
                    .record(EventKind::Error)
                    .procedure(proc.name())
                    .pass(pass.name())
                    .message(e.to_string());
                return Err(Error::PassFailed {
                    pass: pass.name(),
                    procedure: proc.name().to_string(),
                    source: Box::new(e),
                });
            }
        }
    }
    Ok(changed)
}

/// Repeats a pass sequence until the procedures stop changing.
///
/// Propagation exposes new flag uses, bypassing exposes new propagation
/// candidates, and so on; iterating the whole sequence catches those.
pub struct PassScheduler {
    max_iterations: usize,
    passes: Vec<Box<dyn SsaPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(5)
    }
}

impl PassScheduler {
    /// Creates an empty scheduler running at most `max_iterations` rounds.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            passes: Vec::new(),
        }
    }

    /// Creates a scheduler with the standard dataflow pipeline: call
    /// bypassing, propagation and flag propagation.
    #[must_use]
    pub fn dataflow() -> Self {
        Self::default()
            .with_pass(crate::compiler::CallBypassPass::new())
            .with_pass(crate::compiler::PropagationPass::new())
            .with_pass(crate::compiler::FlagPropagationPass::new())
    }

    /// Appends a pass.
    #[must_use]
    pub fn with_pass(mut self, pass: impl SsaPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Appends a boxed pass.
    pub fn add(&mut self, pass: Box<dyn SsaPass>) {
        self.passes.push(pass);
    }

    /// Returns the pass names in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs the sequence until a round changes nothing.
    ///
    /// # Returns
    ///
    /// The number of rounds run.
    ///
    /// # Errors
    ///
    /// Returns the first pass failure, see [`run_passes`].
    pub fn run(&self, procs: &mut [Procedure], ctx: &AnalysisContext) -> Result<usize> {
        let mut rounds = 0;
        while rounds < self.max_iterations {
            rounds += 1;
            let changed = run_passes(procs, &self.passes, ctx)?;
            if changed == 0 {
                break;
            }
        }
        ctx.events.info(format!(
            "pipeline finished after {rounds} rounds: {}",
            ctx.events.summary()
        ));
        Ok(rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::ssa::ProcId, test::ProcBuilder};

    struct Failing;

    impl SsaPass for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run_on_procedure(&self, proc: &mut Procedure, _ctx: &AnalysisContext) -> Result<bool> {
            proc.statement(crate::analysis::ssa::StmtId::new(99))?;
            Ok(false)
        }
    }

    fn chain(name: &str) -> Result<Procedure> {
        let mut b = ProcBuilder::new(name);
        let r24 = b.reg(24);
        let five = b.int(5);
        let def = b.assign(r24, five)?;
        let use_ = b.use_of(r24, def);
        let r25 = b.reg(25);
        b.assign(r25, use_)?;
        Ok(b.finish())
    }

    #[test]
    fn test_run_passes_parallel() -> Result<()> {
        let mut procs = vec![chain("a")?, chain("b")?, Procedure::new(ProcId::new(9), "empty")];
        let ctx = AnalysisContext::default();
        let passes: Vec<Box<dyn SsaPass>> = vec![Box::new(crate::compiler::PropagationPass::new())];

        assert_eq!(run_passes(&mut procs, &passes, &ctx)?, 2);
        assert_eq!(ctx.events.count_kind(EventKind::PassStarted), 3);
        assert_eq!(run_passes(&mut procs, &passes, &ctx)?, 0);
        Ok(())
    }

    #[test]
    fn test_failure_is_wrapped() -> Result<()> {
        let mut procs = vec![chain("broken")?];
        let ctx = AnalysisContext::default();
        let passes: Vec<Box<dyn SsaPass>> = vec![Box::new(Failing)];

        match run_passes(&mut procs, &passes, &ctx) {
            Err(Error::PassFailed { pass, procedure, .. }) => {
                assert_eq!(pass, "failing");
                assert_eq!(procedure, "broken");
            }
            other => panic!("expected a pass failure, got {other:?}"),
        }
        assert_eq!(ctx.events.errors().count(), 1);
        Ok(())
    }

    #[test]
    fn test_scheduler_reaches_fixpoint() -> Result<()> {
        let mut procs = vec![chain("a")?];
        let ctx = AnalysisContext::default();
        let scheduler = PassScheduler::dataflow();

        assert_eq!(
            scheduler.pass_names(),
            vec!["call-bypass", "propagation", "flag-propagation"]
        );
        assert_eq!(scheduler.run(&mut procs, &ctx)?, 2);
        Ok(())
    }
}
