use crate::{
    analysis::ssa::{Procedure, StmtId},
    compiler::{AnalysisContext, EventKind, SsaPass},
    Result,
};

/// Takes a procedure out of SSA form into named local variables.
///
/// Runs three sweeps over the procedure, each finishing before the next
/// starts so every use finds the symbol its definition created:
///
/// 1. stack slots `m[sp ± K]` get locals
/// 2. registers and temporaries get locals, typed by their definitions
/// 3. subscripted references are replaced by their locals
#[derive(Debug, Default)]
pub struct LocalMappingPass;

impl LocalMappingPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn sweep(
        &self,
        proc: &mut Procedure,
        ctx: &AnalysisContext,
        order: &[StmtId],
        kind: EventKind,
        op: fn(&mut Procedure, StmtId) -> Result<bool>,
    ) -> Result<bool> {
        let mut changed = false;
        for &stmt in order {
            if op(proc, stmt)? {
                ctx.events
                    .record(kind)
                    .procedure(proc.name())
                    .statement(proc.statement(stmt)?.number())
                    .pass(self.name());
                changed = true;
            }
        }
        Ok(changed)
    }
}

impl SsaPass for LocalMappingPass {
    fn name(&self) -> &'static str {
        "local-mapping"
    }

    fn description(&self) -> &'static str {
        "Maps stack slots and registers to locals and leaves SSA form"
    }

    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool> {
        let order = proc.statements_in_order();
        let mut changed = self.sweep(
            proc,
            ctx,
            &order,
            EventKind::LocalsMapped,
            Procedure::dfa_map_locals,
        )?;
        changed |= self.sweep(
            proc,
            ctx,
            &order,
            EventKind::RegistersMapped,
            Procedure::map_registers_to_locals,
        )?;
        changed |= self.sweep(
            proc,
            ctx,
            &order,
            EventKind::SubscriptsReplaced,
            Procedure::replace_subscripts_with_locals,
        )?;
        Ok(changed)
    }
}
