use crate::{
    analysis::ssa::Procedure,
    compiler::{AnalysisContext, EventKind, SsaPass},
    Result,
};

/// Routes uses around calls that preserve the used location.
///
/// After `r28{call}` is replaced by the value reaching the call, the stack
/// pointer (and any other callee-saved register) flows through calls and
/// stack accesses after a call resolve to the same locals as before it.
#[derive(Debug, Default)]
pub struct CallBypassPass;

impl CallBypassPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SsaPass for CallBypassPass {
    fn name(&self) -> &'static str {
        "call-bypass"
    }

    fn description(&self) -> &'static str {
        "Bypasses calls for locations the callee preserves"
    }

    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool> {
        let mut changed = false;
        for stmt in proc.statements_in_order() {
            if proc.bypass(stmt)? {
                ctx.events
                    .record(EventKind::CallBypassed)
                    .procedure(proc.name())
                    .statement(proc.statement(stmt)?.number())
                    .message(proc.display_statement(stmt)?)
                    .pass(self.name());
                changed = true;
            }
        }
        Ok(changed)
    }
}
