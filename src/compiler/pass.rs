//! The pass abstraction.

use crate::{analysis::Procedure, compiler::AnalysisContext, Result};

/// A rewrite over one procedure in SSA form.
///
/// Passes must be `Send + Sync` so [`crate::compiler::run_passes`] can run
/// them on several procedures at once. A pass receives exclusive access to
/// the procedure and shared access to the context; events go straight to
/// `ctx.events`.
pub trait SsaPass: Send + Sync {
    /// Unique name for events and errors.
    fn name(&self) -> &'static str;

    /// Runs the pass on `proc`.
    ///
    /// Returns `true` if the procedure changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the procedure's IR is malformed.
    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool>;

    /// Should this pass run on `proc` at all?
    fn should_run(&self, _proc: &Procedure, _ctx: &AnalysisContext) -> bool {
        true
    }

    /// Short description of what the pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
