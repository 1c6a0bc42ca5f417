//! Passes preparing expressions for and applying type information.

use crate::{
    analysis::ssa::{Procedure, Type},
    compiler::{AnalysisContext, EventKind, SsaPass},
    Result,
};

/// Inserts signedness casts where an operator disagrees with the known type
/// of its operand, and pointer casts on typed memory stores.
#[derive(Debug, Default)]
pub struct CastInsertionPass;

impl CastInsertionPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SsaPass for CastInsertionPass {
    fn name(&self) -> &'static str {
        "cast-insertion"
    }

    fn description(&self) -> &'static str {
        "Makes signedness and pointer types explicit with casts"
    }

    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool> {
        let mut changed = false;
        for stmt in proc.statements_in_order() {
            if proc.insert_casts(stmt)? {
                ctx.events
                    .record(EventKind::CastsInserted)
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

/// Removes bit-width annotations so types can be inferred afresh.
///
/// Annotations on temporaries stay, they are the only width information a
/// temporary has.
#[derive(Debug, Default)]
pub struct SizeStripPass;

impl SizeStripPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SsaPass for SizeStripPass {
    fn name(&self) -> &'static str {
        "size-strip"
    }

    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool> {
        let mut changed = false;
        for stmt in proc.statements_in_order() {
            if proc.strip_sizes(stmt)? {
                ctx.events
                    .record(EventKind::SizesStripped)
                    .procedure(proc.name())
                    .statement(proc.statement(stmt)?.number())
                    .pass(self.name());
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// Tags every untagged constant of a procedure with a distinct conscript.
///
/// Numbering continues after the highest tag already present, so running
/// the pass again only tags constants introduced since.
#[derive(Debug, Default)]
pub struct ConscriptPass;

impl ConscriptPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SsaPass for ConscriptPass {
    fn name(&self) -> &'static str {
        "conscripts"
    }

    fn description(&self) -> &'static str {
        "Distinguishes textually equal constants"
    }

    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool> {
        let order = proc.statements_in_order();
        let mut last = 0;
        for &stmt in &order {
            for c in proc.find_constants(stmt)? {
                last = last.max(proc.pool().conscript(c).unwrap_or(0));
            }
        }

        let first = last;
        for &stmt in &order {
            last = proc.set_conscripts(stmt, last)?;
        }
        if last == first {
            return Ok(false);
        }
        ctx.events
            .record(EventKind::ConscriptsSet)
            .procedure(proc.name())
            .message(format!("tagged constants {}..={}", first + 1, last))
            .pass(self.name());
        Ok(true)
    }
}

/// Gives tagged constants the types an external type analysis chose.
#[derive(Debug, Default)]
pub struct ConstCastPass {
    casts: Vec<(u32, Type)>,
}

impl ConstCastPass {
    /// Creates the pass applying `casts`, pairs of conscript and type.
    #[must_use]
    pub fn new(casts: Vec<(u32, Type)>) -> Self {
        Self { casts }
    }
}

impl SsaPass for ConstCastPass {
    fn name(&self) -> &'static str {
        "const-cast"
    }

    fn should_run(&self, _proc: &Procedure, _ctx: &AnalysisContext) -> bool {
        !self.casts.is_empty()
    }

    fn run_on_procedure(&self, proc: &mut Procedure, ctx: &AnalysisContext) -> Result<bool> {
        let mut changed = false;
        for stmt in proc.statements_in_order() {
            for (num, ty) in &self.casts {
                if proc.cast_const(stmt, *num, ty.clone())? {
                    ctx.events
                        .record(EventKind::ConstCast)
                        .procedure(proc.name())
                        .statement(proc.statement(stmt)?.number())
                        .message(format!("constant \\{num}\\ is {ty}"))
                        .pass(self.name());
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ssa::{BinaryOp, StmtKind},
        test::ProcBuilder,
    };

    #[test]
    fn test_conscripts_then_cast() -> Result<()> {
        let mut b = ProcBuilder::new("consts");
        let r24 = b.reg(24);
        let r25 = b.reg(25);
        let four = b.int(4);
        let first = b.assign(r24, four)?;
        let second = b.assign(r25, four)?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::default();

        assert!(ConscriptPass::new().run_on_procedure(&mut proc, &ctx)?);
        assert!(!ConscriptPass::new().run_on_procedure(&mut proc, &ctx)?);
        assert!(proc.display_statement(first)?.ends_with("r24 := 4\\1\\"));
        assert!(proc.display_statement(second)?.ends_with("r25 := 4\\2\\"));

        let pass = ConstCastPass::new(vec![(2, Type::unsigned(8))]);
        assert!(pass.should_run(&proc, &ctx));
        assert!(pass.run_on_procedure(&mut proc, &ctx)?);
        assert!(proc.display_statement(first)?.ends_with("r24 := 4\\1\\"));
        assert!(proc.display_statement(second)?.contains("(uint8)4"));
        assert_eq!(ctx.events.count_kind(EventKind::ConstCast), 1);
        Ok(())
    }

    #[test]
    fn test_strip_then_casts() -> Result<()> {
        let mut b = ProcBuilder::new("sizes");
        let r24 = b.reg(24);
        let one = b.int(1);
        let def = b.push(StmtKind::assign_typed(r24, one, Type::signed(32)))?;
        let x = b.use_of(r24, def);
        let sized = b.pool().size(32, x);
        let ten = b.int(10);
        let cmp = b.bin(BinaryOp::LessUns, sized, ten);
        let r25 = b.reg(25);
        let s = b.assign(r25, cmp)?;
        let mut proc = b.finish();
        let ctx = AnalysisContext::default();

        assert!(SizeStripPass::new().run_on_procedure(&mut proc, &ctx)?);
        assert!(CastInsertionPass::new().run_on_procedure(&mut proc, &ctx)?);
        let text = proc.display_statement(s)?;
        assert!(text.contains("(uint32)r24{"), "{text}");
        assert!(ctx.events.has(EventKind::SizesStripped));
        assert!(ctx.events.has(EventKind::CastsInserted));
        Ok(())
    }
}
