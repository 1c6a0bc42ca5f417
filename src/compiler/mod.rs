//! The propagation engine and the passes built on it.
//!
//! - [`crate::analysis`] - the IR and the statement-level queries and rewrites
//! - [`compiler`](self) - deciding what to rewrite, and running it over procedures
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Analysis Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  AnalysisContext              Shared by all workers              │
//! │    ├─ AnalysisConfig          (depth limit, budget, heuristics)  │
//! │    ├─ PropagationBudget       (global substitution count)        │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  propagate                    The engine                         │
//! │    ├─ propagate_to()          definitions into one statement     │
//! │    ├─ propagate_flags_to()    flag definitions only              │
//! │    └─ replace_ref()           substitution and flag rewriting    │
//! │                                                                  │
//! │  PassScheduler / run_passes   Procedures in parallel (rayon)     │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ Dataflow: propagation, flag propagation, call bypass       │
//! │    ├─ Locals: stack slots, registers, leaving SSA form           │
//! │    └─ Types: conscripts, constant casts, sizes, casts            │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use ssaflow::prelude::*;
//!
//! let mut proc = Procedure::new(ProcId::new(0), "main");
//! let bb = proc.add_block(0x1000);
//! let r24 = proc.pool_mut().reg(24);
//! let five = proc.pool_mut().int(5);
//! let def = proc.push_statement(bb, StmtKind::assign(r24, five))?;
//! let use_ = proc.pool_mut().ref_exp(r24, Def::Stmt(def));
//! let r25 = proc.pool_mut().reg(25);
//! let target = proc.push_statement(bb, StmtKind::assign(r25, use_))?;
//!
//! let ctx = AnalysisContext::new(AnalysisConfig::default());
//! let mut procs = vec![proc];
//! PassScheduler::dataflow().run(&mut procs, &ctx)?;
//!
//! assert!(procs[0].display_statement(target)?.ends_with("r25 := 5"));
//! assert!(ctx.events.has(EventKind::Propagated));
//! # Ok::<(), ssaflow::Error>(())
//! ```

mod config;
mod context;
mod events;
mod pass;
mod passes;
pub mod propagate;
mod scheduler;

pub use config::AnalysisConfig;
pub use context::{AnalysisContext, PropagationBudget};
pub use events::{Event, EventBuilder, EventKind, EventLog, EventLogIter};
pub use pass::SsaPass;
pub use passes::{
    CallBypassPass, CastInsertionPass, ConscriptPass, ConstCastPass, FlagPropagationPass,
    LocalMappingPass, PropagationPass, SizeStripPass,
};
pub use propagate::{
    can_propagate_to_exp, do_propagate_to, propagate_flags_to, propagate_to, replace_ref,
    PropagateOptions, PropagateOutcome, MAX_PROPAGATE_ITERATIONS,
};
pub use scheduler::{run_passes, PassScheduler};
