//! # ssaflow Prelude
//!
//! Re-exports of the types most programs using `ssaflow` need: the IR, the
//! traversal framework, the propagation engine and the pass pipeline.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ssaflow operations
pub use crate::Error;

/// The result type used throughout ssaflow
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Expressions and the pool interning them
pub use crate::analysis::{
    BinaryOp, ConstValue, Def, ExpId, ExpNode, ExpPool, Terminal, Type, UnaryOp,
};

/// Statements, blocks and procedures
pub use crate::analysis::{
    BasicBlock, BlockId, BranchType, Call, LocationSet, Phi, ProcId, Procedure, Statement, StmtId,
    StmtKind,
};

// ================================================================================================
// Traversal and Alias Analysis
// ================================================================================================

/// Visitor and modifier traits with their drivers
pub use crate::analysis::{
    modify_exp, walk_exp, ExpModifier, ExpVisitor, StmtModifier, VisitControl, VisitFlags,
};

/// Memory alias test
pub use crate::analysis::may_alias;

// ================================================================================================
// Propagation Engine and Passes
// ================================================================================================

/// Configuration, shared context and events
pub use crate::compiler::{
    AnalysisConfig, AnalysisContext, Event, EventKind, EventLog, PropagationBudget,
};

/// The propagation engine
pub use crate::compiler::{
    propagate_flags_to, propagate_to, PropagateOptions, PropagateOutcome,
    MAX_PROPAGATE_ITERATIONS,
};

/// Passes and their drivers
pub use crate::compiler::{
    run_passes, CallBypassPass, CastInsertionPass, ConscriptPass, ConstCastPass,
    FlagPropagationPass, LocalMappingPass, PassScheduler, PropagationPass, SizeStripPass, SsaPass,
};
