//! Built-in passes.
//!
//! | Pass | Procedure operation | Events |
//! |------|---------------------|--------|
//! | [`PropagationPass`] | `propagate_to` | `Propagated`, `FlagRewritten`, `CallConverted` |
//! | [`FlagPropagationPass`] | `propagate_flags_to` | `Propagated`, `FlagRewritten` |
//! | [`CallBypassPass`] | [`Procedure::bypass`](crate::analysis::Procedure::bypass) | `CallBypassed` |
//! | [`LocalMappingPass`] | `dfa_map_locals`, `map_registers_to_locals`, `replace_subscripts_with_locals` | `LocalsMapped`, `RegistersMapped`, `SubscriptsReplaced` |
//! | [`CastInsertionPass`] | `insert_casts` | `CastsInserted` |
//! | [`SizeStripPass`] | `strip_sizes` | `SizesStripped` |
//! | [`ConscriptPass`] | `set_conscripts` | `ConscriptsSet` |
//! | [`ConstCastPass`] | `cast_const` | `ConstCast` |

mod bypass;
mod casts;
mod locals;
mod propagation;

pub use bypass::CallBypassPass;
pub use casts::{CastInsertionPass, ConscriptPass, ConstCastPass, SizeStripPass};
pub use locals::LocalMappingPass;
pub use propagation::{FlagPropagationPass, PropagationPass};
