// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # ssaflow
//!
//! The dataflow core of a machine-code decompiler. `ssaflow` works on
//! procedures in SSA form recovered from disassembled binaries and rewrites
//! them toward source-like code:
//!
//! - it substitutes definitions into their uses (propagation)
//! - it turns condition-code computations into comparisons
//! - it keeps the SSA subscripts consistent while doing so
//!
//! Loading binaries, lifting instructions and building control flow happen
//! upstream; type inference and code generation happen downstream.
//!
//! ## Quick Start
//!
//! ```rust
//! use ssaflow::prelude::*;
//!
//! // r24 := 5; r25 := r24{1} + 1
//! let mut proc = Procedure::new(ProcId::new(0), "main");
//! let bb = proc.add_block(0x401000);
//! let pool = proc.pool_mut();
//! let (r24, r25, five, one) = (pool.reg(24), pool.reg(25), pool.int(5), pool.int(1));
//! let def = proc.push_statement(bb, StmtKind::assign(r24, five))?;
//! let pool = proc.pool_mut();
//! let r24_1 = pool.ref_exp(r24, Def::Stmt(def));
//! let sum = pool.binary(BinaryOp::Plus, r24_1, one);
//! let target = proc.push_statement(bb, StmtKind::assign(r25, sum))?;
//!
//! let ctx = AnalysisContext::new(AnalysisConfig::default());
//! propagate_to(&mut proc, target, &ctx, PropagateOptions::new())?;
//! assert!(proc.display_statement(target)?.ends_with("r25 := 6"));
//! # Ok::<(), ssaflow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`analysis`] - The IR, the traversal framework, alias analysis and
//!   flag rewriting
//! - [`compiler`] - The propagation engine, passes, configuration and events
//! - [`Error`] and [`Result`] - Error handling
//!
//! ### The IR
//!
//! Expressions live in a per-procedure [`analysis::ExpPool`] and are
//! hash-consed, so equal trees share one [`analysis::ExpId`]. Statements are
//! owned by their [`analysis::Procedure`] and linked into basic blocks by
//! index.
//!
//! ### Concurrency
//!
//! A procedure is rewritten by one thread at a time; the borrow checker
//! enforces this through `&mut Procedure`. [`compiler::run_passes`] processes
//! different procedures in parallel, sharing one
//! [`compiler::AnalysisContext`].

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and functions.
///
/// # Example
///
/// ```rust
/// use ssaflow::prelude::*;
///
/// let ctx = AnalysisContext::new(AnalysisConfig::conservative());
/// assert!(ctx.events.is_empty());
/// ```
pub mod prelude;

pub mod analysis;
pub mod compiler;

/// `ssaflow` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `ssaflow` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;
