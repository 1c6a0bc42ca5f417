use thiserror::Error;

macro_rules! malformed_ir {
    // Single string version
    ($msg:expr) => {
        crate::Error::MalformedIr {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedIr {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every error this library can return.
///
/// Only broken IR invariants surface as errors. Analysis decisions such as a
/// rejected propagation candidate, an exhausted substitution budget or a hit
/// iteration cap are ordinary outcomes and never produce an `Error`.
///
/// # Error Categories
///
/// - [`Error::MalformedIr`] - An upstream pass handed over IR that violates a
///   structural invariant (dangling statement id, statement without a block, ...)
/// - [`Error::PassFailed`] - A pass aborted while processing a procedure
/// - [`Error::Error`] - Anything else
///
/// # Examples
///
/// ```rust
/// use ssaflow::{analysis::{ProcId, Procedure, StmtId}, Error};
///
/// let proc = Procedure::new(ProcId::new(0), "main");
/// match proc.previous_in_block(StmtId::new(7)) {
///     Err(Error::MalformedIr { message, file, line }) => {
///         eprintln!("broken IR: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("other error: {}", e),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The IR violates a structural invariant.
    ///
    /// This indicates a bug in whichever pass produced the IR. The analysis
    /// refuses to continue on such input rather than silently corrupting it
    /// further.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Malformed IR - {file}:{line}: {message}")]
    MalformedIr {
        /// Description of the violated invariant
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A pass failed on a procedure.
    #[error("Pass '{pass}' failed on '{procedure}': {source}")]
    PassFailed {
        /// Name of the failing pass
        pass: &'static str,
        /// Name of the procedure being processed
        procedure: String,
        /// The underlying error
        source: Box<Error>,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
