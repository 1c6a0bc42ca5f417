//! Structured event log of the analysis pipeline.
//!
//! Every rewrite the passes perform, and every noteworthy decision of the
//! propagation engine (a rejected candidate, an exhausted budget, a hit
//! iteration cap), is recorded as an [`Event`]. The log is append-only and
//! may be written from several threads through a shared reference, which is
//! what lets [`crate::compiler::run_passes`] process procedures in parallel.
//!
//! # Example
//!
//! ```rust
//! use ssaflow::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::Propagated)
//!     .procedure("main")
//!     .statement(12)
//!     .message("r24{7} -> 5");
//! log.info("propagation finished");
//!
//! assert!(log.has(EventKind::Propagated));
//! assert_eq!(log.len(), 2);
//! assert_eq!(log.summary(), "1 propagated");
//! ```

use std::fmt;

use rustc_hash::FxHashMap;

/// Categories of recorded events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A definition was substituted into a use.
    Propagated,
    /// A single-flag read was rewritten into a comparison.
    FlagRewritten,
    /// A computed call became a direct call.
    CallConverted,
    /// A use was routed around a call preserving it.
    CallBypassed,
    /// Constants were tagged with conscripts.
    ConscriptsSet,
    /// A tagged constant received a type.
    ConstCast,
    /// Size annotations were removed.
    SizesStripped,
    /// Registers were given local variables.
    RegistersMapped,
    /// Signedness casts were inserted.
    CastsInserted,
    /// Subscripted references were replaced by their locals.
    SubscriptsReplaced,
    /// Stack slots were given local variables.
    LocalsMapped,

    /// A propagation candidate was rejected.
    PropagationRejected,
    /// The global substitution budget ran out.
    BudgetExhausted,
    /// Propagation into a statement stopped at the iteration cap.
    IterationCapReached,

    /// A pass started on a procedure.
    PassStarted,
    /// A pass finished on a procedure.
    PassCompleted,

    /// Informational message.
    Info,
    /// Something unexpected but recoverable.
    Warning,
    /// Something failed.
    Error,
}

impl EventKind {
    /// Returns a short human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Propagated => "propagated",
            Self::FlagRewritten => "flag rewritten",
            Self::CallConverted => "call converted",
            Self::CallBypassed => "call bypassed",
            Self::ConscriptsSet => "conscripts set",
            Self::ConstCast => "constant cast",
            Self::SizesStripped => "sizes stripped",
            Self::RegistersMapped => "registers mapped",
            Self::CastsInserted => "casts inserted",
            Self::SubscriptsReplaced => "subscripts replaced",
            Self::LocalsMapped => "locals mapped",
            Self::PropagationRejected => "propagation rejected",
            Self::BudgetExhausted => "budget exhausted",
            Self::IterationCapReached => "iteration cap reached",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns `true` if the event stands for a change to the IR.
    fn is_transformation(self) -> bool {
        matches!(
            self,
            Self::Propagated
                | Self::FlagRewritten
                | Self::CallConverted
                | Self::CallBypassed
                | Self::ConscriptsSet
                | Self::ConstCast
                | Self::SizesStripped
                | Self::RegistersMapped
                | Self::CastsInserted
                | Self::SubscriptsReplaced
                | Self::LocalsMapped
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One recorded event.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Name of the procedure it happened in.
    pub procedure: Option<String>,
    /// Number of the statement it happened at.
    pub statement: Option<u32>,
    /// Free-form details.
    pub message: String,
    /// Name of the pass that recorded it.
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            procedure: None,
            statement: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(proc) = &self.procedure {
            write!(f, " {proc}")?;
        }
        if let Some(n) = self.statement {
            write!(f, "#{n}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Fluent builder returned by [`EventLog::record`].
///
/// The event is appended to the log when the builder is dropped, so a chain
/// ending in `;` records it.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    procedure: Option<String>,
    statement: Option<u32>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            procedure: None,
            statement: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the procedure name.
    pub fn procedure(mut self, name: impl Into<String>) -> Self {
        self.procedure = Some(name.into());
        self
    }

    /// Sets the statement number.
    pub fn statement(mut self, number: u32) -> Self {
        self.statement = Some(number);
        self
    }

    /// Sets the message. Without one the kind's description is used.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Sets the recording pass.
    pub fn pass(mut self, name: impl Into<String>) -> Self {
        self.pass = Some(name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());
        self.log.events.push(Event {
            kind: self.kind,
            procedure: self.procedure.take(),
            statement: self.statement.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Thread-safe, append-only collection of [`Event`]s.
///
/// Statistics are computed from the recorded events on demand rather than
/// tracked in separate counters.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        Self {
            events: self.iter().cloned().collect(),
        }
    }
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts an event of `kind`; it is recorded when the builder drops.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Returns `true` if an event of `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts the events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.filter_kind(kind).count()
    }

    /// Iterates over all events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Iterates over the events of `kind`.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Iterates over the events recorded for procedure `name`.
    pub fn filter_procedure<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter()
            .filter(move |e| e.procedure.as_deref() == Some(name))
    }

    /// Iterates over errors.
    pub fn errors(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Error)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> FxHashMap<EventKind, usize> {
        let mut counts = FxHashMap::default();
        for event in self {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Summarises the transformations, e.g. `"2 call bypassed, 14 propagated"`.
    ///
    /// Falls back to the plain event count when nothing was transformed.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .into_iter()
            .filter(|(kind, _)| kind.is_transformation())
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect();
        if parts.is_empty() {
            return format!("{} events", self.len());
        }
        parts.sort();
        parts.join(", ")
    }
}

/// Iterator over `&Event`, in recording order.
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}
