use crate::{DependencyKind, EntryId};

/// Events emitted by a [`Cycler`](crate::Cycler) during operations.
///
/// These events are passed to the tracing callback set via
/// [`Cycler::set_trace_callback`](crate::Cycler::set_trace_callback).
/// The `Clone` derive allows callbacks to store or forward events if needed.
///
/// # Examples
///
/// ```rust
/// use cycler::CyclerEvent;
///
/// let event = CyclerEvent::FinalizeAll { drained: 2 };
/// assert_eq!(event.to_string(), "finalize_all { drained: 2 }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CyclerEvent {
    /// A cleanup action entered the pending queue.
    Register {
        /// Handle assigned to the entry
        id: EntryId,
        /// Shape the dependency was registered as
        kind: DependencyKind,
    },

    /// An entry was released early.
    Release {
        /// The released entry
        id: EntryId,
        /// Whether the entry was still pending (and its action ran)
        found: bool,
    },

    /// A transient slot was reoccupied and its previous entry is being released.
    Supersede {
        /// Slot code
        code: String,
        /// Entry that occupied the slot until now
        previous: EntryId,
    },

    /// A finalize-all drain completed.
    FinalizeAll {
        /// Number of actions run by the drain
        drained: usize,
    },

    /// A cleanup action panicked.
    Fault {
        /// Entry whose action panicked
        id: EntryId,
        /// Panic message
        message: String,
    },
}

impl std::fmt::Display for CyclerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CyclerEvent::Register { id, kind } => {
                write!(f, "register {{ id: {id}, kind: {kind} }}")
            }
            CyclerEvent::Release { id, found } => {
                write!(f, "release {{ id: {id}, found: {found} }}")
            }
            CyclerEvent::Supersede { code, previous } => {
                write!(f, "supersede {{ code: {code}, previous: {previous} }}")
            }
            CyclerEvent::FinalizeAll { drained } => {
                write!(f, "finalize_all {{ drained: {drained} }}")
            }
            CyclerEvent::Fault { id, message } => {
                write!(f, "fault {{ id: {id}, message: {message} }}")
            }
        }
    }
}

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives a reference to a `CyclerEvent` every time the cycler changes
/// state. It must be thread-safe because a cycler can be shared between threads.
pub type TraceCallback = dyn Fn(&CyclerEvent) + Send + Sync + 'static;
