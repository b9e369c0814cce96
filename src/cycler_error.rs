use std::any::Any;
use std::fmt;

use crate::{DependencyKind, EntryId};

/// How a drain reacts when a cleanup action panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Keep running the remaining actions and report every fault at the end.
    #[default]
    Collect,
    /// Stop at the first fault. Actions not yet run stay pending.
    Abort,
}

/// A cleanup action that panicked while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFault {
    /// Entry whose action panicked.
    pub id: EntryId,
    /// Shape the entry was registered as.
    pub kind: DependencyKind,
    /// Panic message, if the payload was a string.
    pub message: String,
}

impl CleanupFault {
    pub(crate) fn from_panic(
        id: EntryId,
        kind: DependencyKind,
        payload: &(dyn Any + Send),
    ) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self { id, kind, message }
    }
}

impl fmt::Display for CleanupFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry {} ({}) panicked: {}",
            self.id, self.kind, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CyclerError {
    /// One or more cleanup actions panicked. The faulted entries are no longer pending.
    #[error("{} cleanup action(s) failed{}", .faults.len(), first_fault(.faults))]
    CleanupFailed { faults: Vec<CleanupFault> },
}

impl CyclerError {
    /// Faults carried by this error, in the order they happened.
    pub fn faults(&self) -> &[CleanupFault] {
        match self {
            CyclerError::CleanupFailed { faults } => faults,
        }
    }
}

fn first_fault(faults: &[CleanupFault]) -> String {
    faults
        .first()
        .map(|fault| format!(", first: {fault}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    fn fault(id: u64, message: &str) -> CleanupFault {
        CleanupFault {
            id: EntryId::from_raw(id),
            kind: DependencyKind::Action,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_fault_display() {
        assert_eq!(
            fault(3, "boom").to_string(),
            "entry 3 (action) panicked: boom"
        );
    }

    #[test]
    fn test_cleanup_failed_display() {
        let err = CyclerError::CleanupFailed {
            faults: vec![fault(1, "first"), fault(2, "second")],
        };
        assert_eq!(
            err.to_string(),
            "2 cleanup action(s) failed, first: entry 1 (action) panicked: first"
        );
    }

    #[test]
    fn test_faults_accessor() {
        let err = CyclerError::CleanupFailed {
            faults: vec![fault(7, "x")],
        };
        assert_eq!(err.faults().len(), 1);
        assert_eq!(err.faults()[0].id, EntryId::from_raw(7));
    }

    #[test]
    fn test_message_from_str_payload() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        let fault = CleanupFault::from_panic(
            EntryId::from_raw(0),
            DependencyKind::Disposable,
            payload.as_ref(),
        );
        assert_eq!(fault.message, "static message");
    }

    #[test]
    fn test_message_from_string_payload() {
        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        let fault = CleanupFault::from_panic(
            EntryId::from_raw(0),
            DependencyKind::Action,
            payload.as_ref(),
        );
        assert_eq!(fault.message, "formatted 42");
    }

    #[test]
    fn test_message_from_opaque_payload() {
        let payload = panic::catch_unwind(|| panic::panic_any(5u8)).unwrap_err();
        let fault = CleanupFault::from_panic(
            EntryId::from_raw(0),
            DependencyKind::Action,
            payload.as_ref(),
        );
        assert_eq!(fault.message, "non-string panic payload");
    }

    #[test]
    fn test_error_trait() {
        let err: &dyn std::error::Error = &CyclerError::CleanupFailed {
            faults: vec![fault(1, "x")],
        };
        assert!(err.to_string().starts_with("1 cleanup action(s) failed"));
    }

    #[test]
    fn test_default_policy_collects() {
        assert_eq!(FaultPolicy::default(), FaultPolicy::Collect);
    }
}
