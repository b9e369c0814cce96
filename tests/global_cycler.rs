//! Integration tests for the process-wide cycler created by `define_cycler!`.
//!
//! NOTE: All tests use #[serial] because they share the same static cycler (shutdown).
//! Running them in parallel would cause interference and non-deterministic failures.

use cycler::{define_cycler, Dependency, Disposable};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

define_cycler!(shutdown);

struct LogFile {
    closed: Arc<AtomicUsize>,
}

impl Disposable for LogFile {
    fn dispose(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
#[serial]
fn test_application_resources_released_at_shutdown() {
    shutdown::finalize_all().unwrap();

    let closed = Arc::new(AtomicUsize::new(0));
    shutdown::register_any(Dependency::disposable(LogFile {
        closed: closed.clone(),
    }));
    assert_eq!(shutdown::pending_count(), 1);

    shutdown::finalize_all().unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(shutdown::pending_count(), 0);
}

#[test]
#[serial]
fn test_transient_slot_on_global_cycler() {
    shutdown::finalize_all().unwrap();

    let stopped = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let counter = stopped.clone();
        shutdown::register_transient("config-watcher", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    assert_eq!(stopped.load(Ordering::SeqCst), 2);
    assert_eq!(shutdown::pending_count(), 1);

    shutdown::finalize_all().unwrap();
    assert_eq!(stopped.load(Ordering::SeqCst), 3);
}

#[test]
#[serial]
fn test_global_trace_callback() {
    shutdown::finalize_all().unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    shutdown::set_trace_callback(move |event| {
        events_clone.lock().unwrap().push(event.to_string());
    });

    shutdown::register(|| {});
    shutdown::finalize_all().unwrap();
    shutdown::clear_trace_callback();
    shutdown::register(|| {});
    shutdown::finalize_all().unwrap();

    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert!(captured[0].starts_with("register"));
    assert_eq!(captured[1], "finalize_all { drained: 1 }");
}

#[test]
#[serial]
fn test_cycler_accessor_exposes_full_api() {
    shutdown::finalize_all().unwrap();

    let entry = shutdown::register(|| {});
    assert!(shutdown::cycler().is_pending(&entry));
    assert_eq!(shutdown::cycler().name(), Some("shutdown"));

    entry.release().unwrap();
    assert_eq!(shutdown::pending_count(), 0);
}
