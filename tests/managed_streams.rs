//! Integration tests for managed stream subscriptions.
//!
//! A managed subscription leaves the pending queue as soon as its stream terminates, and is
//! unsubscribed by the drain if the stream is still running when the scope ends.

use cycler::{Cycler, Observable, Observer, StreamError, Subject, Subscription};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Collect {
    values: Arc<Mutex<Vec<u32>>>,
    terminal: Arc<Mutex<Option<String>>>,
}

impl Observer<u32> for Collect {
    fn next(&mut self, value: u32) {
        self.values.lock().unwrap().push(value);
    }

    fn error(&mut self, error: StreamError) {
        *self.terminal.lock().unwrap() = Some(format!("error: {error}"));
    }

    fn complete(&mut self) {
        *self.terminal.lock().unwrap() = Some("complete".to_string());
    }
}

#[test]
fn test_observer_receives_values_until_completion() {
    let subject = Subject::new();
    let values = Arc::new(Mutex::new(Vec::new()));
    let terminal = Arc::new(Mutex::new(None));
    let cycler = Cycler::new();

    cycler.register(|| {});
    let before = cycler.pending_count();

    cycler.subscribe_managed(
        &subject,
        Collect {
            values: values.clone(),
            terminal: terminal.clone(),
        },
    );
    assert_eq!(cycler.pending_count(), before + 1);

    subject.next(1);
    subject.next(2);
    subject.next(3);
    subject.complete();

    assert_eq!(*values.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(terminal.lock().unwrap().as_deref(), Some("complete"));
    assert_eq!(cycler.pending_count(), before);
}

#[test]
fn test_error_also_releases_entry() {
    let subject = Subject::new();
    let terminal = Arc::new(Mutex::new(None));
    let cycler = Cycler::new();

    let entry = cycler.subscribe_managed(
        &subject,
        Collect {
            values: Arc::new(Mutex::new(Vec::new())),
            terminal: terminal.clone(),
        },
    );

    subject.error(StreamError::new("upstream closed"));

    assert!(!entry.is_pending());
    assert_eq!(cycler.pending_count(), 0);
    assert_eq!(
        terminal.lock().unwrap().as_deref(),
        Some("error: upstream closed")
    );
}

#[test]
fn test_drain_unsubscribes_running_stream() {
    let subject = Subject::new();
    let received = Arc::new(AtomicUsize::new(0));
    let cycler = Cycler::new();

    let counter = received.clone();
    cycler.subscribe_managed(&subject, move |_: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(subject.observer_count(), 1);

    subject.next(1);
    cycler.finalize_all().unwrap();
    subject.next(2);

    assert_eq!(subject.observer_count(), 0);
    assert_eq!(received.load(Ordering::SeqCst), 1);
}

#[test]
fn test_already_completed_source_leaves_nothing_pending() {
    let subject: Subject<u32> = Subject::new();
    subject.complete();

    let cycler = Cycler::new();
    let entry = cycler.subscribe_managed(&subject, |_: u32| {});

    assert!(!entry.is_pending());
    assert_eq!(cycler.pending_count(), 0);
}

#[test]
fn test_early_release_detaches_observer() {
    let subject = Subject::new();
    let received = Arc::new(AtomicUsize::new(0));
    let cycler = Cycler::new();

    let counter = received.clone();
    let entry = cycler.subscribe_managed(&subject, move |_: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    entry.release().unwrap();
    subject.next(1);
    subject.complete();

    assert_eq!(received.load(Ordering::SeqCst), 0);
    assert_eq!(cycler.pending_count(), 0);
}

/// A cold source that emits a fixed list and completes during `subscribe`.
struct Replay(Vec<u32>);

impl Observable<u32> for Replay {
    fn subscribe(&self, mut observer: Box<dyn Observer<u32>>) -> Subscription {
        for value in &self.0 {
            observer.next(*value);
        }
        observer.complete();
        Subscription::closed()
    }
}

#[test]
fn test_synchronous_source_completes_inside_subscribe() {
    let values = Arc::new(Mutex::new(Vec::new()));
    let cycler = Cycler::new();

    let sink = values.clone();
    let entry = cycler.subscribe_managed(&Replay(vec![4, 5, 6]), move |value: u32| {
        sink.lock().unwrap().push(value);
    });

    assert_eq!(*values.lock().unwrap(), vec![4, 5, 6]);
    assert!(!entry.is_pending());
    assert_eq!(cycler.pending_count(), 0);
}

#[test]
fn test_several_subscriptions_to_one_subject() {
    let subject = Subject::new();
    let cycler = Cycler::new();

    cycler.subscribe_managed(&subject, |_: u32| {});
    cycler.subscribe_managed(&subject, |_: u32| {});
    assert_eq!(cycler.pending_count(), 2);
    assert_eq!(subject.observer_count(), 2);

    subject.complete();
    assert_eq!(cycler.pending_count(), 0);
}
