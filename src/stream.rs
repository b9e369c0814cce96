//! Push-based value streams.
//!
//! A minimal observer model: an [`Observable`] pushes values into an [`Observer`] until it
//! completes or errors, and hands back a [`Subscription`] that detaches the observer early.
//! [`Subject`] is a multicast source driven by its owner.
//!
//! Emissions on one source must not overlap: `next`, `error` and `complete` are expected to
//! be called one at a time, as with any observable.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::Subscribable;

/// Error signalled by a stream as its terminal event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StreamError {
    message: String,
}

impl StreamError {
    /// Creates an error carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable reason the stream failed.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Receives the values of a stream.
///
/// Any `FnMut(T) + Send` closure is an observer that ignores the terminal signals.
pub trait Observer<T>: Send {
    /// The stream produced `value`.
    fn next(&mut self, value: T);

    /// The stream failed. No further calls follow.
    fn error(&mut self, error: StreamError) {
        let _ = error;
    }

    /// The stream ended. No further calls follow.
    fn complete(&mut self) {}
}

impl<T, F: FnMut(T) + Send> Observer<T> for F {
    fn next(&mut self, value: T) {
        self(value);
    }
}

/// A source of values that observers can subscribe to.
pub trait Observable<T> {
    /// Attach `observer`. The returned subscription detaches it.
    fn subscribe(&self, observer: Box<dyn Observer<T>>) -> Subscription;
}

/// Handle of an attached observer.
///
/// Unsubscribing runs the teardown at most once.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// A subscription that runs `teardown` when unsubscribed.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn closed() -> Self {
        Self { teardown: None }
    }

    /// Whether the teardown has run or there never was one.
    pub fn is_closed(&self) -> bool {
        self.teardown.is_none()
    }
}

impl Subscribable for Subscription {
    fn unsubscribe(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Forwards to an inner observer and runs a hook once the stream terminates.
pub(crate) struct OnTerminate<O, F> {
    inner: O,
    hook: Option<F>,
}

impl<O, F> OnTerminate<O, F> {
    pub(crate) fn new(inner: O, hook: F) -> Self {
        Self {
            inner,
            hook: Some(hook),
        }
    }
}

impl<O, F> OnTerminate<O, F>
where
    F: FnOnce(),
{
    fn finish(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

impl<T, O, F> Observer<T> for OnTerminate<O, F>
where
    O: Observer<T>,
    F: FnOnce() + Send,
{
    fn next(&mut self, value: T) {
        if self.hook.is_some() {
            self.inner.next(value);
        }
    }

    fn error(&mut self, error: StreamError) {
        if self.hook.is_some() {
            self.inner.error(error);
            self.finish();
        }
    }

    fn complete(&mut self) {
        if self.hook.is_some() {
            self.inner.complete();
            self.finish();
        }
    }
}

#[derive(Debug, Clone)]
enum Terminal {
    Complete,
    Error(StreamError),
}

impl Terminal {
    fn deliver<T>(&self, observer: &mut dyn Observer<T>) {
        match self {
            Terminal::Complete => observer.complete(),
            Terminal::Error(error) => observer.error(error.clone()),
        }
    }
}

struct SubjectState<T> {
    next_key: u64,
    observers: BTreeMap<u64, Box<dyn Observer<T>>>,
    /// Keys unsubscribed while their observer was checked out for delivery.
    cancelled: BTreeSet<u64>,
    terminal: Option<Terminal>,
}

/// Observers taken out of a subject for one [`Subject::next`] call.
///
/// Dropping it hands them back, also when an observer panics mid-delivery.
struct CheckedOut<'a, T> {
    state: &'a Mutex<SubjectState<T>>,
    observers: BTreeMap<u64, Box<dyn Observer<T>>>,
}

impl<T> Drop for CheckedOut<'_, T> {
    fn drop(&mut self) {
        let mut cancelled = Vec::new();
        let mut stranded = Vec::new();
        let terminal = {
            let mut state = lock(self.state);
            let terminal = state.terminal.clone();
            for (key, observer) in std::mem::take(&mut self.observers) {
                if state.cancelled.remove(&key) {
                    cancelled.push(observer);
                } else if terminal.is_some() {
                    stranded.push(observer);
                } else {
                    state.observers.insert(key, observer);
                }
            }
            state.cancelled.clear();
            terminal
        };

        // Terminated by one of the observers while the rest were checked out.
        if let Some(terminal) = terminal.filter(|_| !std::thread::panicking()) {
            for mut observer in stranded {
                terminal.deliver(observer.as_mut());
            }
        }
        drop(cancelled);
    }
}

/// Multicast source: every value passed to [`next`](Subject::next) goes to every observer
/// subscribed at that moment.
///
/// Observers subscribing after the subject terminated receive the terminal signal
/// immediately, inside `subscribe`.
///
/// # Examples
///
/// ```rust
/// use cycler::{Cycler, Subject};
/// use std::sync::{Arc, Mutex};
///
/// let subject = Subject::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let cycler = Cycler::new();
///
/// let sink = seen.clone();
/// cycler.subscribe_managed(&subject, move |value: i32| sink.lock().unwrap().push(value));
///
/// subject.next(7);
/// subject.complete();
///
/// assert_eq!(*seen.lock().unwrap(), vec![7]);
/// assert_eq!(cycler.pending_count(), 0);
/// ```
pub struct Subject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

fn lock<T>(state: &Mutex<SubjectState<T>>) -> MutexGuard<'_, SubjectState<T>> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// Creates a subject with no observers.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                next_key: 0,
                observers: BTreeMap::new(),
                cancelled: BTreeSet::new(),
                terminal: None,
            })),
        }
    }

    /// Push a value to every current observer. Ignored after termination.
    pub fn next(&self, value: T) {
        let mut delivery = {
            let mut state = lock(&self.state);
            if state.terminal.is_some() {
                return;
            }
            CheckedOut {
                state: &self.state,
                observers: std::mem::take(&mut state.observers),
            }
        };

        // Observers run without the lock so they may subscribe, unsubscribe or terminate.
        for (key, observer) in &mut delivery.observers {
            let skip = {
                let state = lock(&self.state);
                state.terminal.is_some() || state.cancelled.contains(key)
            };
            if !skip {
                observer.next(value.clone());
            }
        }
    }

    /// Terminate the stream with an error.
    pub fn error(&self, error: StreamError) {
        self.terminate(Terminal::Error(error));
    }

    /// Terminate the stream successfully.
    pub fn complete(&self) {
        self.terminate(Terminal::Complete);
    }

    fn terminate(&self, terminal: Terminal) {
        let observers = {
            let mut state = lock(&self.state);
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(terminal.clone());
            std::mem::take(&mut state.observers)
        };

        for (_, mut observer) in observers {
            terminal.deliver(observer.as_mut());
        }
    }

    /// Number of observers currently attached.
    pub fn observer_count(&self) -> usize {
        lock(&self.state).observers.len()
    }

    /// Whether `error` or `complete` has been called.
    pub fn is_terminated(&self) -> bool {
        lock(&self.state).terminal.is_some()
    }
}

impl<T: Clone + Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Observable<T> for Subject<T> {
    fn subscribe(&self, mut observer: Box<dyn Observer<T>>) -> Subscription {
        let key = {
            let mut state = lock(&self.state);
            match state.terminal.clone() {
                Some(terminal) => {
                    drop(state);
                    terminal.deliver(observer.as_mut());
                    return Subscription::closed();
                }
                None => {
                    let key = state.next_key;
                    state.next_key += 1;
                    state.observers.insert(key, observer);
                    key
                }
            }
        };

        let state: Weak<Mutex<SubjectState<T>>> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            let removed = {
                let mut state = lock(&state);
                let removed = state.observers.remove(&key);
                if removed.is_none() && state.terminal.is_none() {
                    // Checked out by an in-flight `next`; dropped when it is returned.
                    state.cancelled.insert(key);
                }
                removed
            };
            drop(removed);
        })
    }
}

impl<T> Clone for Subject<T> {
    /// The clone drives the same stream.
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Subject")
            .field("observers", &state.observers.len())
            .field("terminated", &state.terminal.is_some())
            .finish()
    }
}
