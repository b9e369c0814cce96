//! # Cycler
//!
//! A scope-bound cleanup registry. Collect the cleanup actions of everything a scope
//! acquires (callbacks, disposables, stream subscriptions) and run each of them exactly
//! once when the scope ends.
//!
//! ## Quick Start
//!
//! ```rust
//! use cycler::Cycler;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let released = Arc::new(AtomicUsize::new(0));
//! let cycler = Cycler::new();
//!
//! let counter = released.clone();
//! cycler.register(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//! assert_eq!(cycler.pending_count(), 1);
//!
//! cycler.finalize_all().unwrap();
//! assert_eq!(released.load(Ordering::SeqCst), 1);
//! assert_eq!(cycler.pending_count(), 0);
//! ```
//!
//! ## Features
//!
//! - **Exactly once**: an action runs at most once, whether released early or drained
//! - **Ordered**: [`Cycler::finalize_all`] runs actions in registration order
//! - **Transient slots**: [`Cycler::register_transient`] finalizes the previous occupant of a
//!   named slot before the new one is registered
//! - **Streams**: [`Cycler::subscribe_managed`] drops its queue entry as soon as the stream ends
//! - **Thread-safe**: a `Cycler` can be shared between threads
//! - **Tracing support**: optional callback plus `tracing` diagnostics
//!
//! ## Main Types
//!
//! - [`Cycler`] - The registry itself
//! - [`ManagedEntry`] - Handle returned by every registration, supports early release
//! - [`Dependency`] - Tagged union of the accepted resource shapes
//! - [`Disposable`] / [`Subscribable`] - Resource traits
//! - [`Subject`] - Multicast push stream usable with [`Cycler::subscribe_managed`]
//! - [`define_cycler!`] - Process-wide cycler for application-lifetime resources

mod cycler;
mod cycler_error;
mod cycler_event;
mod dependency;
mod macros;
pub mod stream;

pub use cycler::{Cycler, CyclerBuilder, EntryId, ManagedEntry};
pub use cycler_error::{CleanupFault, CyclerError, FaultPolicy};
pub use cycler_event::{CyclerEvent, TraceCallback};
pub use dependency::{Dependency, DependencyKind, Disposable, Subscribable};
pub use stream::{Observable, Observer, StreamError, Subject, Subscription};
