//! Macros for creating process-wide cyclers.
//!
//! A scope usually owns its [`Cycler`](crate::Cycler). Resources that live as long as the
//! application have no such owner; [`define_cycler!`] gives them a static one that is drained
//! explicitly at shutdown.

/// Creates a process-wide cycler with a single macro invocation.
///
/// The macro generates a module containing:
/// - Storage static (hidden)
/// - Free functions delegating to the cycler
/// - `cycler()` for access to the full [`Cycler`](crate::Cycler) API
///
/// Statics are never dropped, so call `finalize_all` before the process exits.
///
/// # Examples
///
/// ```rust
/// use cycler::define_cycler;
///
/// define_cycler!(app);
///
/// app::register(|| println!("closing log file"));
/// app::register_transient("watcher", || println!("stopping watcher")).unwrap();
/// assert_eq!(app::pending_count(), 2);
///
/// app::finalize_all().unwrap();
/// assert_eq!(app::pending_count(), 0);
/// ```
///
/// # Multiple Cyclers
///
/// Each invocation is isolated:
///
/// ```rust
/// use cycler::define_cycler;
///
/// define_cycler!(database);
/// define_cycler!(cache);
///
/// database::register(|| {});
///
/// assert_eq!(database::pending_count(), 1);
/// assert_eq!(cache::pending_count(), 0);
/// ```
#[macro_export]
macro_rules! define_cycler {
    ($name:ident) => {
        pub mod $name {
            use std::sync::LazyLock;

            // Storage for the cycler (module-private)
            static CYCLER: LazyLock<$crate::Cycler> = LazyLock::new(|| {
                $crate::Cycler::builder()
                    .name(stringify!($name))
                    .build()
            });

            /// Access the underlying cycler.
            pub fn cycler() -> &'static $crate::Cycler {
                &CYCLER
            }

            /// Register a cleanup closure.
            pub fn register(action: impl FnOnce() + Send + 'static) -> $crate::ManagedEntry {
                CYCLER.register(action)
            }

            /// Register any supported dependency shape.
            pub fn register_any(dependency: impl Into<$crate::Dependency>) -> $crate::ManagedEntry {
                CYCLER.register_any(dependency)
            }

            /// Register a dependency under a single-occupancy slot.
            pub fn register_transient(
                code: impl Into<String>,
                dependency: impl Into<$crate::Dependency>,
            ) -> Result<$crate::ManagedEntry, $crate::CyclerError> {
                CYCLER.register_transient(code, dependency)
            }

            /// Run every pending action in registration order.
            pub fn finalize_all() -> Result<(), $crate::CyclerError> {
                CYCLER.finalize_all()
            }

            /// Number of pending actions.
            pub fn pending_count() -> usize {
                CYCLER.pending_count()
            }

            /// Set a tracing callback for this cycler.
            pub fn set_trace_callback(
                callback: impl Fn(&$crate::CyclerEvent) + Send + Sync + 'static,
            ) {
                CYCLER.set_trace_callback(callback)
            }

            /// Clear the tracing callback.
            pub fn clear_trace_callback() {
                CYCLER.clear_trace_callback()
            }
        }
    };
}
