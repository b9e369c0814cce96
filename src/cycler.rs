//! Core registry: the pending queue, managed entries and transient slots.
//!
//! Every registration gets a stable [`EntryId`]. Ids grow monotonically, so the ordered
//! map of pending actions iterates in registration order and an early release removes
//! its entry by id without scanning the queue.
//!
//! No cycler lock is held while a cleanup action or the trace callback runs. Either may
//! therefore release other entries, register new ones or query the cycler it belongs to.
//! The one exception is a transient replacement, which keeps its own code's gate until the
//! new occupant is stored.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::stream::{Observable, Observer, OnTerminate};
use crate::{
    CleanupFault, CyclerError, CyclerEvent, Dependency, DependencyKind, Disposable, FaultPolicy,
    Subscribable, TraceCallback,
};

/// Stable handle of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value of the id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct PendingAction {
    kind: DependencyKind,
    action: Box<dyn FnOnce() + Send>,
}

#[derive(Default)]
struct Queue {
    next_id: u64,
    entries: BTreeMap<EntryId, PendingAction>,
}

/// State shared between a [`Cycler`] and the entries it hands out.
struct Shared {
    name: Option<String>,
    fault_policy: FaultPolicy,
    queue: Mutex<Queue>,
    trace: Mutex<Option<Arc<TraceCallback>>>,
}

impl Shared {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }

    /// Locks the queue.
    ///
    /// # Lock Poisoning Recovery
    ///
    /// A poisoned lock is recovered by extracting the inner value. No user code runs while
    /// the queue is locked, so a poisoned queue is still consistent.
    fn queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Invokes the trace callback, if one is set.
    ///
    /// The callback is cloned out of its lock first, so it may call back into the cycler.
    fn emit_event(&self, event: &CyclerEvent) {
        let callback = self
            .trace
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();

        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn set_trace(&self, callback: Option<Arc<TraceCallback>>) {
        *self.trace.lock().unwrap_or_else(|p| p.into_inner()) = callback;
    }

    fn enqueue(&self, dependency: Dependency) -> EntryId {
        let kind = dependency.kind();
        let action = dependency.into_action();

        let id = {
            let mut queue = self.queue();
            let id = EntryId(queue.next_id);
            queue.next_id += 1;
            queue.entries.insert(id, PendingAction { kind, action });
            id
        };

        tracing::debug!(cycler = self.label(), %id, %kind, "registered cleanup action");
        self.emit_event(&CyclerEvent::Register { id, kind });

        id
    }

    fn is_pending(&self, id: EntryId) -> bool {
        self.queue().entries.contains_key(&id)
    }

    fn run(&self, id: EntryId, pending: PendingAction) -> Result<(), CleanupFault> {
        let PendingAction { kind, action } = pending;

        panic::catch_unwind(AssertUnwindSafe(action)).map_err(|payload| {
            let fault = CleanupFault::from_panic(id, kind, payload.as_ref());
            tracing::warn!(
                cycler = self.label(),
                %id,
                %kind,
                message = %fault.message,
                "cleanup action panicked"
            );
            self.emit_event(&CyclerEvent::Fault {
                id,
                message: fault.message.clone(),
            });
            fault
        })
    }

    fn release(&self, id: EntryId) -> Result<bool, CyclerError> {
        let pending = self.queue().entries.remove(&id);

        let Some(pending) = pending else {
            tracing::trace!(cycler = self.label(), %id, "entry already finalized");
            self.emit_event(&CyclerEvent::Release { id, found: false });
            return Ok(false);
        };

        tracing::debug!(cycler = self.label(), %id, "releasing entry");
        self.emit_event(&CyclerEvent::Release { id, found: true });

        self.run(id, pending)
            .map_err(|fault| CyclerError::CleanupFailed {
                faults: vec![fault],
            })?;

        Ok(true)
    }

    fn finalize_all(&self, fault_policy: FaultPolicy) -> Result<(), CyclerError> {
        // Entries registered by the actions themselves are left for the next drain.
        let watermark = self.queue().next_id;
        let mut drained = 0usize;
        let mut faults = Vec::new();

        loop {
            let next = {
                let mut queue = self.queue();
                let due = queue
                    .entries
                    .first_key_value()
                    .is_some_and(|(id, _)| id.0 < watermark);
                if due {
                    queue.entries.pop_first()
                } else {
                    None
                }
            };

            let Some((id, pending)) = next else {
                break;
            };

            drained += 1;

            if let Err(fault) = self.run(id, pending) {
                faults.push(fault);
                if fault_policy == FaultPolicy::Abort {
                    break;
                }
            }
        }

        tracing::debug!(
            cycler = self.label(),
            drained,
            faults = faults.len(),
            "finalized pending cleanup actions"
        );
        self.emit_event(&CyclerEvent::FinalizeAll { drained });

        if faults.is_empty() {
            Ok(())
        } else {
            Err(CyclerError::CleanupFailed { faults })
        }
    }
}

/// Handle returned by every registration.
///
/// Cloning a handle is cheap and all clones refer to the same entry. Dropping a handle does
/// nothing; the entry stays pending until released or drained.
#[derive(Clone)]
pub struct ManagedEntry {
    id: EntryId,
    shared: Weak<Shared>,
}

impl ManagedEntry {
    /// Id of the entry in its cycler.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Finalizes the entry now.
    ///
    /// Runs the cleanup action and removes it from the pending queue. Returns `Ok(true)` if
    /// the action ran, `Ok(false)` if it had already been finalized (by an earlier release,
    /// a drain, or because the cycler is gone).
    ///
    /// # Errors
    ///
    /// [`CyclerError::CleanupFailed`] if the action panicked. The entry is no longer
    /// pending either way.
    pub fn release(&self) -> Result<bool, CyclerError> {
        match self.shared.upgrade() {
            Some(shared) => shared.release(self.id),
            None => Ok(false),
        }
    }

    /// Whether the entry's action has not run yet.
    pub fn is_pending(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.is_pending(self.id))
    }
}

impl fmt::Debug for ManagedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedEntry")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Configures a [`Cycler`] before it is created.
///
/// # Examples
///
/// ```rust
/// use cycler::{Cycler, FaultPolicy};
///
/// let cycler = Cycler::builder()
///     .name("search-view")
///     .fault_policy(FaultPolicy::Abort)
///     .build();
///
/// assert_eq!(cycler.name(), Some("search-view"));
/// ```
#[derive(Default)]
pub struct CyclerBuilder {
    name: Option<String>,
    fault_policy: FaultPolicy,
    trace: Option<Arc<TraceCallback>>,
}

impl CyclerBuilder {
    /// Label used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// How a panicking action affects [`Cycler::finalize_all`]. Defaults to
    /// [`FaultPolicy::Collect`].
    pub fn fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    /// Trace callback installed from the start.
    pub fn trace_callback(
        mut self,
        callback: impl Fn(&CyclerEvent) + Send + Sync + 'static,
    ) -> Self {
        self.trace = Some(Arc::new(callback));
        self
    }

    /// Creates the cycler.
    pub fn build(self) -> Cycler {
        Cycler {
            shared: Arc::new(Shared {
                name: self.name,
                fault_policy: self.fault_policy,
                queue: Mutex::new(Queue::default()),
                trace: Mutex::new(self.trace),
            }),
            transient: Mutex::new(HashMap::new()),
        }
    }
}

impl fmt::Debug for CyclerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclerBuilder")
            .field("name", &self.name)
            .field("fault_policy", &self.fault_policy)
            .field("trace", &self.trace.is_some())
            .finish()
    }
}

/// Registry of cleanup actions for one lifetime scope.
///
/// Create one per scope, register resources as they are acquired and call
/// [`finalize_all`](Cycler::finalize_all) when the scope ends. Dropping the cycler drains it
/// as well.
///
/// # Examples
///
/// ```rust
/// use cycler::Cycler;
/// use std::sync::{Arc, Mutex};
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let cycler = Cycler::new();
///
/// let first = log.clone();
/// cycler.register(move || first.lock().unwrap().push("a"));
/// let second = log.clone();
/// let entry = cycler.register(move || second.lock().unwrap().push("b"));
///
/// // Early release runs the action once and takes it out of the queue.
/// assert!(entry.release().unwrap());
/// assert!(!entry.release().unwrap());
///
/// cycler.finalize_all().unwrap();
/// assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
/// ```
pub struct Cycler {
    shared: Arc<Shared>,
    transient: Mutex<HashMap<String, TransientSlot>>,
}

/// Current occupant of one transient code.
#[derive(Default)]
struct TransientSlot {
    /// Held for a whole replacement. The slot map itself is only locked for reads and swaps.
    gate: Arc<Mutex<()>>,
    occupant: Option<ManagedEntry>,
}

impl Cycler {
    /// Creates an anonymous cycler with the default fault policy.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts configuring a cycler.
    pub fn builder() -> CyclerBuilder {
        CyclerBuilder::default()
    }

    /// Label given at build time.
    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    /// Policy applied by [`finalize_all`](Cycler::finalize_all).
    pub fn fault_policy(&self) -> FaultPolicy {
        self.shared.fault_policy
    }

    // -------------------------------------------------------------------------------------------------
    // Tracing
    // -------------------------------------------------------------------------------------------------

    /// Set a tracing callback for cycler operations.
    ///
    /// The callback is invoked for every registration, release, supersede, drain and fault.
    /// It runs without the queue or slot map locked, so it may call back into the cycler.
    pub fn set_trace_callback(&self, callback: impl Fn(&CyclerEvent) + Send + Sync + 'static) {
        self.shared.set_trace(Some(Arc::new(callback)));
    }

    /// Clear the tracing callback.
    pub fn clear_trace_callback(&self) {
        self.shared.set_trace(None);
    }

    // -------------------------------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------------------------------

    fn entry(&self, id: EntryId) -> ManagedEntry {
        ManagedEntry {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Register a cleanup closure.
    pub fn register(&self, action: impl FnOnce() + Send + 'static) -> ManagedEntry {
        self.register_any(Dependency::action(action))
    }

    /// Register a resource released through [`Disposable::dispose`].
    ///
    /// Only the cycler's own call is deduplicated; calling `dispose` elsewhere is not
    /// prevented.
    pub fn register_disposable(&self, entity: impl Disposable + 'static) -> ManagedEntry {
        self.register_any(Dependency::disposable(entity))
    }

    /// Register a resource released through [`Subscribable::unsubscribe`].
    pub fn register_subscribable(&self, entity: impl Subscribable + 'static) -> ManagedEntry {
        self.register_any(Dependency::subscribable(entity))
    }

    /// Register any supported dependency shape.
    pub fn register_any(&self, dependency: impl Into<Dependency>) -> ManagedEntry {
        let id = self.shared.enqueue(dependency.into());
        self.entry(id)
    }

    /// Register every dependency in order. Individual handles are discarded.
    pub fn register_many<I>(&self, dependencies: I)
    where
        I: IntoIterator,
        I::Item: Into<Dependency>,
    {
        for dependency in dependencies {
            self.register_any(dependency);
        }
    }

    /// Register a dependency under a single-occupancy slot.
    ///
    /// If `code` is already occupied, the previous entry is released first, so its action
    /// has run before the new dependency enters the queue. At most one entry per code is
    /// live at any time.
    ///
    /// Registrations under the same code are serialized; different codes do not wait for each
    /// other. While the previous occupant is being released the slot reads as empty. The
    /// superseded action and the trace callback may use the cycler freely, except for
    /// replacing the same code again, which waits for this call to finish.
    ///
    /// # Errors
    ///
    /// [`CyclerError::CleanupFailed`] if the previous occupant's action panicked. The new
    /// dependency is registered and holds the slot regardless; fetch its handle with
    /// [`transient_slot`](Cycler::transient_slot).
    pub fn register_transient(
        &self,
        code: impl Into<String>,
        dependency: impl Into<Dependency>,
    ) -> Result<ManagedEntry, CyclerError> {
        let code = code.into();
        let gate = Arc::clone(&self.slots().entry(code.clone()).or_default().gate);
        let _turn = gate.lock().unwrap_or_else(|p| p.into_inner());

        let previous = self
            .slots()
            .get_mut(&code)
            .and_then(|slot| slot.occupant.take());

        let superseded = match previous {
            Some(previous) => {
                tracing::debug!(
                    cycler = self.shared.label(),
                    code = %code,
                    previous = %previous.id(),
                    "superseding transient entry"
                );
                self.shared.emit_event(&CyclerEvent::Supersede {
                    code: code.clone(),
                    previous: previous.id(),
                });
                previous.release()
            }
            None => Ok(false),
        };

        let entry = self.register_any(dependency);
        self.slots().entry(code).or_default().occupant = Some(entry.clone());

        superseded.map(|_| entry)
    }

    /// Current occupant of a transient slot.
    ///
    /// The returned entry may already be finalized if the cycler was drained since it was
    /// registered.
    pub fn transient_slot(&self, code: &str) -> Option<ManagedEntry> {
        self.slots()
            .get(code)
            .and_then(|slot| slot.occupant.clone())
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, TransientSlot>> {
        self.transient.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Subscribe `observer` to `source` and manage the subscription.
    ///
    /// When the source completes or errors, the entry is released automatically, so the
    /// queue only ever holds live subscriptions.
    pub fn subscribe_managed<T, S>(
        &self,
        source: &S,
        observer: impl Observer<T> + 'static,
    ) -> ManagedEntry
    where
        S: Observable<T> + ?Sized,
        T: 'static,
    {
        let hook = Arc::new(Mutex::new(TerminationHook::Waiting));
        let on_terminate = {
            let hook = Arc::clone(&hook);
            move || TerminationHook::fire(&hook)
        };

        let subscription = source.subscribe(Box::new(OnTerminate::new(observer, on_terminate)));
        let entry = self.register_subscribable(subscription);
        TerminationHook::arm(&hook, entry.clone());

        entry
    }

    // -------------------------------------------------------------------------------------------------
    // Finalization
    // -------------------------------------------------------------------------------------------------

    /// Run every pending action in registration order and empty the queue.
    ///
    /// Transient slots are left as they are; their stale entries release as no-ops. Calling
    /// this again on an empty queue does nothing.
    ///
    /// # Errors
    ///
    /// [`CyclerError::CleanupFailed`] if any action panicked. Under
    /// [`FaultPolicy::Collect`] every other action still ran; under [`FaultPolicy::Abort`]
    /// the drain stopped at the fault and the rest are still pending.
    pub fn finalize_all(&self) -> Result<(), CyclerError> {
        self.shared.finalize_all(self.shared.fault_policy)
    }

    /// Number of entries whose action has not run yet.
    pub fn pending_count(&self) -> usize {
        self.shared.queue().entries.len()
    }

    /// Whether `entry` belongs to this cycler and is still pending.
    pub fn is_pending(&self, entry: &ManagedEntry) -> bool {
        Weak::ptr_eq(&entry.shared, &Arc::downgrade(&self.shared))
            && self.shared.is_pending(entry.id)
    }
}

impl Default for Cycler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cycler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cycler")
            .field("name", &self.shared.name)
            .field("fault_policy", &self.shared.fault_policy)
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Runs every pending action, whatever the fault policy.
///
/// Nothing can drain the queue after this point, so faults are logged and the drain goes on
/// until actions registered by other actions have run too.
impl Drop for Cycler {
    fn drop(&mut self) {
        loop {
            if let Err(error) = self.shared.finalize_all(FaultPolicy::Collect) {
                tracing::warn!(
                    cycler = self.shared.label(),
                    %error,
                    "cleanup faults while dropping cycler"
                );
            }
            if self.pending_count() == 0 {
                break;
            }
        }
    }
}

/// Links a stream's terminal signal to the entry managing its subscription.
///
/// The source may terminate while `subscribe` is still running, before the entry exists.
enum TerminationHook {
    Waiting,
    Armed(ManagedEntry),
    Fired,
}

impl TerminationHook {
    fn lock(hook: &Mutex<Self>) -> MutexGuard<'_, Self> {
        hook.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn fire(hook: &Mutex<Self>) {
        let previous = mem::replace(&mut *Self::lock(hook), TerminationHook::Fired);

        if let TerminationHook::Armed(entry) = previous {
            release_terminated(&entry);
        }
    }

    fn arm(hook: &Mutex<Self>, entry: ManagedEntry) {
        let mut state = Self::lock(hook);

        if matches!(*state, TerminationHook::Fired) {
            drop(state);
            release_terminated(&entry);
        } else {
            *state = TerminationHook::Armed(entry);
        }
    }
}

fn release_terminated(entry: &ManagedEntry) {
    if let Err(error) = entry.release() {
        tracing::warn!(id = %entry.id(), %error, "releasing terminated subscription failed");
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
