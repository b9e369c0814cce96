//! Resource shapes accepted by the cycler.
//!
//! A resource is released in one of three ways: by calling a plain closure, by calling
//! [`Disposable::dispose`], or by calling [`Subscribable::unsubscribe`]. [`Dependency`]
//! tags which of the three applies, so dispatch is decided by the caller at compile time.

use std::fmt;

/// A resource released by calling [`dispose`](Disposable::dispose).
#[cfg_attr(test, mockall::automock)]
pub trait Disposable: Send {
    /// Releases the resource.
    fn dispose(&mut self);
}

/// A resource released by calling [`unsubscribe`](Subscribable::unsubscribe).
#[cfg_attr(test, mockall::automock)]
pub trait Subscribable: Send {
    /// Detaches the subscription.
    fn unsubscribe(&mut self);
}

impl<T: Disposable + ?Sized> Disposable for Box<T> {
    fn dispose(&mut self) {
        (**self).dispose();
    }
}

impl<T: Subscribable + ?Sized> Subscribable for Box<T> {
    fn unsubscribe(&mut self) {
        (**self).unsubscribe();
    }
}

/// The shape a [`Dependency`] was registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// A plain cleanup closure.
    Action,
    /// A [`Disposable`] resource.
    Disposable,
    /// A [`Subscribable`] resource.
    Subscribable,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Action => write!(f, "action"),
            DependencyKind::Disposable => write!(f, "disposable"),
            DependencyKind::Subscribable => write!(f, "subscribable"),
        }
    }
}

/// Anything the cycler knows how to release.
///
/// Closures convert with `From`, so `cycler.register_any(|| ...)` works directly.
/// Disposables and subscriptions are wrapped explicitly:
///
/// ```rust
/// use cycler::{Cycler, Dependency, Disposable};
///
/// struct Connection;
///
/// impl Disposable for Connection {
///     fn dispose(&mut self) {}
/// }
///
/// let cycler = Cycler::new();
/// cycler.register_many([
///     Dependency::disposable(Connection),
///     Dependency::action(|| println!("bye")),
/// ]);
/// assert_eq!(cycler.pending_count(), 2);
/// ```
pub enum Dependency {
    /// Released by invoking the closure.
    Action(Box<dyn FnOnce() + Send>),
    /// Released by calling [`Disposable::dispose`].
    Disposable(Box<dyn Disposable>),
    /// Released by calling [`Subscribable::unsubscribe`].
    Subscribable(Box<dyn Subscribable>),
}

impl Dependency {
    /// Wraps a cleanup closure.
    pub fn action(action: impl FnOnce() + Send + 'static) -> Self {
        Dependency::Action(Box::new(action))
    }

    /// Wraps a disposable resource.
    pub fn disposable(entity: impl Disposable + 'static) -> Self {
        Dependency::Disposable(Box::new(entity))
    }

    /// Wraps a subscription.
    pub fn subscribable(entity: impl Subscribable + 'static) -> Self {
        Dependency::Subscribable(Box::new(entity))
    }

    /// Which shape of dependency this is.
    pub fn kind(&self) -> DependencyKind {
        match self {
            Dependency::Action(_) => DependencyKind::Action,
            Dependency::Disposable(_) => DependencyKind::Disposable,
            Dependency::Subscribable(_) => DependencyKind::Subscribable,
        }
    }

    /// Turns the dependency into the single closure the queue stores.
    pub(crate) fn into_action(self) -> Box<dyn FnOnce() + Send> {
        match self {
            Dependency::Action(action) => action,
            Dependency::Disposable(mut entity) => Box::new(move || entity.dispose()),
            Dependency::Subscribable(mut entity) => Box::new(move || entity.unsubscribe()),
        }
    }
}

impl<F: FnOnce() + Send + 'static> From<F> for Dependency {
    fn from(action: F) -> Self {
        Dependency::action(action)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dependency").field(&self.kind()).finish()
    }
}
