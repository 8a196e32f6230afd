// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The caller's execution context.
//!
//! User handlers may only run while the caller context is held. The caller holds it through a
//! [`ContextGuard`] and must release it around any operation that can synchronously trigger a
//! handler on the loop thread, otherwise the loop thread blocks on the context while the
//! caller blocks on the loop thread.
//!
//! ```text
//!  caller thread                      loop thread
//!  ─────────────                      ───────────
//!  enter()  ──── holds context
//!  guard.unlocked(|| client.stop())
//!     ├─ releases context
//!     │                               dispatch(Disconnected)
//!     │                                  ├─ acquires context
//!     │                                  ├─ runs handler
//!     │                                  └─ releases context
//!     └─ re-acquires context
//! ```

use sspkit_core::EventKind;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::error;

/// A shareable execution context. Clones refer to the same context.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    lock: Arc<Mutex<()>>,
}

impl CallerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the context, blocking until it is free.
    pub fn enter(&self) -> ContextGuard<'_> {
        ContextGuard { context: self, guard: Some(self.acquire()) }
    }

    /// Whether some thread currently holds the context.
    pub fn is_held(&self) -> bool {
        matches!(self.lock.try_lock(), Err(TryLockError::WouldBlock))
    }

    /// Runs a handler invocation on behalf of `kind` while holding the context.
    ///
    /// A panicking handler is logged and contained; it never unwinds into the client.
    pub(crate) fn dispatch<F: FnOnce()>(&self, kind: EventKind, invoke: F) {
        let _guard = self.acquire();
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(invoke)) {
            error!(event = %kind, panic = %panic_message(panic.as_ref()), "Event handler panicked");
        }
    }

    fn acquire(&self) -> MutexGuard<'_, ()> {
        // The context guards no data; a poisoned lock is still a valid lock.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the caller context is held by the current thread.
pub struct ContextGuard<'a> {
    context: &'a CallerContext,
    guard: Option<MutexGuard<'a, ()>>,
}

impl ContextGuard<'_> {
    /// Runs `f` with the context released, re-acquiring it before returning.
    pub fn unlocked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        drop(self.guard.take());
        let result = f();
        self.guard = Some(self.context.acquire());
        result
    }

    pub const fn is_locked(&self) -> bool {
        self.guard.is_some()
    }
}

/// Runs `f` with the caller's context released, if the caller holds one.
pub(crate) fn released<R>(guard: Option<&mut ContextGuard<'_>>, f: impl FnOnce() -> R) -> R {
    match guard {
        Some(guard) => guard.unlocked(f),
        None => f(),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_guard_holds_and_releases() {
        let context = CallerContext::new();
        assert!(!context.is_held());

        let mut guard = context.enter();
        assert!(context.is_held());
        assert!(guard.is_locked());

        let held_inside = guard.unlocked(|| context.is_held());
        assert!(!held_inside);
        assert!(context.is_held());

        drop(guard);
        assert!(!context.is_held());
    }

    #[test]
    fn test_dispatch_waits_for_release() {
        let context = CallerContext::new();
        let mut guard = context.enter();
        let (tx, rx) = mpsc::channel();

        let worker_context = context.clone();
        let worker = std::thread::spawn(move || {
            worker_context.dispatch(EventKind::Disconnected, || tx.send(()).unwrap());
        });

        // The handler cannot run while the context is held
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        guard.unlocked(|| {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
            worker.join().unwrap();
        });
    }

    #[test]
    fn test_dispatch_contains_panics() {
        let context = CallerContext::new();
        let ran_after = AtomicBool::new(false);

        context.dispatch(EventKind::Exception, || panic!("handler bug"));
        context.dispatch(EventKind::Connected, || ran_after.store(true, Ordering::SeqCst));

        assert!(ran_after.load(Ordering::SeqCst));
        assert!(!context.is_held());
    }

    #[test]
    fn test_released_without_guard_runs_inline() {
        assert_eq!(released(None, || 5), 5);

        let context = CallerContext::new();
        let mut guard = context.enter();
        assert!(!released(Some(&mut guard), || context.is_held()));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
