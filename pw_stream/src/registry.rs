//! ABOUTME: Payload-free observer registry
//! ABOUTME: Snapshot-then-notify so membership can change mid-pass

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;
use ulid::Ulid;

/// Notification callback; observers re-read state themselves
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`SubscriptionRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(Ulid);

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of callbacks invoked in registration order
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscribers: Mutex<Vec<(SubscriptionToken, Callback)>>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn() + Send + Sync + 'static,
    {
        let token = SubscriptionToken(Ulid::new());
        self.lock().push((token, Arc::new(callback)));
        token
    }

    /// Remove a subscriber; returns false if the token was unknown
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(t, _)| *t != token);
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every subscriber registered when the pass starts
    ///
    /// A panicking callback is logged and skipped; the rest still run.
    /// Returns the number of callbacks that completed.
    pub fn notify_all(&self) -> usize {
        let snapshot: Vec<Callback> = self.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();

        let mut completed = 0;
        for callback in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback())) {
                Ok(()) => completed += 1,
                Err(_) => warn!("Subscriber panicked during notification"),
            }
        }
        completed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionToken, Callback)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
