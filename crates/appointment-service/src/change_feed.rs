//! "Data changed" signal
//!
//! A payload-free broadcast fired after every successful store mutation.
//! Synchronous callbacks run on the mutating task before the mutation
//! returns; async consumers use [`ChangeFeed::watch`] and receive the new
//! version number.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

pub type SubscriptionId = u64;

type Callback = Arc<dyn Fn() + Send + Sync>;

const WATCH_CAPACITY: usize = 64;

pub struct ChangeFeed {
    version: AtomicU64,
    next_subscription: AtomicU64,
    callbacks: RwLock<Vec<(SubscriptionId, Callback)>>,
    sender: broadcast::Sender<u64>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            version: AtomicU64::new(0),
            next_subscription: AtomicU64::new(1),
            callbacks: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Register a callback invoked after every mutation
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn watch(&self) -> broadcast::Receiver<u64> {
        self.sender.subscribe()
    }

    /// Number of changes published so far
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn publish(&self) -> u64 {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;

        // Snapshot so callbacks may (un)subscribe without deadlocking
        let callbacks: Vec<Callback> = self
            .callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback();
        }

        // No receivers is not an error
        let _ = self.sender.send(version);

        debug!("Published data change, version {}", version);
        version
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
