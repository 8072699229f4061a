//! Learner State Store
//!
//! This module holds the mutable record of everything a learner has said or
//! unlocked during a lesson. Values are plain JSON so that scripts can introduce
//! arbitrary keys, and every mutation is broadcast to subscribed listeners.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Key reported to listeners for a `bulk_update`.
pub const BULK_KEY: &str = "bulk";
/// Key reported to listeners for a `reset`.
pub const RESET_KEY: &str = "reset";

/// A single change notification delivered to listeners.
#[derive(Debug, Clone, Copy)]
pub struct StateChange<'a> {
    /// The key that changed, or `"bulk"` / `"reset"` for composite changes.
    pub key: &'a str,
    /// The new value. For bulk updates this is the partial map; for resets `Null`.
    pub value: &'a Value,
    /// The full state after the change was applied.
    pub snapshot: &'a Map<String, Value>,
}

/// A callback invoked on every state change.
pub type Listener = Arc<dyn Fn(&StateChange<'_>) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // A panicking listener must not take the whole lesson down with it.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A shareable handle onto a state's listener list.
///
/// Hosts use this to subscribe to a `LearnerState` that has been moved into a
/// running session.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    /// Registers a listener and returns the handle that removes it again.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChange<'_>) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Number of currently registered listeners.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_subscribed(&self, id: u64) -> bool {
        lock(&self.inner).entries.iter().any(|(entry, _)| *entry == id)
    }

    fn notify(&self, change: &StateChange<'_>) {
        // Deliver to a snapshot so listeners may (un)subscribe while we iterate;
        // the lock is never held across a callback.
        let snapshot: Vec<(u64, Listener)> = lock(&self.inner).entries.clone();
        for (id, listener) in snapshot {
            if self.is_subscribed(id) {
                listener(change);
            }
        }
    }
}

/// Removes its listener when `unsubscribe` is called.
///
/// Dropping a `Subscription` does *not* unsubscribe; the listener stays
/// registered for the life of the state.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Removes the listener. Calling this more than once, or after the state is
    /// gone, is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// The mutable, keyed store of lesson variables.
///
/// A `LearnerState` is created from a set of named defaults and can always be
/// returned to them with [`LearnerState::reset`]. It is owned by exactly one
/// interpreter.
pub struct LearnerState {
    data: Map<String, Value>,
    defaults: Map<String, Value>,
    listeners: ListenerRegistry,
}

impl LearnerState {
    /// Creates a state whose initial contents (and reset target) are `defaults`.
    pub fn new(defaults: Map<String, Value>) -> Self {
        Self {
            data: defaults.clone(),
            defaults,
            listeners: ListenerRegistry::default(),
        }
    }

    /// Returns the value for `key`, or `None` if the key was never set.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Convenience accessor for string values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Overwrites `key` and notifies listeners.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.data.insert(key.to_string(), value.clone());
        self.listeners.notify(&StateChange {
            key,
            value: &value,
            snapshot: &self.data,
        });
    }

    /// Applies every pair in `updates` as one logical change.
    ///
    /// Listeners receive a single notification keyed `"bulk"` whose value is
    /// the partial map.
    pub fn bulk_update(&mut self, updates: Map<String, Value>) {
        for (key, value) in &updates {
            self.data.insert(key.clone(), value.clone());
        }
        let value = Value::Object(updates);
        self.listeners.notify(&StateChange {
            key: BULK_KEY,
            value: &value,
            snapshot: &self.data,
        });
    }

    /// Restores the defaults this state was created with.
    pub fn reset(&mut self) {
        self.data = self.defaults.clone();
        self.listeners.notify(&StateChange {
            key: RESET_KEY,
            value: &Value::Null,
            snapshot: &self.data,
        });
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChange<'_>) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// A handle that can subscribe to this state from elsewhere.
    pub fn listeners(&self) -> ListenerRegistry {
        self.listeners.clone()
    }

    /// The full current contents.
    pub fn snapshot(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }
}

impl fmt::Debug for LearnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearnerState")
            .field("data", &self.data)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
