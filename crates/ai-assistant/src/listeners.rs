//! Listener registry with unsubscribe-on-drop handles

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: AtomicU64,
    callbacks: DashMap<u64, Callback<T>>,
}

/// Callbacks notified with a shared reference to `T`
pub struct ListenerRegistry<T> {
    inner: Arc<Listeners<T>>,
}

impl<T> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Listeners {
                next_id: AtomicU64::new(0),
                callbacks: DashMap::new(),
            }),
        }
    }

    /// Subscribe; the callback stays registered until the handle is dropped
    #[must_use = "dropping the handle unsubscribes the listener"]
    pub fn add(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerHandle<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.callbacks.insert(id, Arc::new(callback));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Call every listener in subscription order
    pub fn notify(&self, value: &T) {
        // snapshot first, a callback may add or drop listeners
        let mut callbacks: Vec<(u64, Callback<T>)> = self
            .inner
            .callbacks
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        callbacks.sort_by_key(|(id, _)| *id);

        for (_, callback) in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.callbacks.is_empty()
    }
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ListenerHandle<T> {
    id: u64,
    registry: Weak<Listeners<T>>,
}

impl<T> ListenerHandle<T> {
    /// Unsubscribe now
    pub fn remove(self) {}
}

impl<T> Drop for ListenerHandle<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.callbacks.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_notify_in_subscription_order() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = seen.clone();
            registry.add(move |v| seen.lock().unwrap().push(("first", *v)))
        };
        let second = {
            let seen = seen.clone();
            registry.add(move |v| seen.lock().unwrap().push(("second", *v)))
        };

        registry.notify(&7);
        assert_eq!(*seen.lock().unwrap(), vec![("first", 7), ("second", 7)]);

        drop(first);
        drop(second);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ListenerRegistry::<u32>::new();
        let count = Arc::new(AtomicU64::new(0));

        let handle = {
            let count = count.clone();
            registry.add(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        registry.notify(&1);
        assert_eq!(registry.len(), 1);

        handle.remove();
        registry.notify(&2);

        assert!(registry.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_outlives_registry() {
        let registry = ListenerRegistry::<u32>::new();
        let handle = registry.add(|_| {});
        drop(registry);
        // nothing to unsubscribe from
        drop(handle);
    }
}
