//! Typed object pools and a worker pool with idle reaping.
//!
//! The batch processor and provider gateway churn through short-lived
//! `Vec`/`HashMap` buffers and message/request scratch space on every call.
//! [`ObjectPool`] hands those out and takes them back, resetting them before
//! reuse so a caller can never observe another caller's leftover data.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A pool of reusable `T` values.
///
/// `T` must know how to reset itself to a clean state (`Resettable::reset`)
/// before being handed back out. The pool never blocks: if empty, it builds
/// a fresh value via the factory.
pub struct ObjectPool<T: Resettable> {
    items: Mutex<Vec<T>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    max_idle: usize,
}

/// A value that can be reset to a clean, reusable state.
pub trait Resettable {
    fn reset(&mut self);
}

impl<T> ObjectPool<T>
where
    T: Resettable + Send + 'static,
{
    /// Creates a pool that builds new items with `factory` and keeps at most
    /// `max_idle` of them around between uses.
    pub fn new<F>(max_idle: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            items: Mutex::new(Vec::with_capacity(max_idle.min(64))),
            factory: Box::new(factory),
            max_idle,
        }
    }

    /// Takes an item from the pool, or builds a new one if empty.
    pub fn get(&self) -> T {
        if let Some(item) = self.items.lock().pop() {
            item
        } else {
            (self.factory)()
        }
    }

    /// Returns an item to the pool after resetting it. Dropped instead of
    /// retained once the pool is at `max_idle`.
    pub fn put(&self, mut item: T) {
        item.reset();
        let mut items = self.items.lock();
        if items.len() < self.max_idle {
            items.push(item);
        }
    }

    /// Number of idle items currently held.
    pub fn idle_len(&self) -> usize {
        self.items.lock().len()
    }
}

impl<K, V> Resettable for std::collections::HashMap<K, V> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T> Resettable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// A guard returned by [`ObjectPool::checkout`] that returns its item to the
/// pool on drop. Prefer this over manual `get`/`put` pairs.
pub struct PooledGuard<T: Resettable + Send + 'static> {
    pool: Arc<ObjectPool<T>>,
    item: Option<T>,
}

impl<T: Resettable + Send + 'static> ObjectPool<T> {
    /// Checks out a guarded item that returns itself to `pool` on drop.
    pub fn checkout(pool: Arc<Self>) -> PooledGuard<T> {
        let item = pool.get();
        PooledGuard {
            pool,
            item: Some(item),
        }
    }
}

impl<T: Resettable + Send + 'static> std::ops::Deref for PooledGuard<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled item taken")
    }
}

impl<T: Resettable + Send + 'static> std::ops::DerefMut for PooledGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled item taken")
    }
}

impl<T: Resettable + Send + 'static> Drop for PooledGuard<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

/// Tracks live/idle worker counts for a goroutine-style pool using atomics
/// only; no per-worker shared state beyond the counters, per the
/// lock-free-hot-path discipline used on the batch worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    active: AtomicUsize,
    spawned: AtomicUsize,
    reaped: AtomicUsize,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_spawn(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_reap(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    pub fn reaped(&self) -> usize {
        self.reaped.load(Ordering::Relaxed)
    }
}
