//! In-process per-product mutual exclusion.
//!
//! A batch locks every distinct product it touches, always in ascending product-id order,
//! so two batches over overlapping products can never deadlock. Waiting is bounded: a
//! lock that cannot be taken before the deadline fails the acquisition and releases
//! whatever was already held.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use lotkeeper_core::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("timed out after {waited_ms}ms waiting for product lock {product_id}")]
    Timeout { product_id: ProductId, waited_ms: u128 },

    #[error("product lock poisoned: {0}")]
    Poisoned(String),
}

/// One product's lock, backed by `Mutex<bool>` + `Condvar`.
#[derive(Debug, Default)]
struct ProductLock {
    state: Mutex<bool>,
    wake: Condvar,
}

impl ProductLock {
    /// Returns `Ok(false)` if the deadline passed before the lock was free.
    fn lock_until(&self, deadline: Instant) -> Result<bool, LockError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        while *locked {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let (guard, _) = self
                .wake
                .wait_timeout(locked, deadline - now)
                .map_err(|e| LockError::Poisoned(e.to_string()))?;
            locked = guard;
        }
        *locked = true;
        Ok(true)
    }

    fn unlock(&self) {
        if let Ok(mut locked) = self.state.lock() {
            *locked = false;
            self.wake.notify_one();
        }
    }
}

/// Registry of per-product locks, created lazily and shared by every engine that mutates
/// the same lot store.
#[derive(Debug, Default)]
pub struct ProductLocks {
    locks: Mutex<HashMap<ProductId, Arc<ProductLock>>>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_lock(&self, product_id: &ProductId) -> Result<Arc<ProductLock>, LockError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LockError::Poisoned("product lock registry poisoned".into()))?;
        Ok(locks.entry(product_id.clone()).or_default().clone())
    }

    /// Lock every product in `products` (duplicates allowed), waiting at most `timeout`
    /// in total. Locks are released when the returned guard is dropped.
    pub fn acquire_all(&self, products: &[ProductId], timeout: Duration) -> Result<ProductLockGuard, LockError> {
        let mut ordered: Vec<&ProductId> = products.iter().collect();
        ordered.sort();
        ordered.dedup();

        let started = Instant::now();
        let deadline = started + timeout;
        let mut guard = ProductLockGuard { held: Vec::with_capacity(ordered.len()) };

        for product_id in ordered {
            let lock = self.get_lock(product_id)?;
            if !lock.lock_until(deadline)? {
                // `guard` drops here and releases what was already taken.
                return Err(LockError::Timeout {
                    product_id: product_id.clone(),
                    waited_ms: started.elapsed().as_millis(),
                });
            }
            guard.held.push(lock);
        }

        Ok(guard)
    }
}

/// Holds a set of product locks; releases them in reverse acquisition order on drop.
#[derive(Debug)]
pub struct ProductLockGuard {
    held: Vec<Arc<ProductLock>>,
}

impl Drop for ProductLockGuard {
    fn drop(&mut self) {
        for lock in self.held.iter().rev() {
            lock.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    fn products(ids: &[&str]) -> Vec<ProductId> {
        ids.iter().map(|id| ProductId::parse(id).unwrap()).collect()
    }

    #[test]
    fn duplicates_are_locked_once() {
        let locks = ProductLocks::new();
        // A second wait on "B" would time out against ourselves.
        let guard = locks
            .acquire_all(&products(&["B", "A", "B"]), Duration::from_millis(50))
            .unwrap();
        drop(guard);

        assert!(locks.acquire_all(&products(&["A", "B"]), Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn held_lock_times_out_then_frees_on_drop() {
        let locks = ProductLocks::new();
        let guard = locks.acquire_all(&products(&["A"]), Duration::from_millis(50)).unwrap();

        let err = locks
            .acquire_all(&products(&["B", "A"]), Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout { ref product_id, .. } if product_id.as_str() == "A"));

        // The partially acquired "B" must have been released.
        assert!(locks.acquire_all(&products(&["B"]), Duration::from_millis(20)).is_ok());

        drop(guard);
        assert!(locks.acquire_all(&products(&["A"]), Duration::from_millis(20)).is_ok());
    }

    #[test]
    fn overlapping_batches_are_serialized() {
        let locks = Arc::new(ProductLocks::new());
        let inside = Arc::new(AtomicU32::new(0));
        let max_inside = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                // Alternate the order callers list products in.
                let ids = if i % 2 == 0 { ["A", "B"] } else { ["B", "A"] };
                thread::spawn(move || {
                    let _guard = locks.acquire_all(&products(&ids), Duration::from_secs(5)).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
