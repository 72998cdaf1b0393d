//! Reference-counted ownership of a shared hardware resource.
//!
//! The opening owner holds the implicit count of zero. Every in-flight consumer takes a
//! [`Lease`] through [`ResourceGuard::retain`]. The resource is finalized exactly once, when the
//! count drops below zero, so whichever holder finishes last tears it down.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Teardown hook of a guarded resource.
pub trait Finalize {
    fn finalize(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    Active(i64),
    Finalized,
}

pub struct ResourceGuard<T: Finalize> {
    resource: T,
    state: Mutex<GuardState>,
}

impl<T: Finalize> ResourceGuard<T> {
    pub fn new(resource: T) -> Arc<Self> {
        Arc::new(Self {
            resource,
            state: Mutex::new(GuardState::Active(0)),
        })
    }

    /// Takes a token on the resource, or `None` once it has been finalized.
    pub fn retain(self: &Arc<Self>) -> Option<Lease<T>> {
        let mut state = self.state.lock();
        match *state {
            GuardState::Active(count) => {
                *state = GuardState::Active(count + 1);
                Some(Lease {
                    guard: Arc::clone(self),
                })
            }
            GuardState::Finalized => None,
        }
    }

    /// Gives back one token. Crossing below zero finalizes the resource.
    ///
    /// Releasing a finalized guard is a no-op.
    pub fn release(&self) {
        let finalize = {
            let mut state = self.state.lock();
            match *state {
                GuardState::Active(count) if count > 0 => {
                    *state = GuardState::Active(count - 1);
                    false
                }
                GuardState::Active(_) => {
                    *state = GuardState::Finalized;
                    true
                }
                GuardState::Finalized => {
                    warn!("Release on a finalized resource guard ignored");
                    false
                }
            }
        };

        if finalize {
            debug!("Resource guard count went negative, finalizing");
            self.resource.finalize();
        }
    }

    /// The wrapped resource, without taking a token.
    pub fn get(&self) -> &T {
        &self.resource
    }

    pub fn is_finalized(&self) -> bool {
        *self.state.lock() == GuardState::Finalized
    }

    /// Outstanding tokens beyond the owner's, `None` once finalized.
    pub fn ref_count(&self) -> Option<i64> {
        match *self.state.lock() {
            GuardState::Active(count) => Some(count),
            GuardState::Finalized => None,
        }
    }
}

/// A retained token. Dropping it releases the token.
pub struct Lease<T: Finalize> {
    guard: Arc<ResourceGuard<T>>,
}

impl<T: Finalize> Lease<T> {
    pub fn release(self) {
        drop(self);
    }
}

impl<T: Finalize> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard.resource
    }
}

impl<T: Finalize> Drop for Lease<T> {
    fn drop(&mut self) {
        self.guard.release();
    }
}

impl<T: Finalize> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("ref_count", &self.guard.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct CountingResource {
        finalized: AtomicUsize,
    }

    impl Finalize for CountingResource {
        fn finalize(&self) {
            self.finalized.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Finalize for Arc<CountingResource> {
        fn finalize(&self) {
            self.as_ref().finalize();
        }
    }

    #[test]
    fn test_owner_release_finalizes_idle_guard() {
        let guard = ResourceGuard::new(CountingResource::default());
        assert_eq!(guard.ref_count(), Some(0));

        guard.release();
        assert!(guard.is_finalized());
        assert_eq!(guard.resource.finalized.load(Ordering::SeqCst), 1);
        assert!(guard.retain().is_none());
    }

    #[test]
    fn test_last_lease_finalizes_after_owner_release() {
        let guard = ResourceGuard::new(CountingResource::default());
        let first = guard.retain().unwrap();
        let second = guard.retain().unwrap();

        guard.release();
        assert!(!guard.is_finalized());

        drop(first);
        assert_eq!(guard.ref_count(), Some(0));
        assert_eq!(second.finalized.load(Ordering::SeqCst), 0);

        second.release();
        assert!(guard.is_finalized());
        assert_eq!(guard.resource.finalized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finalized_is_terminal() {
        let guard = ResourceGuard::new(CountingResource::default());
        guard.release();
        guard.release();
        guard.release();

        assert!(guard.retain().is_none());
        assert_eq!(guard.resource.finalized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_random_interleavings_finalize_once() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let guard = ResourceGuard::new(CountingResource::default());
            let mut leases = Vec::new();
            let mut owner_released = false;
            let retains = rng.random_range(0..12);

            for _ in 0..retains {
                leases.push(guard.retain().unwrap());
                // Once the owner is gone the last lease must survive the loop
                let droppable = if owner_released { leases.len() > 1 } else { true };
                if droppable && rng.random_bool(0.4) {
                    let index = rng.random_range(0..leases.len());
                    drop(leases.swap_remove(index));
                }
                if !owner_released && !leases.is_empty() && rng.random_bool(0.1) {
                    guard.release();
                    owner_released = true;
                }
            }

            while !leases.is_empty() {
                assert_eq!(guard.resource.finalized.load(Ordering::SeqCst), 0);
                let index = rng.random_range(0..leases.len());
                drop(leases.swap_remove(index));
            }

            if !owner_released {
                assert_eq!(guard.resource.finalized.load(Ordering::SeqCst), 0);
                guard.release();
            }
            assert_eq!(guard.resource.finalized.load(Ordering::SeqCst), 1);
            assert!(guard.retain().is_none());
        }
    }

    #[test]
    fn test_concurrent_retain_release_finalizes_once() {
        let resource = Arc::new(CountingResource::default());
        let guard = ResourceGuard::new(Arc::clone(&resource));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(lease) = guard.retain() {
                            thread::yield_now();
                            drop(lease);
                        }
                    }
                })
            })
            .collect();

        guard.release();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(guard.is_finalized());
        assert_eq!(resource.finalized.load(Ordering::SeqCst), 1);
    }
}
