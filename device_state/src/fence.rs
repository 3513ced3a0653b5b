use std::sync::{Mutex, MutexGuard};

/// Latest fence the host signaled on the bound queue.
#[derive(Clone, Debug, PartialEq)]
pub struct FenceRecord<F> {
    pub fence: Option<F>,
    pub value: u64,
}

impl<F> Default for FenceRecord<F> {
    fn default() -> Self {
        FenceRecord {
            fence: None,
            value: 0,
        }
    }
}

/// Observes the host's queue signals.  Called from whatever thread signals, so it locks
/// internally and never touches compositor state.
pub struct FenceTracker<Q, F> {
    bound: Mutex<Option<Q>>,
    record: Mutex<FenceRecord<F>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<T> {
    m.lock().unwrap_or_else(|e| {
        log_warn!("fence tracker lock was poisoned");
        e.into_inner()
    })
}

impl<Q: Clone, F: Clone> FenceTracker<Q, F> {
    pub fn new() -> Self {
        FenceTracker {
            bound: Mutex::new(None),
            record: Mutex::new(FenceRecord::default()),
        }
    }

    /// Track signals on `queue` from now on.  The binding outlives resizes.
    pub fn bind(&self, queue: Q) {
        *lock(&self.bound) = Some(queue);
    }

    pub fn bound_queue(&self) -> Option<Q> {
        lock(&self.bound).clone()
    }

    /// Record `(fence, value)` if `queue` is the bound queue.  `fence` is only called on a
    /// match.  Returns whether anything was recorded.
    pub fn on_signal<K: ?Sized>(
        &self,
        queue: &K,
        value: u64,
        fence: impl FnOnce() -> Option<F>,
    ) -> bool
    where
        Q: PartialEq<K>,
    {
        let is_bound = match lock(&self.bound).as_ref() {
            Some(q) => q == queue,
            None => false,
        };
        if !is_bound {
            return false;
        }
        let mut rec = lock(&self.record);
        rec.fence = fence();
        rec.value = value;
        true
    }

    pub fn record(&self) -> FenceRecord<F> {
        lock(&self.record).clone()
    }

    /// Forget the last signal.  The queue binding stays.
    pub fn reset(&self) {
        *lock(&self.record) = FenceRecord::default();
    }
}

impl<Q: Clone, F: Clone> Default for FenceTracker<Q, F> {
    fn default() -> Self {
        Self::new()
    }
}
