use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

fn current_token() -> u64 {
    THREAD_TOKEN.with(|t| *t)
}

/// Set while a present call is composing.  Separate from `PresentState`: this one says
/// "somebody is inside the composition body right now" and remembers which thread, so a resize
/// issued from inside composition can be told apart from one on another thread.
pub struct ReentrancyGuard {
    owner: AtomicU64,
}

/// Clears the guard on drop.
pub struct GuardScope<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyGuard {
    pub const fn new() -> Self {
        ReentrancyGuard {
            owner: AtomicU64::new(0),
        }
    }

    /// Take the guard, or `None` if any thread (including this one) already holds it.
    pub fn enter(&self) -> Option<GuardScope> {
        self.owner
            .compare_exchange(0, current_token(), Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardScope { guard: self })
    }

    pub fn is_set(&self) -> bool {
        self.owner.load(Ordering::Acquire) != 0
    }

    pub fn held_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Acquire) == current_token()
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Drop for GuardScope<'a> {
    fn drop(&mut self) {
        self.guard.owner.store(0, Ordering::Release);
    }
}
