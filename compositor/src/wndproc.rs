use std::sync::atomic::{AtomicUsize, Ordering};

use shared_dx::error::Result;
use shared_dx::gpu::WindowApi;
use shared_dx::types::WindowHandle;

/// Subclasses the host window.  The replacement reads `previous()` on every message without
/// any lock, so it's kept in an atomic.
pub struct WndProcInterceptor {
    replacement: usize,
    previous: AtomicUsize,
    window: AtomicUsize,
}

impl WndProcInterceptor {
    pub fn new(replacement: usize) -> Self {
        WndProcInterceptor {
            replacement,
            previous: AtomicUsize::new(0),
            window: AtomicUsize::new(0),
        }
    }

    /// Install the replacement on `window`.  Returns `false` without touching the window if
    /// the replacement is already installed there.
    pub fn attach<W: WindowApi>(&self, windows: &W, window: WindowHandle) -> Result<bool> {
        let current = windows.window_proc(window);
        if current == self.replacement {
            return Ok(false);
        }
        // messages can arrive as soon as the replacement is in, so `previous` must be valid
        // before it is
        self.previous.store(current, Ordering::Release);
        let prev = windows.set_window_proc(window, self.replacement)?;
        self.previous.store(prev, Ordering::Release);
        self.window.store(window.0, Ordering::Release);
        log_debug!(
            "window proc on {:x} replaced ({:x} -> {:x})",
            window.0,
            prev,
            self.replacement
        );
        Ok(true)
    }

    /// The procedure the replacement forwards to; 0 before the first attach.
    pub fn previous(&self) -> usize {
        self.previous.load(Ordering::Acquire)
    }

    pub fn replacement(&self) -> usize {
        self.replacement
    }

    pub fn window(&self) -> WindowHandle {
        WindowHandle(self.window.load(Ordering::Acquire))
    }
}
