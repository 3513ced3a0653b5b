use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::JoinHandle;

use shared_dx::error::{HookError, Result};

/// One-shot setup work on its own thread, with a completion signal the triggering thread
/// waits on.  Once `wait` returns, everything the task did (hooks installed, queue bound) is
/// visible to the caller.
pub struct SetupTask {
    done: Receiver<Result<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SetupTask {
    pub fn spawn<F>(name: &str, work: F) -> Result<Self>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let (tx, rx) = sync_channel(1);
        let handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let r = work();
                // receiver gone means nobody is waiting; nothing to report to
                let _ = tx.send(r);
            })?;
        Ok(SetupTask {
            done: rx,
            handle: Some(handle),
        })
    }

    /// Block until the task finishes and return its result.
    pub fn wait(mut self) -> Result<()> {
        let r = self.done.recv().unwrap_or_else(|_| {
            Err(HookError::SetupFailed("setup worker exited without a result".to_owned()))
        });
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        r
    }
}
