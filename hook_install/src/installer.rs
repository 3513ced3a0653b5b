use std::sync::atomic::{AtomicUsize, Ordering};

use fnv::FnvHashMap;

use shared_dx::error::{HookError, Result};

/// One patched function.  `trampoline` runs the original, unpatched code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HookRecord {
    pub target: usize,
    pub trampoline: usize,
    pub installed: bool,
    /// Installed hooks can be switched off without being removed.
    pub enabled: bool,
}

/// Rewrites code at a function entry.  The installer only talks to this, so the bookkeeping is
/// testable without patching anything.
pub trait CodePatcher {
    /// Prepare a redirect of `target` to `replacement`, left disabled, and return a trampoline
    /// to the original code.
    unsafe fn patch(&mut self, target: usize, replacement: usize) -> Result<usize>;
    unsafe fn set_enabled(&mut self, target: usize, enabled: bool) -> Result<()>;
    unsafe fn unpatch(&mut self, target: usize) -> Result<()>;
}

pub struct HookInstaller<P: CodePatcher> {
    patcher: P,
    records: FnvHashMap<usize, HookRecord>,
}

impl<P: CodePatcher> HookInstaller<P> {
    pub fn new(patcher: P) -> Self {
        HookInstaller {
            patcher,
            records: FnvHashMap::default(),
        }
    }

    /// Patch `target` to jump to `replacement`.  The trampoline is published to `call_through`
    /// before the patch is enabled, so the replacement can always reach the original.
    /// Installing over an already hooked target does nothing and returns the existing record.
    ///
    /// The caller guarantees `target` is executable code with an entry the patcher can
    /// relocate, and `replacement` has the same signature.
    pub unsafe fn install(
        &mut self,
        target: usize,
        replacement: usize,
        call_through: &CallThrough,
    ) -> Result<HookRecord> {
        if target == 0 {
            return Err(HookError::ResolutionFailure(
                "cannot hook a null address".to_owned(),
            ));
        }
        if let Some(rec) = self.records.get(&target) {
            log_debug!("hook at {:x} already installed", target);
            return Ok(*rec);
        }
        let trampoline = self.patcher.patch(target, replacement)?;
        let rec = HookRecord {
            target,
            trampoline,
            installed: true,
            enabled: true,
        };
        call_through.set(&rec);
        if let Err(e) = self.patcher.set_enabled(target, true) {
            // never enabled, so nothing is running through it
            call_through.clear();
            if let Err(ue) = self.patcher.unpatch(target) {
                log_error!("can't remove unenabled patch at {:x}: {:?}", target, ue);
            }
            return Err(e);
        }
        self.records.insert(target, rec);
        log_info!(
            "hooked {:x} -> {:x} (original at {:x})",
            target,
            replacement,
            trampoline
        );
        Ok(rec)
    }

    /// Stop redirecting `target` but keep the patch, so the trampoline stays valid for any
    /// thread still running through it.
    pub unsafe fn disable(&mut self, target: usize) -> Result<HookRecord> {
        let rec = self
            .records
            .get_mut(&target)
            .ok_or_else(|| HookError::BadStateError(format!("no hook at {:x}", target)))?;
        if rec.enabled {
            self.patcher.set_enabled(target, false)?;
            rec.enabled = false;
        }
        Ok(*rec)
    }

    /// Remove the patch.  Nothing on a failure path calls this: once a hook is in, it stays in
    /// for the life of the process.
    pub unsafe fn uninstall(&mut self, target: usize) -> Result<()> {
        if self.records.contains_key(&target) {
            self.patcher.unpatch(target)?;
            self.records.remove(&target);
        }
        Ok(())
    }

    pub fn record(&self, target: usize) -> Option<HookRecord> {
        self.records.get(&target).copied()
    }

    pub fn installed_count(&self) -> usize {
        self.records.len()
    }

    pub fn patcher(&self) -> &P {
        &self.patcher
    }
}

/// Trampoline slot read by a hook body to call the original function.  Written once when the
/// hook goes in; the body may run on any thread from then on.
pub struct CallThrough(AtomicUsize);

impl CallThrough {
    pub const fn new() -> Self {
        CallThrough(AtomicUsize::new(0))
    }

    pub fn set(&self, rec: &HookRecord) {
        self.0.store(rec.trampoline, Ordering::Release);
    }

    /// Drop a trampoline whose patch was removed.
    pub fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn get(&self) -> Option<usize> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            addr => Some(addr),
        }
    }

    /// The trampoline as a typed function pointer.  `F` must be the `extern` fn type of the
    /// hooked function.
    pub unsafe fn as_fn<F: Copy>(&self) -> Option<F> {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());
        self.get().map(|addr| std::mem::transmute_copy::<usize, F>(&addr))
    }
}

impl Default for CallThrough {
    fn default() -> Self {
        Self::new()
    }
}
