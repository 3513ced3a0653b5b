use fnv::FnvHashMap;

use address::{HookTarget, Resolver};
use shared_dx::error::{HookError, Result};

use crate::installer::{CallThrough, CodePatcher, HookInstaller, HookRecord};

/// Hooks keyed by what they are rather than where they are.  A target is resolved once, on its
/// first successful install.
pub struct HookSites<P: CodePatcher> {
    installer: HookInstaller<P>,
    sites: FnvHashMap<HookTarget, HookRecord>,
}

impl<P: CodePatcher> HookSites<P> {
    pub fn new(patcher: P) -> Self {
        HookSites {
            installer: HookInstaller::new(patcher),
            sites: FnvHashMap::default(),
        }
    }

    /// Resolve `target` and hook it, publishing its trampoline to `call_through`.  Already
    /// installed sites are returned as is.
    pub unsafe fn install_site(
        &mut self,
        resolver: &dyn Resolver,
        target: HookTarget,
        replacement: usize,
        call_through: &CallThrough,
    ) -> Result<HookRecord> {
        if let Some(rec) = self.sites.get(&target) {
            return Ok(*rec);
        }
        let addr = resolver.resolve(target).map_err(|e| {
            log_error!("can't resolve hook target {}: {:?}", target, e);
            e
        })?;
        let rec = self.installer.install(addr, replacement, call_through).map_err(|e| {
            log_error!("can't hook {} at {:x}: {:?}", target, addr, e);
            e
        })?;
        self.sites.insert(target, rec);
        Ok(rec)
    }

    pub unsafe fn disable_site(&mut self, target: HookTarget) -> Result<()> {
        let addr = self
            .sites
            .get(&target)
            .map(|r| r.target)
            .ok_or_else(|| HookError::BadStateError(format!("{} is not hooked", target)))?;
        let rec = self.installer.disable(addr)?;
        self.sites.insert(target, rec);
        log_debug!("disabled hook {}", target);
        Ok(())
    }

    pub fn site(&self, target: HookTarget) -> Option<HookRecord> {
        self.sites.get(&target).copied()
    }

    pub fn installer(&self) -> &HookInstaller<P> {
        &self.installer
    }
}
