use fnv::FnvHashMap;

use shared_dx::error::{HookError, Result};

use crate::target::HookTarget;

pub trait Resolver {
    /// Address of `target`, or `ResolutionFailure`.  Never returns 0.
    fn resolve(&self, target: HookTarget) -> Result<usize>;
}

/// Fixed addresses for one host binary version.
#[derive(Clone, Debug, Default)]
pub struct AddressTable {
    entries: FnvHashMap<HookTarget, usize>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `name → address` pairs.  Unknown names are logged and skipped; they usually
    /// mean the config was written for a different build.
    pub fn from_named<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut t = Self::new();
        for (name, addr) in pairs {
            match HookTarget::from_name(name) {
                Some(target) => t.insert(target, addr),
                None => log_warn!("address table: ignoring unknown target '{}'", name),
            }
        }
        t
    }

    pub fn insert(&mut self, target: HookTarget, addr: usize) {
        self.entries.insert(target, addr);
    }

    /// Entries in `other` replace ours.
    pub fn merge(&mut self, other: &AddressTable) {
        for (target, addr) in other.entries.iter() {
            self.entries.insert(*target, *addr);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resolver for AddressTable {
    fn resolve(&self, target: HookTarget) -> Result<usize> {
        match self.entries.get(&target) {
            Some(&addr) if addr != 0 => Ok(addr),
            _ => Err(HookError::ResolutionFailure(format!(
                "no address for {}",
                target
            ))),
        }
    }
}

/// Resolves COM methods by reading the vtable of a live object.
#[derive(Debug, Default)]
pub struct VtableResolver {
    objects: FnvHashMap<HookTarget, usize>,
}

impl VtableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `target` through `object`.  `object` must point at a live COM object of the
    /// interface `target` belongs to, and stay alive while this resolver is used.
    pub unsafe fn bind(&mut self, target: HookTarget, object: usize) {
        self.objects.insert(target, object);
    }
}

impl Resolver for VtableResolver {
    fn resolve(&self, target: HookTarget) -> Result<usize> {
        let slot = target.vtable_slot().ok_or_else(|| {
            HookError::ResolutionFailure(format!("{} is not a vtable method", target))
        })?;
        let object = match self.objects.get(&target) {
            Some(&o) if o != 0 => o,
            _ => {
                return Err(HookError::ResolutionFailure(format!(
                    "no object bound for {}",
                    target
                )))
            }
        };
        let addr = unsafe {
            let vtbl = *(object as *const *const usize);
            if vtbl.is_null() {
                return Err(HookError::ResolutionFailure(format!(
                    "null vtable for {}",
                    target
                )));
            }
            *vtbl.add(slot)
        };
        if addr == 0 {
            return Err(HookError::ResolutionFailure(format!(
                "null vtable entry {} for {}",
                slot, target
            )));
        }
        Ok(addr)
    }
}

/// First resolver that succeeds wins.  Fixed table entries are usually listed first so a
/// config can pin an address the vtable would otherwise supply.
pub struct ResolverChain<'a> {
    resolvers: Vec<&'a dyn Resolver>,
}

impl<'a> ResolverChain<'a> {
    pub fn new() -> Self {
        ResolverChain {
            resolvers: Vec::new(),
        }
    }

    pub fn with(mut self, r: &'a dyn Resolver) -> Self {
        self.resolvers.push(r);
        self
    }
}

impl<'a> Default for ResolverChain<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Resolver for ResolverChain<'a> {
    fn resolve(&self, target: HookTarget) -> Result<usize> {
        let mut last = None;
        for r in self.resolvers.iter() {
            match r.resolve(target) {
                Ok(addr) => return Ok(addr),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            HookError::ResolutionFailure(format!("no resolvers for {}", target))
        }))
    }
}
