//! Bridges to the plugin loader's own exports: its log sink, its address repository and its
//! singleton manager.
use address::{HookTarget, Resolver, SingletonLocation};
use shared_dx::error::{HookError, Result};

/// `GetAddress(name, len, &mut result) -> code`, 0 meaning found.  Also the shape of
/// `GetSingleton`.
pub type GetAddressFn = extern "C" fn(name: *const u8, len: usize, result: &mut usize) -> i32;

const LOADER_OK: i32 = 0;

fn lookup(f: Option<GetAddressFn>, what: &str, target: HookTarget) -> Result<usize> {
    let f = f.ok_or_else(|| {
        HookError::ResolutionFailure(format!("no loader {} for {}", what, target))
    })?;
    let name = target.name();
    let mut addr = 0usize;
    let code = f(name.as_ptr(), name.len(), &mut addr);
    if code != LOADER_OK || addr == 0 {
        return Err(HookError::ResolutionFailure(format!(
            "loader {} has nothing for {} (code {})",
            what, target, code
        )));
    }
    Ok(addr)
}

/// Resolves symbolic targets by name through the loader.  Code addresses come from its
/// pattern-scanned repository (`GetAddress`); managed singletons come from its singleton
/// manager (`GetSingleton`), which hands out the object rather than an address in the image.
/// A missing export makes every lookup through it a resolution failure, which just sends a
/// chain on to the next resolver.
pub struct LoaderResolver {
    get_address: Option<GetAddressFn>,
    get_singleton: Option<GetAddressFn>,
}

impl LoaderResolver {
    pub fn new(get_address: Option<GetAddressFn>, get_singleton: Option<GetAddressFn>) -> Self {
        LoaderResolver {
            get_address,
            get_singleton,
        }
    }

    #[cfg(windows)]
    pub fn from_module(module: &str) -> Self {
        let export = |name: &str| match unsafe { win::loader_export(module, name) } {
            Ok(addr) => Some(unsafe { std::mem::transmute::<usize, GetAddressFn>(addr) }),
            Err(e) => {
                log_debug!("loader {} unavailable: {:?}", name, e);
                None
            }
        };
        Self::new(export("GetAddress"), export("GetSingleton"))
    }

    /// The live singleton object named by `target`.
    pub fn singleton(&self, target: HookTarget) -> Result<usize> {
        lookup(self.get_singleton, "singleton manager", target)
    }
}

impl Resolver for LoaderResolver {
    fn resolve(&self, target: HookTarget) -> Result<usize> {
        if target == HookTarget::RenderSingleton {
            // the repository has no such entry, and an object is not the global the table
            // names
            return Err(HookError::ResolutionFailure(format!(
                "{} is a managed singleton",
                target
            )));
        }
        lookup(self.get_address, "address repository", target)
    }
}

/// Find the render singleton: a fixed global from `table` if it has one, otherwise the object
/// from the loader's singleton manager.
pub fn locate_render_singleton(
    table: &dyn Resolver,
    loader: &LoaderResolver,
) -> Result<SingletonLocation> {
    match table.resolve(HookTarget::RenderSingleton) {
        Ok(global) => Ok(SingletonLocation::Global(global)),
        Err(e) => {
            log_debug!("no fixed render singleton ({:?}); asking the loader", e);
            loader
                .singleton(HookTarget::RenderSingleton)
                .map(SingletonLocation::Object)
        }
    }
}

#[cfg(windows)]
pub use win::{install_log_forwarder, loader_export};

#[cfg(windows)]
mod win {
    use std::ffi::CString;

    use winapi::um::libloaderapi::{GetModuleHandleA, GetProcAddress};

    use shared_dx::error::{HookError, Result};
    use shared_dx::util::{set_log_forwarder, LogForwardFn};

    /// Address of `name` exported by the already loaded `module`.
    pub unsafe fn loader_export(module: &str, name: &str) -> Result<usize> {
        let cmodule = CString::new(module)?;
        let handle = GetModuleHandleA(cmodule.as_ptr());
        if handle.is_null() {
            return Err(HookError::LoadLibFailed(format!("{} is not loaded", module)));
        }
        let cname = CString::new(name)?;
        let f = GetProcAddress(handle, cname.as_ptr());
        if f.is_null() {
            return Err(HookError::GetProcAddressFailed(format!("{}!{}", module, name)));
        }
        Ok(f as usize)
    }

    /// Send log output to the loader's `Log` export when there is one.  Returns whether it
    /// was found.
    pub fn install_log_forwarder(module: &str) -> bool {
        match unsafe { loader_export(module, "Log") } {
            Ok(addr) => {
                let f = unsafe { std::mem::transmute::<usize, LogForwardFn>(addr) };
                set_log_forwarder(Some(f));
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use address::AddressTable;

    fn name_of(name: *const u8, len: usize) -> &'static [u8] {
        unsafe { std::slice::from_raw_parts(name, len) }
    }

    extern "C" fn repository(name: *const u8, len: usize, result: &mut usize) -> i32 {
        match name_of(name, len) {
            b"GUITitle:Play" => {
                *result = 0x141EFFDF0;
                0
            }
            b"present" => {
                // found but unset
                *result = 0;
                0
            }
            _ => 2,
        }
    }

    extern "C" fn singletons(name: *const u8, len: usize, result: &mut usize) -> i32 {
        match name_of(name, len) {
            b"sMhRender" => {
                *result = 0x7FF6_1234_0000;
                0
            }
            _ => 2,
        }
    }

    #[test]
    fn test_resolve_through_loader() {
        let r = LoaderResolver::new(Some(repository), Some(singletons));
        assert_eq!(r.resolve(HookTarget::TitleReady).expect("doh"), 0x141EFFDF0);
        assert!(matches!(
            r.resolve(HookTarget::Present),
            Err(HookError::ResolutionFailure(_))
        ));
        assert!(matches!(
            r.resolve(HookTarget::Signal),
            Err(HookError::ResolutionFailure(_))
        ));
        // never through the address repository
        assert!(matches!(
            r.resolve(HookTarget::RenderSingleton),
            Err(HookError::ResolutionFailure(_))
        ));
        assert_eq!(r.singleton(HookTarget::RenderSingleton).expect("doh"), 0x7FF6_1234_0000);
        assert!(r.singleton(HookTarget::TitleReady).is_err());
    }

    #[test]
    fn test_no_exports() {
        let r = LoaderResolver::new(None, None);
        assert!(matches!(
            r.resolve(HookTarget::TitleReady),
            Err(HookError::ResolutionFailure(_))
        ));
        assert!(matches!(
            r.singleton(HookTarget::RenderSingleton),
            Err(HookError::ResolutionFailure(_))
        ));
    }

    #[test]
    fn test_locate_render_singleton() {
        let loader = LoaderResolver::new(Some(repository), Some(singletons));

        let mut table = AddressTable::new();
        table.insert(HookTarget::RenderSingleton, 0x1451C4480);
        assert_eq!(
            locate_render_singleton(&table, &loader).expect("doh"),
            SingletonLocation::Global(0x1451C4480)
        );

        // unknown host build: no table entry, the loader hands out the object
        let empty = AddressTable::new();
        assert_eq!(
            locate_render_singleton(&empty, &loader).expect("doh"),
            SingletonLocation::Object(0x7FF6_1234_0000)
        );

        let no_loader = LoaderResolver::new(Some(repository), None);
        assert!(matches!(
            locate_render_singleton(&empty, &no_loader),
            Err(HookError::ResolutionFailure(_))
        ));
    }
}
