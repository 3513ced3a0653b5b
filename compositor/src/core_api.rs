//! The loader's name-keyed function exchange, as handed to `CoreInitialize`.
use std::ffi::c_void;

use shared_dx::error::{HookError, Result};

pub type AddCoreFunctionFn = extern "C" fn(name: *const u8, len: u32, func: *const c_void);
pub type GetCoreFunctionFn = extern "C" fn(name: *const u8, len: u32) -> *const c_void;

#[repr(C)]
pub struct CoreApiParam {
    pub add_core_function: *const c_void,
    pub get_core_function: *const c_void,
}

impl CoreApiParam {
    fn add_fn(&self) -> Result<AddCoreFunctionFn> {
        if self.add_core_function.is_null() {
            return Err(HookError::BadStateError("loader gave no add_core_function".to_owned()));
        }
        Ok(unsafe { std::mem::transmute::<*const c_void, AddCoreFunctionFn>(self.add_core_function) })
    }

    fn get_fn(&self) -> Result<GetCoreFunctionFn> {
        if self.get_core_function.is_null() {
            return Err(HookError::BadStateError("loader gave no get_core_function".to_owned()));
        }
        Ok(unsafe { std::mem::transmute::<*const c_void, GetCoreFunctionFn>(self.get_core_function) })
    }

    /// Publish `method` under `name` for other modules.
    pub fn add_method(&self, name: &str, method: *const c_void) -> Result<()> {
        let add = self.add_fn()?;
        add(name.as_ptr(), name.len() as u32, method);
        log_debug!("registered core method {}", name);
        Ok(())
    }

    /// Look up a method another module registered.  `None` if nobody has.
    pub fn get_method(&self, name: &str) -> Result<Option<*const c_void>> {
        let get = self.get_fn()?;
        let f = get(name.as_ptr(), name.len() as u32);
        Ok(if f.is_null() { None } else { Some(f) })
    }
}

/// Loader version this module was built against.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

pub const LOADER_VERSION: Version = Version {
    major: 1,
    minor: 0,
    patch: 0,
};

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    lazy_static::lazy_static! {
        static ref REGISTRY: Mutex<HashMap<String, usize>> = Mutex::new(HashMap::new());
    }

    fn name_of(name: *const u8, len: u32) -> String {
        let s = unsafe { std::slice::from_raw_parts(name, len as usize) };
        String::from_utf8_lossy(s).into_owned()
    }

    extern "C" fn add(name: *const u8, len: u32, func: *const c_void) {
        REGISTRY.lock().expect("doh").insert(name_of(name, len), func as usize);
    }

    extern "C" fn get(name: *const u8, len: u32) -> *const c_void {
        REGISTRY
            .lock()
            .expect("doh")
            .get(&name_of(name, len))
            .map(|f| *f as *const c_void)
            .unwrap_or(std::ptr::null())
    }

    extern "C" fn render_stub() -> *mut c_void {
        std::ptr::null_mut()
    }

    #[test]
    fn test_method_exchange() {
        let param = CoreApiParam {
            add_core_function: add as *const c_void,
            get_core_function: get as *const c_void,
        };
        assert_eq!(param.get_method("Test::missing").expect("doh"), None);
        param
            .add_method("Test::core_imgui_render", render_stub as *const c_void)
            .expect("doh");
        let f = param
            .get_method("Test::core_imgui_render")
            .expect("doh")
            .expect("doh");
        assert_eq!(f, render_stub as *const c_void);
    }

    #[test]
    fn test_null_loader_functions() {
        let param = CoreApiParam {
            add_core_function: std::ptr::null(),
            get_core_function: std::ptr::null(),
        };
        assert!(param.get_method("x").is_err());
        assert!(param.add_method("x", std::ptr::null()).is_err());
    }

    #[test]
    fn test_version() {
        assert_eq!(LOADER_VERSION.to_string(), "1.0.0");
    }
}
