//! Entry points the plugin loader calls.
use std::ffi::OsString;
use std::os::windows::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use winapi::ctypes::c_void;
use winapi::shared::minwindef::DWORD;
use winapi::um::libloaderapi::GetModuleFileNameW;

use address::ResolverChain;
use compositor::{CoreApiParam, Version, LOADER_VERSION};
use overlay_conf::OverlayConfig;
use shared_dx::error::{HookError, Result};
use shared_dx::util::{set_log_file_path, set_log_level, write_log_file};

use crate::hooks;
use crate::loader::{install_log_forwarder, LoaderResolver};
use crate::runtime;

const ALLOCATE_TEXTURE_SLOT: &str = "Render::allocate_texture_slot";
const FREE_TEXTURE_SLOT: &str = "Render::free_texture_slot";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// A shader-visible descriptor slot as handed to other modules.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct TextureSlot {
    pub index: u32,
    pub cpu: usize,
    pub gpu: u64,
}

/// `bool allocate_texture_slot(TextureSlot*)`.  False while the overlay isn't ready or the heap
/// is full.
extern "C" fn allocate_texture_slot(out: Option<&mut TextureSlot>) -> bool {
    let out = match out {
        Some(o) => o,
        None => return false,
    };
    let slot = runtime::context().and_then(|ctx| ctx.allocate_texture_slot());
    match slot {
        Some(s) => {
            *out = TextureSlot {
                index: s.index,
                cpu: s.cpu.ptr,
                gpu: s.gpu.ptr,
            };
            true
        }
        None => false,
    }
}

extern "C" fn free_texture_slot(index: u32) {
    if let Some(ctx) = runtime::context() {
        ctx.free_texture_slot(index);
    }
}

/// Directory of the host executable.
fn host_dir() -> Result<String> {
    let mut buf: Vec<u16> = vec![0; 32768];
    let len = unsafe {
        GetModuleFileNameW(std::ptr::null_mut(), buf.as_mut_ptr(), buf.len() as DWORD)
    };
    if len == 0 {
        return Err(HookError::WinApiError("GetModuleFileNameW failed".to_owned()));
    }
    let path = OsString::from_wide(&buf[..len as usize]);
    let pb = PathBuf::from(path);
    let dir = pb
        .parent()
        .ok_or_else(|| HookError::ConfReadFailed(format!("no parent dir for {:?}", pb)))?;
    dir.to_str()
        .map(|s| s.to_owned())
        .ok_or_else(|| HookError::ConfReadFailed(format!("non-unicode path {:?}", dir)))
}

fn load_config() -> OverlayConfig {
    let root = host_dir().unwrap_or_else(|e| {
        write_log_file(&format!("can't find host dir, using cwd: {:?}", e));
        ".".to_owned()
    });
    OverlayConfig::load(&root).unwrap_or_else(|e| {
        write_log_file(&format!("error reading overlay config, using defaults: {:?}", e));
        OverlayConfig::new()
    })
}

fn init_log(conf: &OverlayConfig) {
    set_log_level(conf.log_level());
    if let Some(file) = conf.log_file.as_ref() {
        let pb = PathBuf::from(file);
        let dir = pb.parent().map(|d| d.to_string_lossy().into_owned());
        let name = pb.file_name().map(|n| n.to_string_lossy().into_owned());
        match (dir, name) {
            (Some(dir), Some(name)) => {
                if let Err(e) = set_log_file_path(&dir, &name) {
                    write_log_file(&format!("error setting log file {}: {:?}", file, e));
                }
            }
            _ => write_log_file(&format!("ignoring bad log file path: {}", file)),
        }
    }
    if install_log_forwarder(&conf.loader_module) {
        log_debug!("logging through {}", conf.loader_module);
    }
}

fn initialize(conf: OverlayConfig) -> Result<()> {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        log_debug!("already initialized");
        return Ok(());
    }
    init_log(&conf);
    log_info!("OverlayCore (built {}) initializing", env!("OVERLAY_BUILD_DATE"));
    log_debug!("{}", conf);

    runtime::create_context(&conf)?;
    let table = conf.address_table();
    let loader = LoaderResolver::from_module(&conf.loader_module);
    runtime::set_config(conf)?;

    let chain = ResolverChain::new().with(&table).with(&loader);
    unsafe { hooks::install_title_hook(&chain) }
}

fn status(r: Result<()>) -> i32 {
    match r {
        Ok(()) => 0,
        Err(e) => {
            log_error!("overlay initialization failed: {:?}", e);
            1
        }
    }
}

#[no_mangle]
pub extern "C" fn LoaderVersion(version: Option<&mut Version>) {
    if let Some(v) = version {
        *v = LOADER_VERSION;
    }
}

/// Exchange methods with the loader, then initialize.  Returns 1 if the renderer hasn't
/// registered its per-frame function.
#[no_mangle]
pub extern "C" fn CoreInitialize(param: Option<&CoreApiParam>) -> i32 {
    let param = match param {
        Some(p) => p,
        None => {
            write_log_file("CoreInitialize: no core api");
            return 1;
        }
    };
    let conf = load_config();
    let method = conf.renderer_method.clone();
    match param.get_method(&method) {
        Ok(Some(f)) => runtime::RENDERER.set(f as *const c_void),
        Ok(None) => {
            write_log_file(&format!("CoreInitialize: {} is not registered", method));
            return 1;
        }
        Err(e) => {
            write_log_file(&format!("CoreInitialize: {:?}", e));
            return 1;
        }
    }

    let exported: [(&str, *const c_void); 2] = [
        (ALLOCATE_TEXTURE_SLOT, allocate_texture_slot as *const c_void),
        (FREE_TEXTURE_SLOT, free_texture_slot as *const c_void),
    ];
    for (name, f) in exported.iter() {
        if let Err(e) = param.add_method(name, *f) {
            write_log_file(&format!("CoreInitialize: can't register {}: {:?}", name, e));
        }
    }

    status(initialize(conf))
}

#[no_mangle]
pub extern "C" fn Initialize() -> i32 {
    status(initialize(load_config()))
}

/// Stops compositing.  Hooks stay in and keep calling through, so the module can't be
/// unloaded; the non-zero result tells the loader so.
#[no_mangle]
pub extern "C" fn Uninitialize() -> i32 {
    if let Some(ctx) = runtime::context() {
        ctx.shutdown();
        log_info!("overlay shut down");
    }
    1
}
