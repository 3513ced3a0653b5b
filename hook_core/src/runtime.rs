//! Process-wide state.  Hook bodies and the window procedure reach the overlay only through
//! `context()`; everything else here is touched from the loader entry points and setup.
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use compositor::OverlayContext;
use hook_install::{HookSites, MinHookPatcher};
use overlay_conf::OverlayConfig;
use shared_dx::error::{HookError, Result};

use crate::d3d12::D3d12Api;
use crate::imgui_overlay::{ImguiOverlay, RendererSlot};
use crate::window::{overlay_wndproc, Win32Windows};

pub type OverlayCtx = OverlayContext<D3d12Api, Win32Windows, ImguiOverlay>;

/// The external renderer's per-frame function.
pub static RENDERER: RendererSlot = RendererSlot::new();

lazy_static! {
    static ref CONTEXT: RwLock<Option<Arc<OverlayCtx>>> = RwLock::new(None);
    static ref CONFIG: RwLock<OverlayConfig> = RwLock::new(OverlayConfig::new());
    static ref SITES: Mutex<HookSites<MinHookPatcher>> =
        Mutex::new(HookSites::new(MinHookPatcher));
}

pub fn context() -> Option<Arc<OverlayCtx>> {
    match CONTEXT.read() {
        Ok(c) => c.clone(),
        Err(_) => None,
    }
}

/// Create the context on first call; later calls return the existing one.
pub fn create_context(conf: &OverlayConfig) -> Result<Arc<OverlayCtx>> {
    let mut lock = CONTEXT.write().map_err(|_err| HookError::GlobalLockError)?;
    if let Some(ctx) = lock.as_ref() {
        return Ok(ctx.clone());
    }
    let ctx = Arc::new(OverlayContext::new(
        D3d12Api,
        Win32Windows,
        ImguiOverlay::new(&RENDERER),
        conf.descriptor_heap_size,
        overlay_wndproc as usize,
    ));
    log_debug!("created overlay context ({} srv slots)", conf.descriptor_heap_size);
    *lock = Some(ctx.clone());
    Ok(ctx)
}

pub fn set_config(conf: OverlayConfig) -> Result<()> {
    let mut lock = CONFIG.write().map_err(|_err| HookError::GlobalLockError)?;
    *lock = conf;
    Ok(())
}

pub fn config() -> Result<OverlayConfig> {
    let lock = CONFIG.read().map_err(|_err| HookError::GlobalLockError)?;
    Ok(lock.clone())
}

/// The hook table.  Never held while a hooked function runs.
pub fn sites<'a>() -> Result<MutexGuard<'a, HookSites<MinHookPatcher>>> {
    SITES.lock().map_err(|_err| HookError::GlobalLockError)
}
