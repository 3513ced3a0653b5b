//! Hook bodies.  Each one hands the call to the overlay context and then always calls the
//! host's original function, whatever the overlay did.
use std::sync::atomic::{AtomicBool, Ordering};

use winapi::ctypes::c_void;
use winapi::shared::dxgi::IDXGISwapChain;
use winapi::shared::dxgi1_4::IDXGISwapChain3;
use winapi::shared::dxgiformat::DXGI_FORMAT;
use winapi::shared::minwindef::UINT;
use winapi::shared::winerror::HRESULT;
use winapi::um::d3d12::{ID3D12CommandQueue, ID3D12Fence};

use address::{HookTarget, Resolver};
use hook_install::CallThrough;
use shared_dx::com::ComRef;
use shared_dx::error::{critical_failure, Result};

use compositor::{PresentOutcome, SetupTask};

use crate::runtime;
use crate::setup;

pub type PresentFn =
    unsafe extern "system" fn(this: *mut IDXGISwapChain, sync_interval: UINT, flags: UINT) -> HRESULT;
pub type ResizeBuffersFn = unsafe extern "system" fn(
    this: *mut IDXGISwapChain,
    buffer_count: UINT,
    width: UINT,
    height: UINT,
    format: DXGI_FORMAT,
    flags: UINT,
) -> HRESULT;
pub type SignalFn =
    unsafe extern "system" fn(this: *mut ID3D12CommandQueue, fence: *mut ID3D12Fence, value: u64) -> HRESULT;
pub type TitleReadyFn = unsafe extern "C" fn(this: *mut c_void);

pub static PRESENT: CallThrough = CallThrough::new();
pub static RESIZE_BUFFERS: CallThrough = CallThrough::new();
pub static SIGNAL: CallThrough = CallThrough::new();
pub static TITLE_READY: CallThrough = CallThrough::new();

static SETUP_STARTED: AtomicBool = AtomicBool::new(false);

/// The original function for a hook that is running.  A missing trampoline here means the
/// host jumped into a hook we never finished installing; there is nothing sane to return.
unsafe fn original<F: Copy>(slot: &CallThrough, what: &str) -> F {
    match slot.as_fn::<F>() {
        Some(f) => f,
        None => critical_failure(&format!("{} hook has no trampoline", what)),
    }
}

pub unsafe extern "system" fn hook_present(
    this: *mut IDXGISwapChain,
    sync_interval: UINT,
    flags: UINT,
) -> HRESULT {
    if let Some(ctx) = runtime::context() {
        let sc = ComRef::from_borrowed(this).and_then(|sc| sc.query::<IDXGISwapChain3>());
        match sc {
            Some(sc) => {
                if ctx.present(&sc) == PresentOutcome::Reentered {
                    log_trace!("present: nested call passed through");
                }
            }
            None => log_trace!("present: swap chain {:p} is not an IDXGISwapChain3", this),
        }
    }
    let f: PresentFn = original(&PRESENT, "present");
    f(this, sync_interval, flags)
}

pub unsafe extern "system" fn hook_resize_buffers(
    this: *mut IDXGISwapChain,
    buffer_count: UINT,
    width: UINT,
    height: UINT,
    format: DXGI_FORMAT,
    flags: UINT,
) -> HRESULT {
    if let Some(ctx) = runtime::context() {
        log_debug!("resize buffers: {} x {}, {} buffers", width, height, buffer_count);
        ctx.resize(&(this as *mut IDXGISwapChain3));
    }
    let f: ResizeBuffersFn = original(&RESIZE_BUFFERS, "resize buffers");
    f(this, buffer_count, width, height, format, flags)
}

pub unsafe extern "system" fn hook_signal(
    this: *mut ID3D12CommandQueue,
    fence: *mut ID3D12Fence,
    value: u64,
) -> HRESULT {
    if let Some(ctx) = runtime::context() {
        ctx.signal(&this, value, || ComRef::from_borrowed(fence));
    }
    let f: SignalFn = original(&SIGNAL, "signal");
    f(this, fence, value)
}

/// Fires when the host's title menu is up, by which point its renderer exists.  The first
/// call runs setup to completion on a worker, then the hook takes itself out.
pub unsafe extern "C" fn hook_title_ready(this: *mut c_void) {
    if !SETUP_STARTED.swap(true, Ordering::AcqRel) {
        let r = SetupTask::spawn("overlay-setup", setup::run_setup).and_then(|t| t.wait());
        match r {
            Ok(()) => log_info!("overlay setup complete"),
            Err(e) => log_error!("overlay setup failed; the overlay will stay off: {:?}", e),
        }
    }
    let f: TitleReadyFn = original(&TITLE_READY, "title ready");
    f(this);

    match runtime::sites() {
        Ok(mut sites) => {
            if let Err(e) = sites.disable_site(HookTarget::TitleReady) {
                log_warn!("can't disable title hook: {:?}", e);
            }
        }
        Err(e) => log_warn!("can't disable title hook: {:?}", e),
    }
}

pub unsafe fn install_title_hook(resolver: &dyn Resolver) -> Result<()> {
    let mut sites = runtime::sites()?;
    sites.install_site(
        resolver,
        HookTarget::TitleReady,
        hook_title_ready as usize,
        &TITLE_READY,
    )?;
    Ok(())
}

/// Hook present, resize and signal.  A target that can't be hooked is logged and skipped;
/// returns how many went in.
pub unsafe fn install_render_hooks(resolver: &dyn Resolver) -> Result<usize> {
    let hooks: [(HookTarget, usize, &CallThrough); 3] = [
        (HookTarget::Present, hook_present as usize, &PRESENT),
        (HookTarget::ResizeBuffers, hook_resize_buffers as usize, &RESIZE_BUFFERS),
        (HookTarget::Signal, hook_signal as usize, &SIGNAL),
    ];
    let mut sites = runtime::sites()?;
    let mut installed = 0;
    for (target, replacement, slot) in hooks.iter() {
        match sites.install_site(resolver, *target, *replacement, slot) {
            Ok(rec) => {
                log_debug!("hooked {} at {:x}", target, rec.target);
                installed += 1;
            }
            Err(e) => log_error!("{} not hooked: {:?}", target, e),
        }
    }
    Ok(installed)
}
