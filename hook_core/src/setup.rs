//! One-time setup, run on a worker while the host thread that triggered it waits.
use winapi::shared::dxgi1_4::IDXGISwapChain3;
use winapi::um::d3d12::ID3D12CommandQueue;
use winapi::um::libloaderapi::GetModuleHandleA;

use address::{HookTarget, ResolverChain, VtableResolver};
use shared_dx::com::ComRef;
use shared_dx::error::{HookError, Result};

use crate::hooks;
use crate::loader::{locate_render_singleton, LoaderResolver};
use crate::runtime;
use crate::window::{find_window, TempWindow};

fn check_d3d12_loaded() -> Result<()> {
    let handle = unsafe { GetModuleHandleA(b"d3d12.dll\0".as_ptr() as *const _) };
    if handle.is_null() {
        return Err(HookError::LoadLibFailed("d3d12.dll is not loaded".to_owned()));
    }
    Ok(())
}

/// Find the host's render objects, hook its present, resize and signal entry points and bind
/// its queue and swap chain.  Everything is in place when this returns Ok.
pub fn run_setup() -> Result<()> {
    let conf = runtime::config()?;
    let ctx = runtime::context()
        .ok_or_else(|| HookError::SetupFailed("no overlay context".to_owned()))?;

    let window = find_window(&conf.window_title)?;
    log_debug!("host window: {:x}", window.0);
    let _temp = TempWindow::create()?;

    check_d3d12_loaded()?;

    let table = conf.address_table();
    let loader = LoaderResolver::from_module(&conf.loader_module);
    let location = locate_render_singleton(&table, &loader)?;
    log_debug!("render singleton: {:x?}", location);
    let objects = unsafe { location.discover(&conf.singleton_offsets())? };

    let mut vtables = VtableResolver::new();
    unsafe {
        vtables.bind(HookTarget::Present, objects.swap_chain);
        vtables.bind(HookTarget::ResizeBuffers, objects.swap_chain);
        vtables.bind(HookTarget::Signal, objects.command_queue);
    }

    let queue = unsafe { ComRef::from_borrowed(objects.command_queue as *mut ID3D12CommandQueue) }
        .ok_or_else(|| HookError::ResolutionFailure("command queue is null".to_owned()))?;
    let swap_chain =
        unsafe { ComRef::from_borrowed(objects.swap_chain as *mut IDXGISwapChain3) }
            .ok_or_else(|| HookError::ResolutionFailure("swap chain is null".to_owned()))?;
    ctx.bind_queue(queue);
    ctx.bind_swap_chain(swap_chain);

    let chain = ResolverChain::new().with(&table).with(&vtables);
    let installed = unsafe { hooks::install_render_hooks(&chain)? };
    if installed == 0 {
        return Err(HookError::SetupFailed("no render hooks installed".to_owned()));
    }
    log_info!("{} render hooks installed", installed);
    Ok(())
}
