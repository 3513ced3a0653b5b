//! `OverlayGui` over cimgui and the Dear ImGui win32/dx12 backends.  Widgets come from the
//! external renderer, reached through a method the loader hands us.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use winapi::ctypes::c_void;
use winapi::shared::dxgiformat::{DXGI_FORMAT, DXGI_FORMAT_R8G8B8A8_UNORM};
use winapi::shared::minwindef::{LPARAM, LRESULT, UINT, WPARAM};
use winapi::shared::windef::HWND;
use winapi::um::d3d12::{
    ID3D12DescriptorHeap, ID3D12Device, ID3D12GraphicsCommandList, D3D12_CPU_DESCRIPTOR_HANDLE,
    D3D12_GPU_DESCRIPTOR_HANDLE,
};

use shared_dx::com::ComRef;
use shared_dx::error::{HookError, Result};
use shared_dx::types::WindowMessage;

use compositor::{InputHandler, OverlayGui};
use device_state::{DescriptorSlot, DeviceContext};

use crate::d3d12::D3d12Api;

/// Opaque cimgui types.
#[repr(C)]
pub struct ImGuiContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImDrawData {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImFontAtlas {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImGuiStyle {
    _private: [u8; 0],
}

/// Leading fields of `ImGuiIO`; only ever accessed through the pointer cimgui returns.
#[repr(C)]
pub struct ImGuiIO {
    pub config_flags: i32,
    pub backend_flags: i32,
}

const CONFIG_FLAGS_DOCKING_ENABLE: i32 = 1 << 6;
const CONFIG_FLAGS_VIEWPORTS_ENABLE: i32 = 1 << 10;

extern "C" {
    fn igCreateContext(shared_font_atlas: *mut ImFontAtlas) -> *mut ImGuiContext;
    fn igGetCurrentContext() -> *mut ImGuiContext;
    fn igSetCurrentContext(ctx: *mut ImGuiContext);
    fn igGetIO() -> *mut ImGuiIO;
    fn igGetStyle() -> *mut ImGuiStyle;
    fn igStyleColorsDark(dst: *mut ImGuiStyle);
    fn igUpdatePlatformWindows();
    fn igRenderPlatformWindowsDefault(
        platform_render_arg: *mut c_void,
        renderer_render_arg: *mut c_void,
    );

    fn ImGui_ImplWin32_Init(hwnd: *mut c_void) -> bool;
    fn ImGui_ImplWin32_Shutdown();
    fn ImGui_ImplWin32_NewFrame();
    fn ImGui_ImplWin32_EnableDpiAwareness();
    fn ImGui_ImplWin32_WndProcHandler(
        hwnd: HWND,
        msg: UINT,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT;

    fn ImGui_ImplDX12_Init(
        device: *mut ID3D12Device,
        num_frames_in_flight: i32,
        rtv_format: DXGI_FORMAT,
        cbv_srv_heap: *mut ID3D12DescriptorHeap,
        font_srv_cpu_desc_handle: D3D12_CPU_DESCRIPTOR_HANDLE,
        font_srv_gpu_desc_handle: D3D12_GPU_DESCRIPTOR_HANDLE,
    ) -> bool;
    fn ImGui_ImplDX12_Shutdown();
    fn ImGui_ImplDX12_NewFrame();
    fn ImGui_ImplDX12_RenderDrawData(
        draw_data: *mut ImDrawData,
        list: *mut ID3D12GraphicsCommandList,
    );
    fn ImGui_ImplDX12_CreateDeviceObjects() -> bool;
}

/// `ImDrawData* core_imgui_render()`, published by the renderer module.
pub type RenderFn = extern "C" fn() -> *mut ImDrawData;

/// Where the renderer function lives.  Set by `CoreInitialize`; 0 means no renderer.
pub struct RendererSlot(AtomicUsize);

impl RendererSlot {
    pub const fn new() -> Self {
        RendererSlot(AtomicUsize::new(0))
    }

    pub fn set(&self, f: *const c_void) {
        self.0.store(f as usize, Ordering::Release);
    }

    fn get(&self) -> Option<RenderFn> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            // only ever stored from a loader method pointer of this type
            addr => Some(unsafe { std::mem::transmute::<usize, RenderFn>(addr) }),
        }
    }
}

pub struct ImguiInput;

impl InputHandler for ImguiInput {
    fn handle(&self, msg: &WindowMessage) {
        unsafe {
            ImGui_ImplWin32_WndProcHandler(msg.window.0 as HWND, msg.msg, msg.wparam, msg.lparam);
        }
    }
}

pub struct ImguiOverlay {
    renderer: &'static RendererSlot,
    input: Arc<ImguiInput>,
    win32_live: bool,
    dx12_live: bool,
}

impl ImguiOverlay {
    pub fn new(renderer: &'static RendererSlot) -> Self {
        ImguiOverlay {
            renderer,
            input: Arc::new(ImguiInput),
            win32_live: false,
            dx12_live: false,
        }
    }

    unsafe fn try_init_backend(
        &mut self,
        dc: &DeviceContext<D3d12Api>,
        srv_heap: &ComRef<ID3D12DescriptorHeap>,
        font: DescriptorSlot,
    ) -> Result<()> {
        if !ImGui_ImplWin32_Init(dc.window.0 as *mut c_void) {
            return Err(HookError::ResourceCreationFailure("ImGui_ImplWin32_Init".to_owned()));
        }
        self.win32_live = true;
        ImGui_ImplWin32_EnableDpiAwareness();

        if !ImGui_ImplDX12_Init(
            dc.device.as_ptr(),
            dc.buffer_count as i32,
            DXGI_FORMAT_R8G8B8A8_UNORM,
            srv_heap.as_ptr(),
            D3D12_CPU_DESCRIPTOR_HANDLE { ptr: font.cpu.ptr },
            D3D12_GPU_DESCRIPTOR_HANDLE { ptr: font.gpu.ptr },
        ) {
            return Err(HookError::ResourceCreationFailure("ImGui_ImplDX12_Init".to_owned()));
        }
        self.dx12_live = true;

        if !ImGui_ImplDX12_CreateDeviceObjects() {
            return Err(HookError::ResourceCreationFailure(
                "ImGui_ImplDX12_CreateDeviceObjects".to_owned(),
            ));
        }
        Ok(())
    }
}

impl OverlayGui<D3d12Api> for ImguiOverlay {
    type DrawData = *mut ImDrawData;
    type Input = ImguiInput;

    fn create_context(&mut self, dc: &DeviceContext<D3d12Api>) -> Result<()> {
        unsafe {
            if !igGetCurrentContext().is_null() {
                return Ok(());
            }
            let ctx = igCreateContext(std::ptr::null_mut());
            if ctx.is_null() {
                return Err(HookError::ResourceCreationFailure("igCreateContext".to_owned()));
            }
            igSetCurrentContext(ctx);
            let io = igGetIO();
            (*io).config_flags |= CONFIG_FLAGS_DOCKING_ENABLE;
            igStyleColorsDark(igGetStyle());
        }
        log_debug!(
            "gui context created for viewport {}, window {}",
            dc.viewport_size,
            dc.window_size
        );
        Ok(())
    }

    fn init_backend(
        &mut self,
        _api: &D3d12Api,
        dc: &DeviceContext<D3d12Api>,
        srv_heap: &ComRef<ID3D12DescriptorHeap>,
        font: DescriptorSlot,
    ) -> Result<()> {
        // the compositor only shuts down backends that came up, so undo a partial init here
        let r = unsafe { self.try_init_backend(dc, srv_heap, font) };
        if r.is_err() {
            self.shutdown_backend();
        }
        r
    }

    fn shutdown_backend(&mut self) {
        unsafe {
            if self.dx12_live {
                ImGui_ImplDX12_Shutdown();
                self.dx12_live = false;
            }
            if self.win32_live {
                ImGui_ImplWin32_Shutdown();
                self.win32_live = false;
            }
        }
    }

    fn new_frame(&mut self) {
        unsafe {
            ImGui_ImplDX12_NewFrame();
            ImGui_ImplWin32_NewFrame();
        }
    }

    fn render(&mut self) -> Option<*mut ImDrawData> {
        let render = self.renderer.get()?;
        let data = render();
        if data.is_null() {
            None
        } else {
            Some(data)
        }
    }

    fn render_draw_data(
        &mut self,
        data: &*mut ImDrawData,
        list: &ComRef<ID3D12GraphicsCommandList>,
    ) {
        unsafe { ImGui_ImplDX12_RenderDrawData(*data, list.as_ptr()) }
    }

    fn viewports_enabled(&self) -> bool {
        unsafe {
            let io = igGetIO();
            !io.is_null() && (*io).config_flags & CONFIG_FLAGS_VIEWPORTS_ENABLE != 0
        }
    }

    fn render_platform_windows(&mut self, list: &ComRef<ID3D12GraphicsCommandList>) {
        unsafe {
            igUpdatePlatformWindows();
            igRenderPlatformWindowsDefault(std::ptr::null_mut(), list.as_ptr() as *mut c_void);
        }
    }

    fn input_handler(&self) -> Arc<ImguiInput> {
        self.input.clone()
    }
}
