//! Win32 side: the `WindowApi` backend, host window lookup, the temporary window used during
//! setup, and the window procedure installed on the host window.
use std::ffi::CString;
use std::ptr::null_mut;

use winapi::shared::minwindef::{LPARAM, LRESULT, UINT, WPARAM};
use winapi::shared::windef::{HWND, RECT};
use winapi::um::errhandlingapi::{GetLastError, SetLastError};
use winapi::um::libloaderapi::GetModuleHandleW;
use winapi::um::winuser::{
    CallWindowProcW, CreateWindowExW, DefWindowProcW, DestroyWindow, FindWindowA, GetClientRect,
    GetWindowLongPtrW, RegisterClassExW, SetWindowLongPtrW, UnregisterClassW, CS_HREDRAW,
    CS_VREDRAW, CW_USEDEFAULT, GWLP_WNDPROC, GWL_STYLE, WNDCLASSEXW, WNDPROC,
    WS_OVERLAPPEDWINDOW, WS_POPUP,
};

use shared_dx::error::{HookError, Result};
use shared_dx::gpu::WindowApi;
use shared_dx::types::{Size, WindowHandle, WindowMessage};

use crate::runtime;

const TEMP_CLASS_NAME: &str = "SharpPluginLoader";
const TEMP_WINDOW_NAME: &str = "SharpPluginLoader DX Hook";

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn last_error(what: &str) -> HookError {
    HookError::WinApiError(format!("{} failed ({})", what, unsafe { GetLastError() }))
}

pub struct Win32Windows;

impl WindowApi for Win32Windows {
    fn client_size(&self, window: WindowHandle) -> Result<Size> {
        let mut rect = RECT {
            left: 0,
            top: 0,
            right: 0,
            bottom: 0,
        };
        if unsafe { GetClientRect(window.0 as HWND, &mut rect) } == 0 {
            return Err(last_error("GetClientRect"));
        }
        Ok(Size::new(
            (rect.right - rect.left).max(0) as u32,
            (rect.bottom - rect.top).max(0) as u32,
        ))
    }

    fn is_popup(&self, window: WindowHandle) -> bool {
        let style = unsafe { GetWindowLongPtrW(window.0 as HWND, GWL_STYLE) };
        (style as u32) & WS_POPUP != 0
    }

    fn window_proc(&self, window: WindowHandle) -> usize {
        unsafe { GetWindowLongPtrW(window.0 as HWND, GWLP_WNDPROC) as usize }
    }

    fn set_window_proc(&self, window: WindowHandle, proc_addr: usize) -> Result<usize> {
        unsafe {
            // zero is both a valid previous value and the failure value
            SetLastError(0);
            let prev = SetWindowLongPtrW(window.0 as HWND, GWLP_WNDPROC, proc_addr as isize);
            if prev == 0 && GetLastError() != 0 {
                return Err(last_error("SetWindowLongPtrW"));
            }
            Ok(prev as usize)
        }
    }
}

pub fn find_window(title: &str) -> Result<WindowHandle> {
    let ctitle = CString::new(title)?;
    let hwnd = unsafe { FindWindowA(std::ptr::null(), ctitle.as_ptr()) };
    if hwnd.is_null() {
        return Err(last_error(&format!("FindWindowA(\"{}\")", title)));
    }
    Ok(WindowHandle(hwnd as usize))
}

/// Window class and window that exist only while setup runs.  Both are released on drop.
pub struct TempWindow {
    class_name: Vec<u16>,
    hwnd: HWND,
}

impl TempWindow {
    pub fn create() -> Result<Self> {
        let class_name = wide(TEMP_CLASS_NAME);
        let window_name = wide(TEMP_WINDOW_NAME);
        unsafe {
            let instance = GetModuleHandleW(std::ptr::null());
            let class = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as UINT,
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(DefWindowProcW),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: instance,
                hIcon: null_mut(),
                hCursor: null_mut(),
                hbrBackground: null_mut(),
                lpszMenuName: std::ptr::null(),
                lpszClassName: class_name.as_ptr(),
                hIconSm: null_mut(),
            };
            if RegisterClassExW(&class) == 0 {
                return Err(last_error("RegisterClassExW"));
            }
            let hwnd = CreateWindowExW(
                0,
                class_name.as_ptr(),
                window_name.as_ptr(),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                100,
                100,
                null_mut(),
                null_mut(),
                instance,
                null_mut(),
            );
            if hwnd.is_null() {
                let e = last_error("CreateWindowExW");
                UnregisterClassW(class_name.as_ptr(), instance);
                return Err(e);
            }
            log_debug!("created temporary window {:p}", hwnd);
            Ok(TempWindow { class_name, hwnd })
        }
    }
}

impl Drop for TempWindow {
    fn drop(&mut self) {
        unsafe {
            DestroyWindow(self.hwnd);
            UnregisterClassW(self.class_name.as_ptr(), GetModuleHandleW(std::ptr::null()));
        }
        log_debug!("destroyed temporary window");
    }
}

unsafe fn forward(prev: usize, hwnd: HWND, msg: UINT, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if prev == 0 {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }
    let prev: WNDPROC = std::mem::transmute::<usize, WNDPROC>(prev);
    CallWindowProcW(prev, hwnd, msg, wparam, lparam)
}

/// Installed on the host window.  The overlay sees the message first (while it is ready), then
/// the host's own procedure gets it.
pub unsafe extern "system" fn overlay_wndproc(
    hwnd: HWND,
    msg: UINT,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match runtime::context() {
        Some(ctx) => {
            let wm = WindowMessage {
                window: WindowHandle(hwnd as usize),
                msg,
                wparam,
                lparam,
            };
            ctx.window_message(&wm, |prev| forward(prev, hwnd, msg, wparam, lparam))
        }
        None => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
