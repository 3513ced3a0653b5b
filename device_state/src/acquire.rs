use shared_dx::error::{HookError, Result};
use shared_dx::gpu::{GpuApi, WindowApi};
use shared_dx::types::{Size, WindowHandle};

/// What one initialization cycle learned about the host's device and output.  Replaced
/// wholesale when the compositor re-initializes after a resize.
pub struct DeviceContext<A: GpuApi> {
    pub device: A::Device,
    pub queue: A::Queue,
    pub window: WindowHandle,
    /// Raw `DXGI_FORMAT` of the swap buffers.
    pub format: u32,
    pub buffer_count: u32,
    /// Swap buffer size.
    pub viewport_size: Size,
    /// Client rectangle size; differs from `viewport_size` under DPI scaling or borderless
    /// full screen.
    pub window_size: Size,
    pub windowed: bool,
}

/// Capture the device and output description from a live swap chain.  Every native query is
/// checked; a failure is a `DeviceQueryFailure` and the caller retries on the next present.
pub fn acquire<A: GpuApi, W: WindowApi>(
    api: &A,
    windows: &W,
    swap_chain: &A::SwapChain,
    queue: &A::Queue,
) -> Result<DeviceContext<A>> {
    let device = api.swap_chain_device(swap_chain)?;
    let desc = api.swap_chain_desc(swap_chain)?;
    if desc.buffer_count == 0 {
        return Err(HookError::DeviceQueryFailure(
            "swap chain reports zero buffers".to_owned(),
        ));
    }
    if desc.window.is_null() {
        return Err(HookError::DeviceQueryFailure(
            "swap chain has no output window".to_owned(),
        ));
    }
    let window_size = windows
        .client_size(desc.window)
        .map_err(|e| HookError::DeviceQueryFailure(format!("client rect: {:?}", e)))?;
    let windowed = !windows.is_popup(desc.window);
    let viewport_size = Size::new(desc.width, desc.height);

    log_debug!(
        "acquired device: {} buffers, format {}, viewport {}, window {} ({})",
        desc.buffer_count,
        desc.format,
        viewport_size,
        window_size,
        if windowed { "windowed" } else { "popup" }
    );

    Ok(DeviceContext {
        device,
        queue: queue.clone(),
        window: desc.window,
        format: desc.format,
        buffer_count: desc.buffer_count,
        viewport_size,
        window_size,
        windowed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_dx::mock::{MockGpu, MockOp, MockSwapChain, MockWindows, DEFAULT_FORMAT};

    fn setup(popup: bool) -> (MockGpu, MockWindows, MockSwapChain) {
        let gpu = MockGpu::new();
        let windows = MockWindows::new();
        let w = WindowHandle(0x42);
        windows.add_window(w, Size::new(1280, 720), popup, 0x1000);
        (gpu, windows, MockSwapChain::new(w, 3, 2560, 1440))
    }

    #[test]
    fn test_acquire() {
        let (gpu, windows, sc) = setup(false);
        let queue = gpu.new_queue();
        let dc = acquire(&gpu, &windows, &sc, &queue).expect("doh");
        assert_eq!(dc.buffer_count, 3);
        assert_eq!(dc.format, DEFAULT_FORMAT);
        assert_eq!(dc.window, WindowHandle(0x42));
        assert_eq!(dc.viewport_size, Size::new(2560, 1440));
        assert_eq!(dc.window_size, Size::new(1280, 720));
        assert!(dc.windowed);
        assert!(dc.queue == queue);
    }

    #[test]
    fn test_popup_is_not_windowed() {
        let (gpu, windows, sc) = setup(true);
        let dc = acquire(&gpu, &windows, &sc, &gpu.new_queue()).expect("doh");
        assert!(!dc.windowed);
    }

    #[test]
    fn test_query_failures_are_retryable() {
        let (gpu, windows, sc) = setup(false);
        let queue = gpu.new_queue();

        gpu.fail(MockOp::SwapChainDesc);
        let e = acquire(&gpu, &windows, &sc, &queue).err().expect("doh");
        assert!(e.is_retryable());
        gpu.clear_failures();

        windows.fail(MockOp::ClientSize);
        let e = acquire(&gpu, &windows, &sc, &queue).err().expect("doh");
        assert!(matches!(e, HookError::DeviceQueryFailure(_)));
        windows.clear_failures();

        // failed attempts don't hold on to anything
        assert_eq!(gpu.live_handles(), 1);
        assert!(acquire(&gpu, &windows, &sc, &queue).is_ok());
    }
}
