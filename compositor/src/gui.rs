use shared_dx::error::Result;
use shared_dx::gpu::GpuApi;
use shared_dx::types::WindowMessage;

use device_state::{DescriptorSlot, DeviceContext};

/// Receives window messages on the window's thread.  Kept apart from the GUI so the window
/// procedure never waits on the compositor lock.
pub trait InputHandler: Send + Sync {
    fn handle(&self, msg: &WindowMessage);
}

/// The immediate-mode GUI library and its platform/renderer backends, seen from the
/// compositor.  Widget logic is behind `render`.
pub trait OverlayGui<A: GpuApi>: Send {
    type DrawData;
    type Input: InputHandler + 'static;

    /// Create the GUI context if there isn't one yet.
    fn create_context(&mut self, dc: &DeviceContext<A>) -> Result<()>;
    /// Bring up the window and renderer backends.  `font` is the heap slot reserved for the
    /// font atlas.
    fn init_backend(
        &mut self,
        api: &A,
        dc: &DeviceContext<A>,
        srv_heap: &A::DescriptorHeap,
        font: DescriptorSlot,
    ) -> Result<()>;
    fn shutdown_backend(&mut self);

    fn new_frame(&mut self);
    /// Produce this frame's draw data.  `None` means there is nothing to draw.
    fn render(&mut self) -> Option<Self::DrawData>;
    fn render_draw_data(&mut self, data: &Self::DrawData, list: &A::CommandList);

    fn viewports_enabled(&self) -> bool;
    /// Update and draw secondary viewport windows.  May present other swap chains.
    fn render_platform_windows(&mut self, list: &A::CommandList);

    fn input_handler(&self) -> std::sync::Arc<Self::Input>;
}
