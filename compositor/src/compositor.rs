use std::sync::{Arc, Mutex};

use shared_dx::error::{HookError, Result};
use shared_dx::gpu::{GpuApi, WindowApi};
use shared_dx::types::{HeapKind, ResourceState};

use device_state::{acquire, DescriptorSlots, DeviceContext, FrameResources};

use crate::gui::OverlayGui;
use crate::wndproc::WndProcInterceptor;

/// What happened to one frame's composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Composed {
    Drawn,
    /// The renderer had nothing to draw.
    NothingToDraw,
}

/// Owns every gpu object and the GUI backends.  Not synchronized: `OverlayContext` keeps it
/// behind a mutex and decides when each method may run.
pub struct Compositor<A: GpuApi, W: WindowApi, G: OverlayGui<A>> {
    api: A,
    windows: W,
    gui: G,
    srv_capacity: u32,
    device: Option<DeviceContext<A>>,
    frames: FrameResources<A>,
    slots: Arc<Mutex<DescriptorSlots>>,
    backend_live: bool,
}

impl<A: GpuApi, W: WindowApi, G: OverlayGui<A>> Compositor<A, W, G> {
    pub fn new(api: A, windows: W, gui: G, srv_capacity: u32) -> Self {
        Compositor {
            api,
            windows,
            gui,
            srv_capacity,
            device: None,
            frames: FrameResources::new(),
            slots: Arc::new(Mutex::new(DescriptorSlots::empty())),
            backend_live: false,
        }
    }

    /// Acquire the device, create the GUI context, build frame resources, bring up the GUI
    /// backends and subclass the window, in that order.  On failure everything built so far is
    /// released and the caller may simply try again.
    pub fn initialize(
        &mut self,
        swap_chain: &A::SwapChain,
        queue: &A::Queue,
        wndproc: &WndProcInterceptor,
    ) -> Result<()> {
        self.teardown();
        let r = self.try_initialize(swap_chain, queue, wndproc);
        if r.is_err() {
            self.teardown();
        }
        r
    }

    fn try_initialize(
        &mut self,
        swap_chain: &A::SwapChain,
        queue: &A::Queue,
        wndproc: &WndProcInterceptor,
    ) -> Result<()> {
        let dc = acquire(&self.api, &self.windows, swap_chain, queue)?;
        self.gui.create_context(&dc)?;
        self.frames
            .build(&self.api, &dc, swap_chain, self.srv_capacity)?;

        let heap = self.frames.srv_heap().ok_or_else(|| {
            HookError::BadStateError("frame resources built without a srv heap".to_owned())
        })?;
        let slots = DescriptorSlots::new(
            self.api.heap_cpu_start(heap),
            self.api.heap_gpu_start(heap),
            self.api.descriptor_increment(&dc.device, HeapKind::ShaderVisible),
            self.srv_capacity,
        );
        let font = slots.font_slot().ok_or_else(|| {
            HookError::ResourceCreationFailure("srv heap has no room for the font".to_owned())
        })?;

        self.gui.init_backend(&self.api, &dc, heap, font)?;
        self.backend_live = true;

        wndproc.attach(&self.windows, dc.window)?;

        match self.slots.lock() {
            Ok(mut s) => *s = slots,
            Err(_) => return Err(HookError::GlobalLockError),
        }
        log_info!(
            "overlay initialized: {} buffers, viewport {}, window {}",
            dc.buffer_count,
            dc.viewport_size,
            dc.window_size
        );
        self.device = Some(dc);
        Ok(())
    }

    /// Draw the overlay onto the current back buffer and submit it to the captured queue.
    /// A failure abandons this frame only.
    pub fn compose(&mut self, swap_chain: &A::SwapChain) -> Result<Composed> {
        let dc = self
            .device
            .as_ref()
            .ok_or_else(|| HookError::BadStateError("compose before initialize".to_owned()))?;
        let (list, heap) = match (self.frames.command_list(), self.frames.srv_heap()) {
            (Some(l), Some(h)) => (l, h),
            _ => {
                return Err(HookError::BadStateError(
                    "compose without frame resources".to_owned(),
                ))
            }
        };

        self.gui.new_frame();
        let draw_data = match self.gui.render() {
            Some(d) => d,
            None => return Ok(Composed::NothingToDraw),
        };

        let index = self.api.current_back_buffer_index(swap_chain);
        let frame = self.frames.frame(index).ok_or_else(|| {
            HookError::DeviceQueryFailure(format!(
                "back buffer {} out of range ({} frames)",
                index,
                self.frames.len()
            ))
        })?;

        let api = &self.api;
        api.reset_allocator(&frame.command_allocator)?;
        api.reset_command_list(list, &frame.command_allocator)?;
        api.transition(
            list,
            &frame.render_target,
            ResourceState::Present,
            ResourceState::RenderTarget,
        );
        api.set_render_target(list, frame.rtv);
        api.set_descriptor_heap(list, heap);
        self.gui.render_draw_data(&draw_data, list);
        api.transition(
            list,
            &frame.render_target,
            ResourceState::RenderTarget,
            ResourceState::Present,
        );
        api.close_command_list(list)?;
        api.execute(&dc.queue, list);

        if self.gui.viewports_enabled() {
            self.gui.render_platform_windows(list);
        }
        Ok(Composed::Drawn)
    }

    /// Release every gpu object and shut the GUI backends down.  Idempotent.
    pub fn teardown(&mut self) {
        if self.backend_live {
            self.gui.shutdown_backend();
            self.backend_live = false;
        }
        self.frames.teardown();
        if let Ok(mut s) = self.slots.lock() {
            *s = DescriptorSlots::empty();
        }
        self.device = None;
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn device(&self) -> Option<&DeviceContext<A>> {
        self.device.as_ref()
    }

    pub fn slots(&self) -> Arc<Mutex<DescriptorSlots>> {
        self.slots.clone()
    }

    pub fn gui(&self) -> &G {
        &self.gui
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}
