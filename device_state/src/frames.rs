use shared_dx::error::{HookError, Result};
use shared_dx::gpu::GpuApi;
use shared_dx::types::{CpuDescriptor, HeapKind};

use crate::acquire::DeviceContext;

/// Per swap buffer state.  `command_allocator` is the one allocator shared by every frame.
pub struct FrameContext<A: GpuApi> {
    pub command_allocator: A::CommandAllocator,
    pub render_target: A::Resource,
    pub rtv: CpuDescriptor,
}

struct Built<A: GpuApi> {
    srv_heap: A::DescriptorHeap,
    // held only to keep the views in `frames` valid
    _rtv_heap: A::DescriptorHeap,
    command_list: A::CommandList,
    frames: Vec<FrameContext<A>>,
}

/// Everything the compositor creates against the swap buffers.  Either fully built or empty:
/// a failed build keeps nothing.
pub struct FrameResources<A: GpuApi> {
    built: Option<Built<A>>,
}

impl<A: GpuApi> Default for FrameResources<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: GpuApi> FrameResources<A> {
    pub fn new() -> Self {
        FrameResources { built: None }
    }

    /// Create the shader-visible heap (`srv_capacity` slots), the shared command allocator,
    /// the command list (closed), the render-target heap, and one view per swap buffer at
    /// `rtv_start + i * increment`.  Anything already built is torn down first.
    pub fn build(
        &mut self,
        api: &A,
        dc: &DeviceContext<A>,
        swap_chain: &A::SwapChain,
        srv_capacity: u32,
    ) -> Result<()> {
        self.teardown();

        let creation = |what: &str, e: HookError| match e {
            HookError::ResourceCreationFailure(_) => e,
            other => HookError::ResourceCreationFailure(format!("{}: {:?}", what, other)),
        };

        let srv_heap = api
            .create_descriptor_heap(&dc.device, HeapKind::ShaderVisible, srv_capacity)
            .map_err(|e| creation("srv heap", e))?;
        let allocator = api
            .create_command_allocator(&dc.device)
            .map_err(|e| creation("command allocator", e))?;
        let command_list = api
            .create_command_list(&dc.device, &allocator)
            .map_err(|e| creation("command list", e))?;
        let rtv_heap = api
            .create_descriptor_heap(&dc.device, HeapKind::RenderTarget, dc.buffer_count)
            .map_err(|e| creation("rtv heap", e))?;

        let increment = api.descriptor_increment(&dc.device, HeapKind::RenderTarget);
        let rtv_start = api.heap_cpu_start(&rtv_heap);

        let mut frames = Vec::with_capacity(dc.buffer_count as usize);
        for i in 0..dc.buffer_count {
            let buffer = api
                .swap_chain_buffer(swap_chain, i)
                .map_err(|e| creation(&format!("swap buffer {}", i), e))?;
            let rtv = rtv_start.offset(i, increment);
            api.create_render_target_view(&dc.device, &buffer, rtv);
            frames.push(FrameContext {
                command_allocator: allocator.clone(),
                render_target: buffer,
                rtv,
            });
        }

        log_debug!(
            "built {} frame contexts (rtv increment {}, {} srv slots)",
            frames.len(),
            increment,
            srv_capacity
        );
        self.built = Some(Built {
            srv_heap,
            _rtv_heap: rtv_heap,
            command_list,
            frames,
        });
        Ok(())
    }

    /// Release everything.  Fine to call when nothing was built.
    pub fn teardown(&mut self) {
        if let Some(b) = self.built.take() {
            log_debug!("releasing {} frame contexts", b.frames.len());
        }
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// Number of frame contexts; also the buffer count they were built for.
    pub fn len(&self) -> usize {
        self.built.as_ref().map(|b| b.frames.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frame(&self, index: u32) -> Option<&FrameContext<A>> {
        self.built.as_ref().and_then(|b| b.frames.get(index as usize))
    }

    pub fn frames(&self) -> &[FrameContext<A>] {
        match self.built.as_ref() {
            Some(b) => &b.frames,
            None => &[],
        }
    }

    pub fn command_list(&self) -> Option<&A::CommandList> {
        self.built.as_ref().map(|b| &b.command_list)
    }

    pub fn srv_heap(&self) -> Option<&A::DescriptorHeap> {
        self.built.as_ref().map(|b| &b.srv_heap)
    }
}
