use crate::error::Result;
use crate::types::{
    CpuDescriptor, GpuDescriptor, HeapKind, ResourceState, Size, SwapChainDesc, WindowHandle,
};

/// The part of D3D12/DXGI the overlay uses.  Handle types are chosen by the backend; cloning
/// a handle shares the native object (AddRef) and dropping one releases it, so every exit
/// path, including failed builds, gives back what it took.
pub trait GpuApi: Send {
    /// Compared by identity to tell the host's swap chain from any other one presenting.
    type SwapChain: PartialEq + Send;
    type Device: Clone + Send;
    /// Compared by identity to tell the host's bound queue from its other queues.
    type Queue: Clone + PartialEq + Send;
    type Fence: Clone + Send;
    type Resource: Clone + Send;
    type DescriptorHeap: Send;
    type CommandAllocator: Clone + Send;
    type CommandList: Send;

    fn swap_chain_device(&self, swap_chain: &Self::SwapChain) -> Result<Self::Device>;
    fn swap_chain_desc(&self, swap_chain: &Self::SwapChain) -> Result<SwapChainDesc>;
    fn swap_chain_buffer(&self, swap_chain: &Self::SwapChain, index: u32)
        -> Result<Self::Resource>;
    fn current_back_buffer_index(&self, swap_chain: &Self::SwapChain) -> u32;

    fn create_descriptor_heap(
        &self,
        device: &Self::Device,
        kind: HeapKind,
        count: u32,
    ) -> Result<Self::DescriptorHeap>;
    fn heap_cpu_start(&self, heap: &Self::DescriptorHeap) -> CpuDescriptor;
    fn heap_gpu_start(&self, heap: &Self::DescriptorHeap) -> GpuDescriptor;
    fn descriptor_increment(&self, device: &Self::Device, kind: HeapKind) -> u32;
    fn create_render_target_view(
        &self,
        device: &Self::Device,
        resource: &Self::Resource,
        dest: CpuDescriptor,
    );
    fn create_command_allocator(&self, device: &Self::Device) -> Result<Self::CommandAllocator>;
    /// The returned list is closed, ready for its first reset.
    fn create_command_list(
        &self,
        device: &Self::Device,
        allocator: &Self::CommandAllocator,
    ) -> Result<Self::CommandList>;

    fn reset_allocator(&self, allocator: &Self::CommandAllocator) -> Result<()>;
    fn reset_command_list(
        &self,
        list: &Self::CommandList,
        allocator: &Self::CommandAllocator,
    ) -> Result<()>;
    fn transition(
        &self,
        list: &Self::CommandList,
        resource: &Self::Resource,
        before: ResourceState,
        after: ResourceState,
    );
    fn set_render_target(&self, list: &Self::CommandList, rtv: CpuDescriptor);
    fn set_descriptor_heap(&self, list: &Self::CommandList, heap: &Self::DescriptorHeap);
    fn close_command_list(&self, list: &Self::CommandList) -> Result<()>;
    fn execute(&self, queue: &Self::Queue, list: &Self::CommandList);
}

/// Window queries and window-procedure subclassing.
pub trait WindowApi: Send {
    /// Logical (client rectangle) size, which can differ from the buffer size.
    fn client_size(&self, window: WindowHandle) -> Result<Size>;
    fn is_popup(&self, window: WindowHandle) -> bool;
    /// Address of the currently installed window procedure.
    fn window_proc(&self, window: WindowHandle) -> usize;
    /// Install `proc_addr`, returning the procedure it replaced.
    fn set_window_proc(&self, window: WindowHandle, proc_addr: usize) -> Result<usize>;
}
