//! `GpuApi` over D3D12 and DXGI.  Every interface pointer is held in a `ComRef`, so whatever
//! a failed build already created is released when its handle drops.
use std::ptr::null_mut;

use winapi::ctypes::c_void;
use winapi::shared::dxgi::DXGI_SWAP_CHAIN_DESC;
use winapi::shared::dxgi1_4::IDXGISwapChain3;
use winapi::shared::minwindef::FALSE;
use winapi::shared::winerror::{FAILED, HRESULT};
use winapi::um::d3d12::{
    ID3D12CommandAllocator, ID3D12CommandList, ID3D12CommandQueue, ID3D12DescriptorHeap,
    ID3D12Device, ID3D12Fence, ID3D12GraphicsCommandList, ID3D12Resource,
    D3D12_COMMAND_LIST_TYPE_DIRECT, D3D12_CPU_DESCRIPTOR_HANDLE, D3D12_DESCRIPTOR_HEAP_DESC,
    D3D12_DESCRIPTOR_HEAP_FLAG_NONE, D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
    D3D12_DESCRIPTOR_HEAP_TYPE, D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
    D3D12_DESCRIPTOR_HEAP_TYPE_RTV, D3D12_GPU_DESCRIPTOR_HANDLE, D3D12_RESOURCE_BARRIER,
    D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES, D3D12_RESOURCE_BARRIER_FLAG_NONE,
    D3D12_RESOURCE_BARRIER_TYPE_TRANSITION, D3D12_RESOURCE_STATES, D3D12_RESOURCE_STATE_PRESENT,
    D3D12_RESOURCE_STATE_RENDER_TARGET,
};
use winapi::Interface;

use shared_dx::com::ComRef;
use shared_dx::error::{HookError, Result};
use shared_dx::gpu::GpuApi;
use shared_dx::types::{
    CpuDescriptor, GpuDescriptor, HeapKind, ResourceState, SwapChainDesc, WindowHandle,
};

fn check(hr: HRESULT, what: &str, err: fn(String) -> HookError) -> Result<()> {
    if FAILED(hr) {
        Err(err(format!("{} failed: 0x{:x}", what, hr)))
    } else {
        Ok(())
    }
}

/// Adopt the out-param of a successful create/get call.
unsafe fn adopt<T: Interface>(
    out: *mut c_void,
    what: &str,
    err: fn(String) -> HookError,
) -> Result<ComRef<T>> {
    ComRef::from_raw(out as *mut T).ok_or_else(|| err(format!("{} returned null", what)))
}

fn heap_type(kind: HeapKind) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    match kind {
        HeapKind::ShaderVisible => D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
        HeapKind::RenderTarget => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
    }
}

fn resource_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
    }
}

// The heap-start getters return a struct, and the winapi declarations use the wrong ABI for
// that: MSVC passes member-function struct returns through a hidden pointer.  Call the vtable
// entries with the real signature.
type CpuStartFn = unsafe extern "system" fn(
    *mut ID3D12DescriptorHeap,
    *mut D3D12_CPU_DESCRIPTOR_HANDLE,
) -> *mut D3D12_CPU_DESCRIPTOR_HANDLE;
type GpuStartFn = unsafe extern "system" fn(
    *mut ID3D12DescriptorHeap,
    *mut D3D12_GPU_DESCRIPTOR_HANDLE,
) -> *mut D3D12_GPU_DESCRIPTOR_HANDLE;

unsafe fn cpu_heap_start(heap: *mut ID3D12DescriptorHeap) -> D3D12_CPU_DESCRIPTOR_HANDLE {
    let f: CpuStartFn =
        std::mem::transmute((*(*heap).lpVtbl).GetCPUDescriptorHandleForHeapStart);
    let mut out = D3D12_CPU_DESCRIPTOR_HANDLE { ptr: 0 };
    f(heap, &mut out);
    out
}

unsafe fn gpu_heap_start(heap: *mut ID3D12DescriptorHeap) -> D3D12_GPU_DESCRIPTOR_HANDLE {
    let f: GpuStartFn =
        std::mem::transmute((*(*heap).lpVtbl).GetGPUDescriptorHandleForHeapStart);
    let mut out = D3D12_GPU_DESCRIPTOR_HANDLE { ptr: 0 };
    f(heap, &mut out);
    out
}

pub struct D3d12Api;

impl GpuApi for D3d12Api {
    type SwapChain = ComRef<IDXGISwapChain3>;
    type Device = ComRef<ID3D12Device>;
    type Queue = ComRef<ID3D12CommandQueue>;
    type Fence = ComRef<ID3D12Fence>;
    type Resource = ComRef<ID3D12Resource>;
    type DescriptorHeap = ComRef<ID3D12DescriptorHeap>;
    type CommandAllocator = ComRef<ID3D12CommandAllocator>;
    type CommandList = ComRef<ID3D12GraphicsCommandList>;

    fn swap_chain_device(&self, swap_chain: &Self::SwapChain) -> Result<Self::Device> {
        let mut out: *mut c_void = null_mut();
        unsafe {
            let hr = swap_chain.GetDevice(&ID3D12Device::uuidof(), &mut out);
            check(hr, "IDXGISwapChain::GetDevice", HookError::DeviceQueryFailure)?;
            adopt(out, "IDXGISwapChain::GetDevice", HookError::DeviceQueryFailure)
        }
    }

    fn swap_chain_desc(&self, swap_chain: &Self::SwapChain) -> Result<SwapChainDesc> {
        let mut desc: DXGI_SWAP_CHAIN_DESC = unsafe { std::mem::zeroed() };
        let hr = unsafe { swap_chain.GetDesc(&mut desc) };
        check(hr, "IDXGISwapChain::GetDesc", HookError::DeviceQueryFailure)?;
        Ok(SwapChainDesc {
            buffer_count: desc.BufferCount,
            format: desc.BufferDesc.Format,
            width: desc.BufferDesc.Width,
            height: desc.BufferDesc.Height,
            window: WindowHandle(desc.OutputWindow as usize),
        })
    }

    fn swap_chain_buffer(
        &self,
        swap_chain: &Self::SwapChain,
        index: u32,
    ) -> Result<Self::Resource> {
        let mut out: *mut c_void = null_mut();
        unsafe {
            let hr = swap_chain.GetBuffer(index, &ID3D12Resource::uuidof(), &mut out);
            check(hr, "IDXGISwapChain::GetBuffer", HookError::DeviceQueryFailure)?;
            adopt(out, "IDXGISwapChain::GetBuffer", HookError::DeviceQueryFailure)
        }
    }

    fn current_back_buffer_index(&self, swap_chain: &Self::SwapChain) -> u32 {
        unsafe { swap_chain.GetCurrentBackBufferIndex() }
    }

    fn create_descriptor_heap(
        &self,
        device: &Self::Device,
        kind: HeapKind,
        count: u32,
    ) -> Result<Self::DescriptorHeap> {
        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: heap_type(kind),
            NumDescriptors: count,
            Flags: match kind {
                HeapKind::ShaderVisible => D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
                HeapKind::RenderTarget => D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
            },
            NodeMask: 0,
        };
        let mut out: *mut c_void = null_mut();
        unsafe {
            let hr =
                device.CreateDescriptorHeap(&desc, &ID3D12DescriptorHeap::uuidof(), &mut out);
            check(hr, "CreateDescriptorHeap", HookError::ResourceCreationFailure)?;
            adopt(out, "CreateDescriptorHeap", HookError::ResourceCreationFailure)
        }
    }

    fn heap_cpu_start(&self, heap: &Self::DescriptorHeap) -> CpuDescriptor {
        let h = unsafe { cpu_heap_start(heap.as_ptr()) };
        CpuDescriptor { ptr: h.ptr }
    }

    fn heap_gpu_start(&self, heap: &Self::DescriptorHeap) -> GpuDescriptor {
        let h = unsafe { gpu_heap_start(heap.as_ptr()) };
        GpuDescriptor { ptr: h.ptr }
    }

    fn descriptor_increment(&self, device: &Self::Device, kind: HeapKind) -> u32 {
        unsafe { device.GetDescriptorHandleIncrementSize(heap_type(kind)) }
    }

    fn create_render_target_view(
        &self,
        device: &Self::Device,
        resource: &Self::Resource,
        dest: CpuDescriptor,
    ) {
        unsafe {
            device.CreateRenderTargetView(
                resource.as_ptr(),
                std::ptr::null(),
                D3D12_CPU_DESCRIPTOR_HANDLE { ptr: dest.ptr },
            )
        }
    }

    fn create_command_allocator(&self, device: &Self::Device) -> Result<Self::CommandAllocator> {
        let mut out: *mut c_void = null_mut();
        unsafe {
            let hr = device.CreateCommandAllocator(
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                &ID3D12CommandAllocator::uuidof(),
                &mut out,
            );
            check(hr, "CreateCommandAllocator", HookError::ResourceCreationFailure)?;
            adopt(out, "CreateCommandAllocator", HookError::ResourceCreationFailure)
        }
    }

    fn create_command_list(
        &self,
        device: &Self::Device,
        allocator: &Self::CommandAllocator,
    ) -> Result<Self::CommandList> {
        let mut out: *mut c_void = null_mut();
        let list: ComRef<ID3D12GraphicsCommandList> = unsafe {
            let hr = device.CreateCommandList(
                0,
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                allocator.as_ptr(),
                null_mut(),
                &ID3D12GraphicsCommandList::uuidof(),
                &mut out,
            );
            check(hr, "CreateCommandList", HookError::ResourceCreationFailure)?;
            adopt(out, "CreateCommandList", HookError::ResourceCreationFailure)?
        };
        // lists are created open
        let hr = unsafe { list.Close() };
        check(hr, "ID3D12GraphicsCommandList::Close", HookError::ResourceCreationFailure)?;
        Ok(list)
    }

    fn reset_allocator(&self, allocator: &Self::CommandAllocator) -> Result<()> {
        let hr = unsafe { allocator.Reset() };
        check(hr, "ID3D12CommandAllocator::Reset", HookError::DeviceQueryFailure)
    }

    fn reset_command_list(
        &self,
        list: &Self::CommandList,
        allocator: &Self::CommandAllocator,
    ) -> Result<()> {
        let hr = unsafe { list.Reset(allocator.as_ptr(), null_mut()) };
        check(hr, "ID3D12GraphicsCommandList::Reset", HookError::DeviceQueryFailure)
    }

    fn transition(
        &self,
        list: &Self::CommandList,
        resource: &Self::Resource,
        before: ResourceState,
        after: ResourceState,
    ) {
        unsafe {
            let mut barrier: D3D12_RESOURCE_BARRIER = std::mem::zeroed();
            barrier.Type = D3D12_RESOURCE_BARRIER_TYPE_TRANSITION;
            barrier.Flags = D3D12_RESOURCE_BARRIER_FLAG_NONE;
            let t = barrier.u.Transition_mut();
            t.pResource = resource.as_ptr();
            t.Subresource = D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES;
            t.StateBefore = resource_state(before);
            t.StateAfter = resource_state(after);
            list.ResourceBarrier(1, &barrier);
        }
    }

    fn set_render_target(&self, list: &Self::CommandList, rtv: CpuDescriptor) {
        let handle = D3D12_CPU_DESCRIPTOR_HANDLE { ptr: rtv.ptr };
        unsafe { list.OMSetRenderTargets(1, &handle, FALSE, std::ptr::null()) }
    }

    fn set_descriptor_heap(&self, list: &Self::CommandList, heap: &Self::DescriptorHeap) {
        let mut heaps = [heap.as_ptr()];
        unsafe { list.SetDescriptorHeaps(1, heaps.as_mut_ptr()) }
    }

    fn close_command_list(&self, list: &Self::CommandList) -> Result<()> {
        let hr = unsafe { list.Close() };
        check(hr, "ID3D12GraphicsCommandList::Close", HookError::DeviceQueryFailure)
    }

    fn execute(&self, queue: &Self::Queue, list: &Self::CommandList) {
        let mut lists = [list.as_ptr() as *mut ID3D12CommandList];
        unsafe { queue.ExecuteCommandLists(1, lists.as_mut_ptr()) }
    }
}
