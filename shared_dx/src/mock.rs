//! In-memory backend for the gpu and window seams.  Every recording call is logged, any
//! fallible operation can be made to fail, and every handle handed out is counted until it
//! drops, so tests can check both ordering and that nothing leaks.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{HookError, Result};
use crate::gpu::{GpuApi, WindowApi};
use crate::types::{
    CpuDescriptor, GpuDescriptor, HeapKind, ResourceState, Size, SwapChainDesc, WindowHandle,
};

pub const SRV_INCREMENT: u32 = 32;
pub const RTV_INCREMENT: u32 = 64;
pub const DEVICE_ID: u64 = 1;
/// `DXGI_FORMAT_R8G8B8A8_UNORM`
pub const DEFAULT_FORMAT: u32 = 28;

/// A native object reference.  Clones refer to the same object, like an AddRef'd pointer.
#[derive(Clone, Debug)]
pub struct MockHandle {
    id: u64,
    _live: Arc<()>,
}

impl MockHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for MockHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug)]
pub struct MockHeap {
    pub handle: MockHandle,
    pub kind: HeapKind,
    pub count: u32,
    cpu_start: CpuDescriptor,
    gpu_start: GpuDescriptor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    SwapChainDevice,
    SwapChainDesc,
    SwapChainBuffer,
    CreateHeap(HeapKind),
    CreateCommandAllocator,
    CreateCommandList,
    ResetAllocator,
    ResetCommandList,
    CloseCommandList,
    ClientSize,
    SetWindowProc,
}

impl MockOp {
    fn error(self) -> HookError {
        let what = format!("injected {:?} failure", self);
        match self {
            MockOp::CreateHeap(_)
            | MockOp::CreateCommandAllocator
            | MockOp::CreateCommandList => HookError::ResourceCreationFailure(what),
            MockOp::ClientSize | MockOp::SetWindowProc => HookError::WinApiError(what),
            _ => HookError::DeviceQueryFailure(what),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum FailRule {
    Always,
    Nth(usize),
}

/// Recorded gpu calls, in the order they were made.
#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    CreateHeap { kind: HeapKind, count: u32 },
    CreateRenderTargetView { resource: u64, dest: CpuDescriptor },
    CreateCommandAllocator,
    CreateCommandList,
    ResetAllocator(u64),
    ResetCommandList { list: u64, allocator: u64 },
    Transition { resource: u64, before: ResourceState, after: ResourceState },
    SetRenderTarget(CpuDescriptor),
    SetDescriptorHeap(u64),
    CloseCommandList(u64),
    Execute { queue: u64, list: u64 },
}

#[derive(Default)]
struct GpuState {
    next_id: u64,
    next_heap_base: usize,
    calls: Vec<MockCall>,
    failures: HashMap<MockOp, FailRule>,
    counts: HashMap<MockOp, usize>,
}

#[derive(Clone)]
pub struct MockGpu {
    state: Arc<Mutex<GpuState>>,
    live: Arc<()>,
}

impl Default for MockGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGpu {
    pub fn new() -> Self {
        MockGpu {
            state: Arc::new(Mutex::new(GpuState {
                next_id: 100,
                next_heap_base: 0x10_0000,
                ..Default::default()
            })),
            live: Arc::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<GpuState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, id: u64) -> MockHandle {
        MockHandle {
            id,
            _live: self.live.clone(),
        }
    }

    fn new_handle(&self) -> MockHandle {
        let id = {
            let mut st = self.lock();
            st.next_id += 1;
            st.next_id
        };
        self.handle(id)
    }

    fn record(&self, call: MockCall) {
        self.lock().calls.push(call);
    }

    fn check(&self, op: MockOp) -> Result<()> {
        let mut st = self.lock();
        let n = st.counts.entry(op).or_insert(0);
        let idx = *n;
        *n += 1;
        match st.failures.get(&op) {
            Some(FailRule::Always) => Err(op.error()),
            Some(FailRule::Nth(k)) if *k == idx => Err(op.error()),
            _ => Ok(()),
        }
    }

    /// Make every subsequent `op` fail.
    pub fn fail(&self, op: MockOp) {
        self.lock().failures.insert(op, FailRule::Always);
    }

    /// Make only the `n`th (zero based, counted from now) call of `op` fail.
    pub fn fail_nth(&self, op: MockOp, n: usize) {
        let mut st = self.lock();
        st.counts.insert(op, 0);
        st.failures.insert(op, FailRule::Nth(n));
    }

    pub fn clear_failures(&self) {
        let mut st = self.lock();
        st.failures.clear();
        st.counts.clear();
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Handles handed out by this backend that have not been dropped yet.
    pub fn live_handles(&self) -> usize {
        Arc::strong_count(&self.live) - 1
    }

    /// A command queue owned by the host.
    pub fn new_queue(&self) -> MockHandle {
        self.new_handle()
    }

    pub fn new_fence(&self) -> MockHandle {
        self.new_handle()
    }

    pub fn device(&self) -> MockHandle {
        self.handle(DEVICE_ID)
    }
}

#[derive(Clone, Copy, Debug)]
struct SwapChainState {
    desc: SwapChainDesc,
    current: u32,
    generation: u64,
}

/// Host swap chain.  Clones share state, so a test can resize or advance the one the
/// compositor is looking at.
#[derive(Clone, Debug)]
pub struct MockSwapChain {
    state: Arc<Mutex<SwapChainState>>,
}

impl MockSwapChain {
    pub fn new(window: WindowHandle, buffer_count: u32, width: u32, height: u32) -> Self {
        MockSwapChain {
            state: Arc::new(Mutex::new(SwapChainState {
                desc: SwapChainDesc {
                    buffer_count,
                    format: DEFAULT_FORMAT,
                    width,
                    height,
                    window,
                },
                current: 0,
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<SwapChainState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn desc(&self) -> SwapChainDesc {
        self.lock().desc
    }

    pub fn set_current(&self, index: u32) {
        self.lock().current = index;
    }

    /// What the host's ResizeBuffers does: new buffers, new size, back to buffer 0.
    pub fn resize(&self, buffer_count: u32, width: u32, height: u32) {
        let mut st = self.lock();
        st.desc.buffer_count = buffer_count;
        st.desc.width = width;
        st.desc.height = height;
        st.current = 0;
        st.generation += 1;
    }

    /// Id of the resource backing buffer `index` in the current generation.
    pub fn buffer_id(&self, index: u32) -> u64 {
        let st = self.lock();
        0x1000 + st.generation * 0x100 + index as u64
    }
}

/// Same swap chain, as with the native pointer compare.
impl PartialEq for MockSwapChain {
    fn eq(&self, other: &MockSwapChain) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl GpuApi for MockGpu {
    type SwapChain = MockSwapChain;
    type Device = MockHandle;
    type Queue = MockHandle;
    type Fence = MockHandle;
    type Resource = MockHandle;
    type DescriptorHeap = MockHeap;
    type CommandAllocator = MockHandle;
    type CommandList = MockHandle;

    fn swap_chain_device(&self, _swap_chain: &MockSwapChain) -> Result<MockHandle> {
        self.check(MockOp::SwapChainDevice)?;
        Ok(self.device())
    }

    fn swap_chain_desc(&self, swap_chain: &MockSwapChain) -> Result<SwapChainDesc> {
        self.check(MockOp::SwapChainDesc)?;
        Ok(swap_chain.desc())
    }

    fn swap_chain_buffer(&self, swap_chain: &MockSwapChain, index: u32) -> Result<MockHandle> {
        self.check(MockOp::SwapChainBuffer)?;
        if index >= swap_chain.desc().buffer_count {
            return Err(HookError::DeviceQueryFailure(format!("no buffer {}", index)));
        }
        Ok(self.handle(swap_chain.buffer_id(index)))
    }

    fn current_back_buffer_index(&self, swap_chain: &MockSwapChain) -> u32 {
        swap_chain.lock().current
    }

    fn create_descriptor_heap(
        &self,
        _device: &MockHandle,
        kind: HeapKind,
        count: u32,
    ) -> Result<MockHeap> {
        self.check(MockOp::CreateHeap(kind))?;
        self.record(MockCall::CreateHeap { kind, count });
        let base = {
            let mut st = self.lock();
            let b = st.next_heap_base;
            st.next_heap_base += 0x10_0000;
            b
        };
        Ok(MockHeap {
            handle: self.new_handle(),
            kind,
            count,
            cpu_start: CpuDescriptor { ptr: base },
            gpu_start: GpuDescriptor {
                ptr: 0x8000_0000_0000 + base as u64,
            },
        })
    }

    fn heap_cpu_start(&self, heap: &MockHeap) -> CpuDescriptor {
        heap.cpu_start
    }

    fn heap_gpu_start(&self, heap: &MockHeap) -> GpuDescriptor {
        heap.gpu_start
    }

    fn descriptor_increment(&self, _device: &MockHandle, kind: HeapKind) -> u32 {
        match kind {
            HeapKind::ShaderVisible => SRV_INCREMENT,
            HeapKind::RenderTarget => RTV_INCREMENT,
        }
    }

    fn create_render_target_view(
        &self,
        _device: &MockHandle,
        resource: &MockHandle,
        dest: CpuDescriptor,
    ) {
        self.record(MockCall::CreateRenderTargetView {
            resource: resource.id,
            dest,
        });
    }

    fn create_command_allocator(&self, _device: &MockHandle) -> Result<MockHandle> {
        self.check(MockOp::CreateCommandAllocator)?;
        self.record(MockCall::CreateCommandAllocator);
        Ok(self.new_handle())
    }

    fn create_command_list(
        &self,
        _device: &MockHandle,
        _allocator: &MockHandle,
    ) -> Result<MockHandle> {
        self.check(MockOp::CreateCommandList)?;
        self.record(MockCall::CreateCommandList);
        Ok(self.new_handle())
    }

    fn reset_allocator(&self, allocator: &MockHandle) -> Result<()> {
        self.check(MockOp::ResetAllocator)?;
        self.record(MockCall::ResetAllocator(allocator.id));
        Ok(())
    }

    fn reset_command_list(&self, list: &MockHandle, allocator: &MockHandle) -> Result<()> {
        self.check(MockOp::ResetCommandList)?;
        self.record(MockCall::ResetCommandList {
            list: list.id,
            allocator: allocator.id,
        });
        Ok(())
    }

    fn transition(
        &self,
        _list: &MockHandle,
        resource: &MockHandle,
        before: ResourceState,
        after: ResourceState,
    ) {
        self.record(MockCall::Transition {
            resource: resource.id,
            before,
            after,
        });
    }

    fn set_render_target(&self, _list: &MockHandle, rtv: CpuDescriptor) {
        self.record(MockCall::SetRenderTarget(rtv));
    }

    fn set_descriptor_heap(&self, _list: &MockHandle, heap: &MockHeap) {
        self.record(MockCall::SetDescriptorHeap(heap.handle.id));
    }

    fn close_command_list(&self, list: &MockHandle) -> Result<()> {
        self.check(MockOp::CloseCommandList)?;
        self.record(MockCall::CloseCommandList(list.id));
        Ok(())
    }

    fn execute(&self, queue: &MockHandle, list: &MockHandle) {
        self.record(MockCall::Execute {
            queue: queue.id,
            list: list.id,
        });
    }
}

struct MockWindow {
    size: Size,
    popup: bool,
    proc_addr: usize,
}

#[derive(Default)]
struct WindowsState {
    windows: HashMap<WindowHandle, MockWindow>,
    failing: HashSet<MockOp>,
}

/// Window table standing in for user32.
#[derive(Clone, Default)]
pub struct MockWindows {
    state: Arc<Mutex<WindowsState>>,
}

impl MockWindows {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<WindowsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_window(&self, window: WindowHandle, size: Size, popup: bool, proc_addr: usize) {
        self.lock().windows.insert(
            window,
            MockWindow {
                size,
                popup,
                proc_addr,
            },
        );
    }

    pub fn set_size(&self, window: WindowHandle, size: Size) {
        if let Some(w) = self.lock().windows.get_mut(&window) {
            w.size = size;
        }
    }

    pub fn fail(&self, op: MockOp) {
        self.lock().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    fn check(&self, op: MockOp) -> Result<()> {
        if self.lock().failing.contains(&op) {
            return Err(op.error());
        }
        Ok(())
    }
}

impl WindowApi for MockWindows {
    fn client_size(&self, window: WindowHandle) -> Result<Size> {
        self.check(MockOp::ClientSize)?;
        self.lock()
            .windows
            .get(&window)
            .map(|w| w.size)
            .ok_or_else(|| HookError::WinApiError(format!("no window {:?}", window)))
    }

    fn is_popup(&self, window: WindowHandle) -> bool {
        self.lock()
            .windows
            .get(&window)
            .map(|w| w.popup)
            .unwrap_or(false)
    }

    fn window_proc(&self, window: WindowHandle) -> usize {
        self.lock()
            .windows
            .get(&window)
            .map(|w| w.proc_addr)
            .unwrap_or(0)
    }

    fn set_window_proc(&self, window: WindowHandle, proc_addr: usize) -> Result<usize> {
        self.check(MockOp::SetWindowProc)?;
        let mut st = self.lock();
        let w = st
            .windows
            .get_mut(&window)
            .ok_or_else(|| HookError::WinApiError(format!("no window {:?}", window)))?;
        Ok(std::mem::replace(&mut w.proc_addr, proc_addr))
    }
}
