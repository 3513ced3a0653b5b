/*
Plain data shared by the device, compositor and hook crates.  Nothing in here touches a
native api, so all of it is usable (and testable) off-Windows.
 */
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Native window handle, stored as an integer so it can cross threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(pub usize);

impl WindowHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// CPU-side descriptor handle (`D3D12_CPU_DESCRIPTOR_HANDLE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct CpuDescriptor {
    pub ptr: usize,
}

impl CpuDescriptor {
    /// Handle of slot `index` in a heap starting at `self`.
    pub fn offset(self, index: u32, increment: u32) -> Self {
        CpuDescriptor {
            ptr: self.ptr + index as usize * increment as usize,
        }
    }
}

/// GPU-side descriptor handle (`D3D12_GPU_DESCRIPTOR_HANDLE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct GpuDescriptor {
    pub ptr: u64,
}

impl GpuDescriptor {
    pub fn offset(self, index: u32, increment: u32) -> Self {
        GpuDescriptor {
            ptr: self.ptr + index as u64 * increment as u64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// CBV/SRV/UAV heap bound while drawing the overlay.
    ShaderVisible,
    /// One render-target view per swap buffer, never shader visible.
    RenderTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Present,
    RenderTarget,
}

/// What the presentation surface reports about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub buffer_count: u32,
    /// Raw `DXGI_FORMAT` value.
    pub format: u32,
    pub width: u32,
    pub height: u32,
    pub window: WindowHandle,
}

/// One message delivered to the host window procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowMessage {
    pub window: WindowHandle,
    pub msg: u32,
    pub wparam: usize,
    pub lparam: isize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PresentState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
}

/// `PresentState` readable from any thread.  Only the compositor transitions it; the window
/// procedure and resize hook read it without taking the compositor lock.
pub struct PresentStateCell(AtomicU8);

impl PresentStateCell {
    pub const fn new() -> Self {
        PresentStateCell(AtomicU8::new(PresentState::Uninitialized as u8))
    }

    pub fn get(&self) -> PresentState {
        match self.0.load(Ordering::Acquire) {
            2 => PresentState::Ready,
            1 => PresentState::Initializing,
            _ => PresentState::Uninitialized,
        }
    }

    pub fn set(&self, state: PresentState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.get() == PresentState::Ready
    }
}

impl Default for PresentStateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_offset() {
        let start = CpuDescriptor { ptr: 0x1000 };
        assert_eq!(start.offset(0, 32), start);
        assert_eq!(start.offset(3, 32).ptr, 0x1000 + 96);
        let gstart = GpuDescriptor { ptr: 0xFFFF_0000_0000 };
        assert_eq!(gstart.offset(2, 64).ptr, 0xFFFF_0000_0080);
    }

    #[test]
    fn test_present_state_cell() {
        let cell = PresentStateCell::new();
        assert_eq!(cell.get(), PresentState::Uninitialized);
        cell.set(PresentState::Initializing);
        assert!(!cell.is_ready());
        cell.set(PresentState::Ready);
        assert!(cell.is_ready());
        cell.set(PresentState::Uninitialized);
        assert_eq!(cell.get(), PresentState::Uninitialized);
    }
}
