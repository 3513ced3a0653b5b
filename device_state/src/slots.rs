use shared_dx::types::{CpuDescriptor, GpuDescriptor};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorSlot {
    pub index: u32,
    pub cpu: CpuDescriptor,
    pub gpu: GpuDescriptor,
}

/// Hands out slots of the shader-visible heap to the texture manager.  Slot 0 belongs to the
/// GUI font atlas and is never handed out.
#[derive(Debug, Default)]
pub struct DescriptorSlots {
    cpu_start: CpuDescriptor,
    gpu_start: GpuDescriptor,
    increment: u32,
    used: Vec<bool>,
}

impl DescriptorSlots {
    /// No heap; every allocation fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        cpu_start: CpuDescriptor,
        gpu_start: GpuDescriptor,
        increment: u32,
        capacity: u32,
    ) -> Self {
        let mut used = vec![false; capacity as usize];
        if let Some(font) = used.first_mut() {
            *font = true;
        }
        DescriptorSlots {
            cpu_start,
            gpu_start,
            increment,
            used,
        }
    }

    fn slot(&self, index: u32) -> DescriptorSlot {
        DescriptorSlot {
            index,
            cpu: self.cpu_start.offset(index, self.increment),
            gpu: self.gpu_start.offset(index, self.increment),
        }
    }

    pub fn font_slot(&self) -> Option<DescriptorSlot> {
        if self.used.is_empty() {
            None
        } else {
            Some(self.slot(0))
        }
    }

    pub fn allocate(&mut self) -> Option<DescriptorSlot> {
        let index = self.used.iter().position(|u| !*u)?;
        self.used[index] = true;
        Some(self.slot(index as u32))
    }

    /// Return a slot.  Freeing slot 0 or an unknown slot does nothing.
    pub fn free(&mut self, index: u32) {
        if index == 0 {
            return;
        }
        if let Some(u) = self.used.get_mut(index as usize) {
            *u = false;
        }
    }

    pub fn capacity(&self) -> u32 {
        self.used.len() as u32
    }

    pub fn in_use(&self) -> u32 {
        self.used.iter().skip(1).filter(|u| **u).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate() {
        let mut s = DescriptorSlots::new(
            CpuDescriptor { ptr: 0x1000 },
            GpuDescriptor { ptr: 0x9000 },
            32,
            4,
        );
        assert_eq!(s.font_slot().expect("doh").cpu.ptr, 0x1000);
        let a = s.allocate().expect("doh");
        assert_eq!(a.index, 1);
        assert_eq!(a.cpu.ptr, 0x1020);
        assert_eq!(a.gpu.ptr, 0x9020);
        let b = s.allocate().expect("doh");
        let c = s.allocate().expect("doh");
        assert_eq!((b.index, c.index), (2, 3));
        assert!(s.allocate().is_none());
        assert_eq!(s.in_use(), 3);

        s.free(2);
        s.free(0);
        s.free(99);
        assert_eq!(s.allocate().expect("doh").index, 2);
        assert!(s.allocate().is_none());
    }

    #[test]
    fn test_empty() {
        let mut s = DescriptorSlots::empty();
        assert!(s.allocate().is_none());
        assert!(s.font_slot().is_none());
        assert_eq!(s.capacity(), 0);
    }
}
