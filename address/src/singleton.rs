use shared_dx::error::{HookError, Result};

/// Where the host keeps its gpu objects, relative to the render singleton.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SingletonOffsets {
    /// singleton → renderer
    pub renderer: usize,
    /// renderer → `ID3D12CommandQueue*`
    pub command_queue: usize,
    /// renderer → `IDXGISwapChain3*`
    pub swap_chain: usize,
}

impl Default for SingletonOffsets {
    fn default() -> Self {
        SingletonOffsets {
            renderer: 0x78,
            command_queue: 0x20,
            swap_chain: 0x1470,
        }
    }
}

/// Raw pointers to the host's live render objects.  No references are taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderObjects {
    pub renderer: usize,
    pub command_queue: usize,
    pub swap_chain: usize,
}

/// Read the pointer stored at `addr`.  A null result is a resolution failure: the host hasn't
/// created the object yet or the offsets are for a different build.
pub unsafe fn read_pointer(addr: usize, what: &str) -> Result<usize> {
    if addr == 0 {
        return Err(HookError::ResolutionFailure(format!("null address reading {}", what)));
    }
    let p = *(addr as *const usize);
    if p == 0 {
        return Err(HookError::ResolutionFailure(format!("{} is null", what)));
    }
    Ok(p)
}

/// How the render singleton was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SingletonLocation {
    /// Address of the global that holds the singleton pointer (a fixed table entry).
    Global(usize),
    /// The singleton object itself, as the loader's singleton manager hands it out.
    Object(usize),
}

impl SingletonLocation {
    /// Read through to the queue and swap chain.  The address must be readable memory in the
    /// host image.
    pub unsafe fn discover(&self, offsets: &SingletonOffsets) -> Result<RenderObjects> {
        match *self {
            SingletonLocation::Global(addr) => discover_render_objects(addr, offsets),
            SingletonLocation::Object(addr) => discover_from_singleton(addr, offsets),
        }
    }
}

/// Walk from the global holding the render singleton to the queue and swap chain.
/// `singleton_global` must be readable memory in the host image.
pub unsafe fn discover_render_objects(
    singleton_global: usize,
    offsets: &SingletonOffsets,
) -> Result<RenderObjects> {
    let singleton = read_pointer(singleton_global, "render singleton")?;
    discover_from_singleton(singleton, offsets)
}

/// Same walk, starting at the singleton object.
pub unsafe fn discover_from_singleton(
    singleton: usize,
    offsets: &SingletonOffsets,
) -> Result<RenderObjects> {
    if singleton == 0 {
        return Err(HookError::ResolutionFailure("render singleton is null".to_owned()));
    }
    let renderer = read_pointer(singleton + offsets.renderer, "renderer")?;
    let command_queue = read_pointer(renderer + offsets.command_queue, "command queue")?;
    let swap_chain = read_pointer(renderer + offsets.swap_chain, "swap chain")?;
    log_debug!(
        "render objects: renderer {:x}, queue {:x}, swap chain {:x}",
        renderer,
        command_queue,
        swap_chain
    );
    Ok(RenderObjects {
        renderer,
        command_queue,
        swap_chain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover() {
        let offsets = SingletonOffsets {
            renderer: 2 * 8,
            command_queue: 1 * 8,
            swap_chain: 3 * 8,
        };
        let mut renderer = [0usize; 4];
        renderer[1] = 0xAAAA;
        renderer[3] = 0xBBBB;
        let mut singleton = [0usize; 4];
        singleton[2] = renderer.as_ptr() as usize;
        let global: [usize; 1] = [singleton.as_ptr() as usize];

        let objs = unsafe { discover_render_objects(global.as_ptr() as usize, &offsets) }
            .expect("doh");
        assert_eq!(objs.renderer, renderer.as_ptr() as usize);
        assert_eq!(objs.command_queue, 0xAAAA);
        assert_eq!(objs.swap_chain, 0xBBBB);

        // swap chain not created yet
        renderer[3] = 0;
        let r = unsafe { discover_render_objects(global.as_ptr() as usize, &offsets) };
        assert!(matches!(r, Err(HookError::ResolutionFailure(_))));
    }

    #[test]
    fn test_location() {
        let offsets = SingletonOffsets {
            renderer: 8,
            command_queue: 0,
            swap_chain: 8,
        };
        let renderer: [usize; 2] = [0x1111, 0x2222];
        let singleton: [usize; 2] = [0, renderer.as_ptr() as usize];
        let global: [usize; 1] = [singleton.as_ptr() as usize];

        let from_global =
            unsafe { SingletonLocation::Global(global.as_ptr() as usize).discover(&offsets) }
                .expect("doh");
        let from_object =
            unsafe { SingletonLocation::Object(singleton.as_ptr() as usize).discover(&offsets) }
                .expect("doh");
        assert_eq!(from_global, from_object);
        assert_eq!(from_object.command_queue, 0x1111);
        assert_eq!(from_object.swap_chain, 0x2222);

        let r = unsafe { SingletonLocation::Object(0).discover(&offsets) };
        assert!(matches!(r, Err(HookError::ResolutionFailure(_))));
    }

    #[test]
    fn test_default_offsets() {
        let o = SingletonOffsets::default();
        assert_eq!((o.renderer, o.command_queue, o.swap_chain), (0x78, 0x20, 0x1470));
    }
}
