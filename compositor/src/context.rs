use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use shared_dx::error::{HookError, Result};
use shared_dx::gpu::{GpuApi, WindowApi};
use shared_dx::types::{PresentState, PresentStateCell, WindowMessage};

use device_state::{DescriptorSlot, DescriptorSlots, FenceRecord, FenceTracker};

use crate::compositor::{Composed, Compositor};
use crate::guard::ReentrancyGuard;
use crate::gui::{InputHandler, OverlayGui};
use crate::wndproc::WndProcInterceptor;

/// What a present call did, for logging and tests.  The caller always calls through to the
/// host's present afterwards, whatever this says.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Composed,
    NothingToDraw,
    /// Another present (recursive or on another thread) is composing.
    Reentered,
    /// Compositing is switched off, nothing is bound yet or the call came from a swap chain
    /// other than the host's.
    Inactive,
    /// Initialization failed; state is Uninitialized and the next call retries.
    InitFailed,
    /// Ready, but this frame was abandoned.
    FrameFailed,
}

/// All overlay state for the process, owned by the module lifecycle and handed to each hook
/// body.  The hooks run on host threads we don't control, so:
///
/// * `present` takes the reentrancy guard before the compositor lock, so a nested present
///   bails out instead of deadlocking;
/// * `resize` passes straight through when the guard is held by its own thread (a resize
///   issued from inside composition, e.g. by a GUI viewport) and otherwise waits for the lock
///   before tearing down;
/// * the window procedure only reads the atomic state and the interceptor, never the lock;
/// * `signal` only touches the fence tracker.
pub struct OverlayContext<A: GpuApi, W: WindowApi, G: OverlayGui<A>> {
    state: PresentStateCell,
    guard: ReentrancyGuard,
    active: AtomicBool,
    compositor: Mutex<Compositor<A, W, G>>,
    fences: FenceTracker<A::Queue, A::Fence>,
    host_swap_chain: Mutex<Option<A::SwapChain>>,
    wndproc: WndProcInterceptor,
    input: Arc<G::Input>,
    slots: Arc<Mutex<DescriptorSlots>>,
}

impl<A: GpuApi, W: WindowApi, G: OverlayGui<A>> OverlayContext<A, W, G> {
    /// `replacement_wndproc` is the address of the window procedure that forwards into
    /// `window_message`.
    pub fn new(api: A, windows: W, gui: G, srv_capacity: u32, replacement_wndproc: usize) -> Self {
        let input = gui.input_handler();
        let compositor = Compositor::new(api, windows, gui, srv_capacity);
        let slots = compositor.slots();
        OverlayContext {
            state: PresentStateCell::new(),
            guard: ReentrancyGuard::new(),
            active: AtomicBool::new(true),
            compositor: Mutex::new(compositor),
            fences: FenceTracker::new(),
            host_swap_chain: Mutex::new(None),
            wndproc: WndProcInterceptor::new(replacement_wndproc),
            input,
            slots,
        }
    }

    fn lock_compositor(&self) -> Result<MutexGuard<Compositor<A, W, G>>> {
        self.compositor.lock().map_err(|_| HookError::GlobalLockError)
    }

    pub fn state(&self) -> PresentState {
        self.state.get()
    }

    /// Bind the queue the host presents with.  Composition is submitted to it and only its
    /// signals are tracked.
    pub fn bind_queue(&self, queue: A::Queue) {
        self.fences.bind(queue);
    }

    /// Bind the swap chain the host presents its frames with.  Present and resize calls from
    /// any other swap chain pass through untouched.
    pub fn bind_swap_chain(&self, swap_chain: A::SwapChain) {
        match self.host_swap_chain.lock() {
            Ok(mut sc) => *sc = Some(swap_chain),
            Err(_) => log_error!("bind_swap_chain: {:?}", HookError::GlobalLockError),
        }
    }

    fn is_host_swap_chain<K: ?Sized>(&self, swap_chain: &K) -> bool
    where
        A::SwapChain: PartialEq<K>,
    {
        match self.host_swap_chain.lock() {
            Ok(sc) => sc.as_ref().map_or(false, |sc| sc == swap_chain),
            Err(_) => false,
        }
    }

    /// Presentation hook body.  Initializes on the first call (and the first after a resize),
    /// then composes.
    pub fn present(&self, swap_chain: &A::SwapChain) -> PresentOutcome {
        if !self.active.load(Ordering::Acquire) {
            return PresentOutcome::Inactive;
        }
        if !self.is_host_swap_chain(swap_chain) {
            return PresentOutcome::Inactive;
        }
        let _scope = match self.guard.enter() {
            Some(s) => s,
            None => return PresentOutcome::Reentered,
        };
        let queue = match self.fences.bound_queue() {
            Some(q) => q,
            None => return PresentOutcome::Inactive,
        };
        let mut comp = match self.lock_compositor() {
            Ok(c) => c,
            Err(e) => {
                log_error!("present: {:?}", e);
                return PresentOutcome::FrameFailed;
            }
        };

        if self.state.get() != PresentState::Ready {
            self.state.set(PresentState::Initializing);
            if let Err(e) = comp.initialize(swap_chain, &queue, &self.wndproc) {
                log_error!("overlay initialization failed, will retry: {:?}", e);
                self.state.set(PresentState::Uninitialized);
                return PresentOutcome::InitFailed;
            }
            self.state.set(PresentState::Ready);
        }

        match comp.compose(swap_chain) {
            Ok(Composed::Drawn) => PresentOutcome::Composed,
            Ok(Composed::NothingToDraw) => PresentOutcome::NothingToDraw,
            Err(e) => {
                log_error!("overlay frame abandoned: {:?}", e);
                PresentOutcome::FrameFailed
            }
        }
    }

    /// Resize hook body; runs before the host's resize.  Leaves no gpu object referencing the
    /// old buffers of the host's swap chain; other swap chains are ignored.
    pub fn resize<K: ?Sized>(&self, swap_chain: &K)
    where
        A::SwapChain: PartialEq<K>,
    {
        if !self.is_host_swap_chain(swap_chain) {
            log_trace!("resize of another swap chain; passing through");
            return;
        }
        if self.guard.held_by_current_thread() {
            log_debug!("resize from inside composition; passing through");
            return;
        }
        let mut comp = match self.lock_compositor() {
            Ok(c) => c,
            Err(e) => {
                log_error!("resize: {:?}", e);
                return;
            }
        };
        if self.state.get() == PresentState::Ready {
            self.state.set(PresentState::Uninitialized);
            comp.teardown();
            self.fences.reset();
            log_debug!("swap chain resizing; overlay torn down");
        }
    }

    /// Queue signal hook body.  Purely observational.
    pub fn signal<K: ?Sized>(
        &self,
        queue: &K,
        value: u64,
        fence: impl FnOnce() -> Option<A::Fence>,
    ) -> bool
    where
        A::Queue: PartialEq<K>,
    {
        self.fences.on_signal(queue, value, fence)
    }

    pub fn fence(&self) -> FenceRecord<A::Fence> {
        self.fences.record()
    }

    /// Window procedure body.  The overlay sees the message only while Ready; `forward` is
    /// always called with the procedure the host had installed.
    pub fn window_message<R>(&self, msg: &WindowMessage, forward: impl FnOnce(usize) -> R) -> R {
        if self.state.is_ready() && self.active.load(Ordering::Acquire) {
            self.input.handle(msg);
        }
        forward(self.wndproc.previous())
    }

    pub fn window_proc_replacement(&self) -> usize {
        self.wndproc.replacement()
    }

    /// A slot in the shader-visible heap for a texture.  Safe to call from inside the
    /// renderer callback.
    pub fn allocate_texture_slot(&self) -> Option<DescriptorSlot> {
        if !self.state.is_ready() {
            return None;
        }
        match self.slots.lock() {
            Ok(mut s) => s.allocate(),
            Err(_) => None,
        }
    }

    pub fn free_texture_slot(&self, index: u32) {
        if let Ok(mut s) = self.slots.lock() {
            s.free(index);
        }
    }

    /// Stop compositing and release gpu objects.  Hooks stay installed and keep calling
    /// through.
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::Release);
        if self.guard.held_by_current_thread() {
            return;
        }
        match self.lock_compositor() {
            Ok(mut comp) => {
                self.state.set(PresentState::Uninitialized);
                comp.teardown();
                self.fences.reset();
            }
            Err(e) => log_error!("shutdown: {:?}", e),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Number of frame contexts.  Waits for any composition in progress.
    pub fn frame_count(&self) -> usize {
        self.lock_compositor().map(|c| c.frame_count()).unwrap_or(0)
    }

    /// Run `f` with the compositor locked.
    pub fn with_compositor<R>(&self, f: impl FnOnce(&Compositor<A, W, G>) -> R) -> Result<R> {
        let comp = self.lock_compositor()?;
        Ok(f(&comp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_gui::{GuiEvent, MockGui};
    use shared_dx::mock::{MockCall, MockGpu, MockHandle, MockOp, MockSwapChain, MockWindows};
    use shared_dx::types::{HeapKind, ResourceState, Size, WindowHandle};
    use std::sync::Arc;

    type Ctx = OverlayContext<MockGpu, MockWindows, MockGui>;

    const HOST_PROC: usize = 0x4000;
    const OUR_PROC: usize = 0x5000;
    const WINDOW: WindowHandle = WindowHandle(0x77);

    struct Fixture {
        gpu: MockGpu,
        windows: MockWindows,
        gui: MockGui,
        sc: MockSwapChain,
        queue: MockHandle,
        ctx: Arc<Ctx>,
    }

    fn fixture(buffers: u32) -> Fixture {
        let gpu = MockGpu::new();
        let windows = MockWindows::new();
        windows.add_window(WINDOW, Size::new(1600, 900), false, HOST_PROC);
        let gui = MockGui::new();
        let sc = MockSwapChain::new(WINDOW, buffers, 1920, 1080);
        let ctx = Arc::new(OverlayContext::new(
            gpu.clone(),
            windows.clone(),
            gui.clone(),
            256,
            OUR_PROC,
        ));
        let queue = gpu.new_queue();
        ctx.bind_queue(queue.clone());
        ctx.bind_swap_chain(sc.clone());
        Fixture {
            gpu,
            windows,
            gui,
            sc,
            queue,
            ctx,
        }
    }

    #[test]
    fn test_first_present_initializes() {
        let f = fixture(3);
        assert_eq!(f.ctx.state(), PresentState::Uninitialized);
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        assert_eq!(f.ctx.state(), PresentState::Ready);
        assert_eq!(f.ctx.frame_count(), 3);
        assert_eq!(f.windows.window_proc(WINDOW), OUR_PROC);
        assert_eq!(f.gui.count(&GuiEvent::CreateContext), 1);

        // font atlas gets the first slot of the srv heap
        let init = f
            .gui
            .events()
            .into_iter()
            .find(|e| matches!(e, GuiEvent::InitBackend { .. }))
            .expect("doh");
        match init {
            GuiEvent::InitBackend { buffers, font } => {
                assert_eq!(buffers, 3);
                assert_eq!(font.index, 0);
            }
            _ => unreachable!(),
        }

        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        assert_eq!(f.ctx.frame_count(), 3);
        assert_eq!(f.gui.draws(), 2);
    }

    #[test]
    fn test_compose_records_in_order() {
        let f = fixture(3);
        f.ctx.present(&f.sc);
        f.gpu.clear_calls();
        f.sc.set_current(1);

        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        let calls = f.gpu.calls();
        let buffer = f.sc.buffer_id(1);

        assert!(matches!(calls[0], MockCall::ResetAllocator(_)));
        assert!(matches!(calls[1], MockCall::ResetCommandList { .. }));
        assert_eq!(
            calls[2],
            MockCall::Transition {
                resource: buffer,
                before: ResourceState::Present,
                after: ResourceState::RenderTarget
            }
        );
        assert!(matches!(calls[3], MockCall::SetRenderTarget(_)));
        assert!(matches!(calls[4], MockCall::SetDescriptorHeap(_)));
        assert_eq!(
            calls[5],
            MockCall::Transition {
                resource: buffer,
                before: ResourceState::RenderTarget,
                after: ResourceState::Present
            }
        );
        assert!(matches!(calls[6], MockCall::CloseCommandList(_)));
        match calls[7] {
            MockCall::Execute { queue, .. } => assert_eq!(queue, f.queue.id()),
            ref c => panic!("expected execute, got {:?}", c),
        }
        assert_eq!(calls.len(), 8);
        assert_eq!(
            f.ctx.with_compositor(|c| c.device().map(|d| d.buffer_count)).expect("doh"),
            Some(3)
        );
    }

    #[test]
    fn test_rtv_matches_back_buffer() {
        let f = fixture(4);
        f.ctx.present(&f.sc);
        let views: Vec<_> = f
            .gpu
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::CreateRenderTargetView { resource, dest } => Some((resource, dest)),
                _ => None,
            })
            .collect();
        assert_eq!(views.len(), 4);
        for i in 0..4u32 {
            f.gpu.clear_calls();
            f.sc.set_current(i);
            f.ctx.present(&f.sc);
            let bound = f
                .gpu
                .calls()
                .into_iter()
                .find_map(|c| match c {
                    MockCall::SetRenderTarget(d) => Some(d),
                    _ => None,
                })
                .expect("doh");
            assert_eq!(bound, views[i as usize].1);
            assert_eq!(views[i as usize].0, f.sc.buffer_id(i));
        }
    }

    #[test]
    fn test_resize_scenario() {
        let f = fixture(3);
        let baseline = f.gpu.live_handles();
        f.ctx.present(&f.sc);
        f.ctx.signal(&f.queue, 9, || Some(f.gpu.new_fence()));

        f.ctx.resize(&f.sc);
        assert_eq!(f.ctx.state(), PresentState::Uninitialized);
        assert_eq!(f.ctx.frame_count(), 0);
        assert_eq!(f.gui.count(&GuiEvent::Shutdown), 1);
        assert_eq!(f.ctx.fence().value, 0);
        assert_eq!(f.gpu.live_handles(), baseline);

        // host reallocates with fewer buffers
        f.sc.resize(2, 1280, 720);
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        assert_eq!(f.ctx.state(), PresentState::Ready);
        assert_eq!(f.ctx.frame_count(), 2);

        // views now point at the new buffers
        let views: Vec<u64> = f
            .gpu
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::CreateRenderTargetView { resource, .. } => Some(resource),
                _ => None,
            })
            .collect();
        assert_eq!(&views[3..], &[f.sc.buffer_id(0), f.sc.buffer_id(1)]);

        // window proc replaced exactly once; still forwards to the host's
        assert_eq!(f.windows.window_proc(WINDOW), OUR_PROC);
        let prev = f.ctx.window_message(
            &WindowMessage {
                window: WINDOW,
                msg: 0x100,
                wparam: 0,
                lparam: 0,
            },
            |p| p,
        );
        assert_eq!(prev, HOST_PROC);
        // the context survives resizes, the queue binding too
        assert_eq!(f.gui.count(&GuiEvent::CreateContext), 1);
        assert!(f.ctx.signal(&f.queue, 10, || None));
    }

    #[test]
    fn test_resize_when_not_ready_is_noop() {
        let f = fixture(3);
        f.ctx.resize(&f.sc);
        assert_eq!(f.ctx.state(), PresentState::Uninitialized);
        assert_eq!(f.gui.count(&GuiEvent::Shutdown), 0);
    }

    #[test]
    fn test_init_failure_retries() {
        let f = fixture(3);
        let baseline = f.gpu.live_handles();
        f.gpu.fail(MockOp::CreateHeap(HeapKind::RenderTarget));

        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::InitFailed);
        assert_eq!(f.ctx.state(), PresentState::Uninitialized);
        assert_eq!(f.ctx.frame_count(), 0);
        assert_eq!(f.gpu.live_handles(), baseline);
        assert_eq!(f.gui.draws(), 0);
        // host window untouched until initialization completes
        assert_eq!(f.windows.window_proc(WINDOW), HOST_PROC);

        f.gpu.clear_failures();
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        assert_eq!(f.ctx.frame_count(), 3);
    }

    #[test]
    fn test_backend_failure_releases_frames() {
        let f = fixture(2);
        let baseline = f.gpu.live_handles();
        f.gui.settings().fail_backend = true;
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::InitFailed);
        assert_eq!(f.ctx.frame_count(), 0);
        assert_eq!(f.gpu.live_handles(), baseline);
        // backend never came up, so it isn't shut down
        assert_eq!(f.gui.count(&GuiEvent::Shutdown), 0);

        f.gui.settings().fail_backend = false;
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
    }

    #[test]
    fn test_wndproc_failure_is_init_failure() {
        let f = fixture(2);
        f.windows.fail(MockOp::SetWindowProc);
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::InitFailed);
        assert_eq!(f.gui.count(&GuiEvent::Shutdown), 1);
        f.windows.clear_failures();
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
    }

    #[test]
    fn test_frame_failure_stays_ready() {
        let f = fixture(3);
        f.ctx.present(&f.sc);
        f.gpu.fail_nth(MockOp::ResetCommandList, 0);
        f.gpu.clear_calls();

        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::FrameFailed);
        assert_eq!(f.ctx.state(), PresentState::Ready);
        assert_eq!(f.ctx.frame_count(), 3);
        assert!(!f
            .gpu
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::Execute { .. })));

        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        // one backend bring-up for all of that
        let inits = f
            .gui
            .events()
            .iter()
            .filter(|e| matches!(e, GuiEvent::InitBackend { .. }))
            .count();
        assert_eq!(inits, 1);
    }

    #[test]
    fn test_nothing_to_draw() {
        let f = fixture(3);
        f.gui.settings().draw = false;
        f.gpu.clear_calls();
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::NothingToDraw);
        assert_eq!(f.ctx.state(), PresentState::Ready);
        assert!(!f
            .gpu
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::Execute { .. } | MockCall::ResetAllocator(_))));
    }

    #[test]
    fn test_viewports_after_submission() {
        let f = fixture(3);
        f.gui.settings().viewports = true;
        f.ctx.present(&f.sc);
        let ev = f.gui.events();
        let draw = ev
            .iter()
            .position(|e| matches!(e, GuiEvent::RenderDrawData(_)))
            .expect("doh");
        let pw = ev
            .iter()
            .position(|e| *e == GuiEvent::PlatformWindows)
            .expect("doh");
        assert!(pw > draw);
    }

    #[test]
    fn test_recursive_present_is_skipped() {
        let f = fixture(3);
        f.ctx.present(&f.sc);

        let outcomes = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o2 = outcomes.clone();
        let ctx = f.ctx.clone();
        let sc = f.sc.clone();
        f.gui.settings().on_render = Some(Box::new(move || {
            o2.lock().expect("doh").push(ctx.present(&sc));
        }));

        let draws = f.gui.draws();
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        assert_eq!(
            *outcomes.lock().expect("doh"),
            vec![PresentOutcome::Reentered]
        );
        assert_eq!(f.gui.draws(), draws + 1);

        // guard cleared after the outer call
        f.gui.settings().on_render = None;
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        assert_eq!(f.gui.draws(), draws + 2);
    }

    #[test]
    fn test_resize_inside_composition_passes_through() {
        let f = fixture(3);
        f.ctx.present(&f.sc);
        let ctx = f.ctx.clone();
        let sc = f.sc.clone();
        f.gui.settings().on_render = Some(Box::new(move || ctx.resize(&sc)));

        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        assert_eq!(f.ctx.state(), PresentState::Ready);
        assert_eq!(f.ctx.frame_count(), 3);
        f.gui.settings().on_render = None;
    }

    #[test]
    fn test_present_on_other_thread_while_composing() {
        let f = fixture(3);
        f.ctx.present(&f.sc);
        let ctx = f.ctx.clone();
        let sc = f.sc.clone();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let s2 = seen.clone();
        f.gui.settings().on_render = Some(Box::new(move || {
            let ctx = ctx.clone();
            let sc = sc.clone();
            let r = std::thread::spawn(move || ctx.present(&sc))
                .join()
                .expect("doh");
            *s2.lock().expect("doh") = Some(r);
        }));
        f.ctx.present(&f.sc);
        f.gui.settings().on_render = None;
        assert_eq!(*seen.lock().expect("doh"), Some(PresentOutcome::Reentered));
    }

    #[test]
    fn test_fence_correlation() {
        let f = fixture(3);
        let other = f.gpu.new_queue();
        let fence = f.gpu.new_fence();

        assert!(!f.ctx.signal(&other, 5, || Some(fence.clone())));
        assert_eq!(f.ctx.fence().value, 0);
        assert!(f.ctx.signal(&f.queue, 1, || Some(fence.clone())));
        assert!(f.ctx.signal(&f.queue, 2, || Some(fence.clone())));
        assert!(!f.ctx.signal(&other, 50, || None));
        let rec = f.ctx.fence();
        assert_eq!(rec.value, 2);
        assert_eq!(rec.fence.map(|h| h.id()), Some(fence.id()));
    }

    #[test]
    fn test_window_messages() {
        let f = fixture(3);
        let msg = WindowMessage {
            window: WINDOW,
            msg: 0x201,
            wparam: 1,
            lparam: 0x00400040,
        };
        // not ready: host still gets it, overlay doesn't
        assert_eq!(f.ctx.window_message(&msg, |p| p + 1), 1);
        assert!(f.gui.input().msgs.lock().expect("doh").is_empty());

        f.ctx.present(&f.sc);
        assert_eq!(f.ctx.window_message(&msg, |p| p), HOST_PROC);
        assert_eq!(*f.gui.input().msgs.lock().expect("doh"), vec![msg]);

        f.ctx.resize(&f.sc);
        f.ctx.window_message(&msg, |p| p);
        assert_eq!(f.gui.input().msgs.lock().expect("doh").len(), 1);
    }

    #[test]
    fn test_no_queue_is_inactive() {
        let gpu = MockGpu::new();
        let windows = MockWindows::new();
        windows.add_window(WINDOW, Size::new(1, 1), false, HOST_PROC);
        let ctx: Ctx = OverlayContext::new(gpu, windows, MockGui::new(), 16, OUR_PROC);
        let sc = MockSwapChain::new(WINDOW, 2, 1, 1);
        assert_eq!(ctx.present(&sc), PresentOutcome::Inactive);
        assert_eq!(ctx.state(), PresentState::Uninitialized);
    }

    #[test]
    fn test_other_swap_chain_passes_through() {
        let f = fixture(3);
        const TOOL_WINDOW: WindowHandle = WindowHandle(0x78);
        f.windows.add_window(TOOL_WINDOW, Size::new(640, 480), false, HOST_PROC);
        let other = MockSwapChain::new(TOOL_WINDOW, 2, 640, 480);

        // not bound: never initializes against it
        assert_eq!(f.ctx.present(&other), PresentOutcome::Inactive);
        assert_eq!(f.ctx.state(), PresentState::Uninitialized);
        assert!(f.gpu.calls().is_empty());

        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Composed);
        f.gpu.clear_calls();
        let draws = f.gui.draws();

        assert_eq!(f.ctx.present(&other), PresentOutcome::Inactive);
        assert!(f.gpu.calls().is_empty());
        assert_eq!(f.gui.draws(), draws);
        assert_eq!(f.windows.window_proc(TOOL_WINDOW), HOST_PROC);

        // its resize leaves the host's frames alone
        f.ctx.resize(&other);
        assert_eq!(f.ctx.state(), PresentState::Ready);
        assert_eq!(f.ctx.frame_count(), 3);
        assert_eq!(f.gui.count(&GuiEvent::Shutdown), 0);

        // a clone is the same swap chain
        assert_eq!(f.ctx.present(&f.sc.clone()), PresentOutcome::Composed);
        f.ctx.resize(&f.sc.clone());
        assert_eq!(f.ctx.state(), PresentState::Uninitialized);
    }

    #[test]
    fn test_no_swap_chain_is_inactive() {
        let gpu = MockGpu::new();
        let windows = MockWindows::new();
        windows.add_window(WINDOW, Size::new(1, 1), false, HOST_PROC);
        let ctx: Ctx = OverlayContext::new(gpu.clone(), windows, MockGui::new(), 16, OUR_PROC);
        ctx.bind_queue(gpu.new_queue());
        let sc = MockSwapChain::new(WINDOW, 2, 1, 1);
        assert_eq!(ctx.present(&sc), PresentOutcome::Inactive);
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn test_texture_slots() {
        let f = fixture(3);
        assert!(f.ctx.allocate_texture_slot().is_none());
        f.ctx.present(&f.sc);
        let a = f.ctx.allocate_texture_slot().expect("doh");
        assert_eq!(a.index, 1);
        f.ctx.free_texture_slot(a.index);
        assert_eq!(f.ctx.allocate_texture_slot().expect("doh").index, 1);

        f.ctx.resize(&f.sc);
        assert!(f.ctx.allocate_texture_slot().is_none());
        f.ctx.present(&f.sc);
        assert_eq!(f.ctx.allocate_texture_slot().expect("doh").index, 1);
    }

    #[test]
    fn test_texture_slot_from_renderer() {
        let f = fixture(3);
        f.ctx.present(&f.sc);
        let ctx = f.ctx.clone();
        let got = Arc::new(std::sync::Mutex::new(None));
        let g2 = got.clone();
        f.gui.settings().on_render = Some(Box::new(move || {
            *g2.lock().expect("doh") = ctx.allocate_texture_slot();
        }));
        f.ctx.present(&f.sc);
        f.gui.settings().on_render = None;
        assert!(got.lock().expect("doh").is_some());
    }

    #[test]
    fn test_shutdown() {
        let f = fixture(3);
        let baseline = f.gpu.live_handles();
        f.ctx.present(&f.sc);
        f.ctx.shutdown();
        assert!(!f.ctx.is_active());
        assert_eq!(f.ctx.state(), PresentState::Uninitialized);
        assert_eq!(f.ctx.frame_count(), 0);
        assert_eq!(f.gpu.live_handles(), baseline);
        assert_eq!(f.ctx.present(&f.sc), PresentOutcome::Inactive);
        // hooks keep forwarding to the host
        let msg = WindowMessage {
            window: WINDOW,
            msg: 0x100,
            wparam: 0,
            lparam: 0,
        };
        assert_eq!(f.ctx.window_message(&msg, |p| p), HOST_PROC);
    }
}
