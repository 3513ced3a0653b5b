//! Recording GUI for the compositor tests.
use std::sync::{Arc, Mutex, MutexGuard};

use shared_dx::error::{HookError, Result};
use shared_dx::mock::{MockGpu, MockHandle, MockHeap};
use shared_dx::types::WindowMessage;

use device_state::{DescriptorSlot, DeviceContext};

use crate::gui::{InputHandler, OverlayGui};

#[derive(Clone, Debug, PartialEq)]
pub enum GuiEvent {
    CreateContext,
    InitBackend { buffers: u32, font: DescriptorSlot },
    Shutdown,
    NewFrame,
    Render,
    RenderDrawData(u64),
    PlatformWindows,
}

#[derive(Default)]
pub struct MockInput {
    pub msgs: Mutex<Vec<WindowMessage>>,
}

impl InputHandler for MockInput {
    fn handle(&self, msg: &WindowMessage) {
        self.msgs.lock().expect("doh").push(*msg);
    }
}

pub struct GuiSettings {
    pub events: Vec<GuiEvent>,
    pub draw: bool,
    pub viewports: bool,
    pub fail_backend: bool,
    pub on_render: Option<Box<dyn FnMut() + Send>>,
    context: bool,
}

/// Clones share settings, so a test keeps one and moves the other into the context.
#[derive(Clone)]
pub struct MockGui {
    settings: Arc<Mutex<GuiSettings>>,
    input: Arc<MockInput>,
}

impl MockGui {
    pub fn new() -> Self {
        MockGui {
            settings: Arc::new(Mutex::new(GuiSettings {
                events: Vec::new(),
                draw: true,
                viewports: false,
                fail_backend: false,
                on_render: None,
                context: false,
            })),
            input: Arc::new(MockInput::default()),
        }
    }

    pub fn settings(&self) -> MutexGuard<GuiSettings> {
        self.settings.lock().expect("doh")
    }

    pub fn events(&self) -> Vec<GuiEvent> {
        self.settings().events.clone()
    }

    pub fn count(&self, ev: &GuiEvent) -> usize {
        self.settings().events.iter().filter(|e| *e == ev).count()
    }

    pub fn draws(&self) -> usize {
        self.settings()
            .events
            .iter()
            .filter(|e| matches!(e, GuiEvent::RenderDrawData(_)))
            .count()
    }

    pub fn input(&self) -> Arc<MockInput> {
        self.input.clone()
    }

    fn push(&self, ev: GuiEvent) {
        self.settings().events.push(ev);
    }
}

impl OverlayGui<MockGpu> for MockGui {
    type DrawData = u64;
    type Input = MockInput;

    fn create_context(&mut self, _dc: &DeviceContext<MockGpu>) -> Result<()> {
        let mut s = self.settings();
        if !s.context {
            s.context = true;
            s.events.push(GuiEvent::CreateContext);
        }
        Ok(())
    }

    fn init_backend(
        &mut self,
        _api: &MockGpu,
        dc: &DeviceContext<MockGpu>,
        _srv_heap: &MockHeap,
        font: DescriptorSlot,
    ) -> Result<()> {
        if self.settings().fail_backend {
            return Err(HookError::ResourceCreationFailure("dx12 backend".to_owned()));
        }
        self.push(GuiEvent::InitBackend {
            buffers: dc.buffer_count,
            font,
        });
        Ok(())
    }

    fn shutdown_backend(&mut self) {
        self.push(GuiEvent::Shutdown);
    }

    fn new_frame(&mut self) {
        self.push(GuiEvent::NewFrame);
    }

    fn render(&mut self) -> Option<u64> {
        self.push(GuiEvent::Render);
        // run the callback unlocked; it may re-enter the context
        let cb = self.settings().on_render.take();
        if let Some(mut cb) = cb {
            cb();
            self.settings().on_render = Some(cb);
        }
        if self.settings().draw {
            Some(0xD7A)
        } else {
            None
        }
    }

    fn render_draw_data(&mut self, data: &u64, _list: &MockHandle) {
        self.push(GuiEvent::RenderDrawData(*data));
    }

    fn viewports_enabled(&self) -> bool {
        self.settings().viewports
    }

    fn render_platform_windows(&mut self, _list: &MockHandle) {
        self.push(GuiEvent::PlatformWindows);
    }

    fn input_handler(&self) -> Arc<MockInput> {
        self.input.clone()
    }
}
