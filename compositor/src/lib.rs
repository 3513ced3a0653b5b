//! Presentation compositor: the per-frame state machine and everything the hook bodies call
//! into.  Platform neutral; the Windows backends live in `hook_core`.
#[macro_use]
extern crate shared_dx;

pub mod compositor;
pub mod context;
pub mod core_api;
pub mod guard;
pub mod gui;
pub mod setup;
pub mod wndproc;

#[cfg(test)]
mod test_gui;

pub use compositor::{Composed, Compositor};
pub use context::{OverlayContext, PresentOutcome};
pub use core_api::{CoreApiParam, Version, LOADER_VERSION};
pub use guard::ReentrancyGuard;
pub use gui::{InputHandler, OverlayGui};
pub use setup::SetupTask;
pub use wndproc::WndProcInterceptor;
