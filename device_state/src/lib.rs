/*
Gpu state captured from, and built against, the host's live swap chain.  None of it is global:
the compositor owns one `DeviceContext`, one `FrameResources` and one `DescriptorSlots`, and
the hook layer owns the `FenceTracker`.
 */
#[macro_use]
extern crate shared_dx;

pub mod acquire;
pub mod fence;
pub mod frames;
pub mod slots;

pub use acquire::{acquire, DeviceContext};
pub use fence::{FenceRecord, FenceTracker};
pub use frames::{FrameContext, FrameResources};
pub use slots::{DescriptorSlot, DescriptorSlots};
