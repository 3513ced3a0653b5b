#[macro_use]
extern crate lazy_static;

pub mod error;
#[macro_use]
pub mod util;
pub mod types;
/// Platform-neutral seams over the graphics and windowing apis.
pub mod gpu;
#[cfg(windows)]
pub mod com;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
