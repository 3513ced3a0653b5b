//! The loadable module.  Nearly everything here is Windows-only glue: native backends for the
//! seams the other crates define, the hook bodies, and the entry points the plugin loader
//! calls.
#![allow(non_snake_case)]
// off Windows only the platform-neutral pieces build, for their tests
#![cfg_attr(not(windows), allow(dead_code))]

#[macro_use]
extern crate shared_dx;
#[cfg(windows)]
#[macro_use]
extern crate lazy_static;

#[cfg(windows)]
extern crate winapi;

#[cfg(windows)]
mod d3d12;
#[cfg(windows)]
mod hooks;
#[cfg(windows)]
mod imgui_overlay;
mod loader;
#[cfg(windows)]
mod plugin;
#[cfg(windows)]
mod runtime;
#[cfg(windows)]
mod setup;
#[cfg(windows)]
mod window;

#[cfg(windows)]
pub use plugin::{CoreInitialize, Initialize, LoaderVersion, Uninitialize};
