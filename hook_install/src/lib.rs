#[macro_use]
extern crate shared_dx;

pub mod installer;
pub mod sites;

#[cfg(windows)]
pub mod minhook_patcher;

pub use installer::{CallThrough, CodePatcher, HookInstaller, HookRecord};
pub use sites::HookSites;

#[cfg(windows)]
pub use minhook_patcher::MinHookPatcher;
