//! "Resolve symbolic operation → address".  Everything that depends on the exact host binary
//! (fixed addresses, singleton offsets, vtable slots) lives behind this crate.
#[macro_use]
extern crate shared_dx;

pub mod resolve;
pub mod singleton;
pub mod target;

pub use resolve::{AddressTable, Resolver, ResolverChain, VtableResolver};
pub use singleton::{
    discover_from_singleton, discover_render_objects, RenderObjects, SingletonLocation,
    SingletonOffsets,
};
pub use target::HookTarget;
