//! Client module — abstract interfaces over the external collaborators.
//!
//! The supervision core talks to the container runtime and the key-value
//! store exclusively through these traits. `live.rs` wires them to the real
//! clients; `fake.rs` provides deterministic test doubles.

pub mod fake;
pub mod live;
pub mod runtime;
pub mod store;

pub use runtime::RuntimeOps;
pub use store::StoreOps;
