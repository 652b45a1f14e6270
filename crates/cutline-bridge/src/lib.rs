// crates/cutline-bridge/src/lib.rs
//
// Host ⇄ engine protocol: typed inbound requests, typed outbound calls,
// and the crossbeam channel pair that carries them. No egui, no DOM —
// just the data that crosses the boundary.

pub mod calls;
pub mod link;
pub mod requests;

pub use calls::HostCall;
pub use link::{pair, transaction_id, EngineLink, HostHandle};
pub use requests::{DispatchError, HostRequest};
