//! Application services layer.
//!
//! The coordinator and its helpers orchestrate the protocol facades in
//! `sonos/` into one observable control state.

pub mod coordinator;
pub(crate) mod poller;
pub mod queue_ops;
pub mod sleep_timer;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use coordinator::Coordinator;
pub use poller::advance_position;
pub use queue_ops::{reorder_request, ReorderRequest};
