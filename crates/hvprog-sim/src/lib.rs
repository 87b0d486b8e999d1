//! hvprog-sim - Simulated targets for testing hvprog-core
//!
//! This crate provides a fake [`port`](hvprog_core::port::TargetPort)
//! implementation wired to behavioural models of the target dies, so the
//! whole engine - detection, protocol drivers, page buffering, the session
//! state machine - runs on the host with no hardware and no real
//! wall-clock delay. Delays advance a virtual clock instead, which the
//! die models use for their busy timing.

mod hvpp;
mod hvsp;
mod port;

pub use hvpp::ParallelDie;
pub use hvsp::SerialDie;
pub use port::{Die, SimPort};

#[cfg(test)]
mod tests;
