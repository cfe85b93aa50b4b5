//! Deterministic simulation harness for pairplay.
//!
//! In-memory implementations of the [`pairplay_app::Driver`] and
//! [`pairplay_core::Environment`] traits, so the production runtime can be
//! driven end to end without sockets. Time is tokio's clock: run tests with
//! `#[tokio::test(start_paused = true)]` and the connection deadline fires
//! as soon as every task is idle.
//!
//! # Simulated LAN
//!
//! A [`SimLan`] is a shared medium. Each [`SimDriver`] joins it as one node;
//! beacons, offers and frames are delivered instantly and in order. Fault
//! knobs on the LAN drop invitations, fail sends or sever links.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties over a [`LanSnapshot`] of every
//! node's published status. Use [`InvariantRegistry::standard()`] for the
//! session rules that must hold after every step.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod node;
pub mod sim_env;
pub mod sim_lan;

pub use invariants::{
    ExclusiveActivity, Invariant, InvariantRegistry, InvariantResult, LanSnapshot,
    LinkSymmetry, PendingNeedsAdvertising, SeatsAreComplementary, Violation,
};
pub use node::{SimNode, settle};
pub use sim_env::SimEnv;
pub use sim_lan::{SimDriver, SimDriverError, SimLan, SimResponder};
