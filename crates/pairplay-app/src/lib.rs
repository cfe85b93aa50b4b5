//! Application layer for pairplay
//!
//! A generic runtime that owns the session, the move channel and the open
//! game, and serializes everything that can change them: operator commands,
//! transport and discovery events, and the connection deadline. The same
//! runtime runs over the QUIC driver in production and the simulated LAN in
//! tests.
//!
//! # Components
//!
//! - [`Driver`]: trait for platform-specific I/O
//! - [`Runtime`]: the single event loop
//! - [`NodeHandle`]: how frontends send [`Command`]s and watch
//!   [`StatusSnapshot`]s

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod command;
mod driver;
mod error;
mod event;
mod runtime;
mod status;

pub use command::Command;
pub use driver::Driver;
pub use error::CommandError;
pub use event::DriverEvent;
pub use runtime::{NodeHandle, Runtime};
pub use status::StatusSnapshot;
