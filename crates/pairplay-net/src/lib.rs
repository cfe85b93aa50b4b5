//! Production I/O for pairplay.
//!
//! Discovery runs over UDP broadcast beacons; each session is one QUIC
//! connection carrying a single bidirectional stream of frames. Both are
//! wrapped in [`NetDriver`], which implements [`pairplay_app::Driver`] so the
//! generic runtime can drive it.
//!
//! # Components
//!
//! - [`beacon`]: advertiser task and lazy browse stream
//! - [`QuinnTransport`]: QUIC endpoint with a throwaway self-signed identity
//! - [`NetDriver`]: the driver
//! - [`SystemEnv`]: wall clock and OS randomness

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod beacon;
mod config;
mod driver;
mod error;
mod link;
mod system_env;
mod transport;

pub use config::{DEFAULT_DISCOVERY_PORT, NetConfig};
pub use driver::NetDriver;
pub use error::NetError;
pub use system_env::SystemEnv;
pub use transport::QuinnTransport;
