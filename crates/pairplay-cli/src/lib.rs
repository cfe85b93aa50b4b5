//! Operator console for pairplay.
//!
//! The binary reads one command per line from stdin, hands it to the runtime
//! through a [`pairplay_app::NodeHandle`] and prints status changes and
//! boards as plain text. Parsing and rendering live here so they can be
//! tested without a terminal.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod console;
pub mod render;
