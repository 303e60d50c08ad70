//! Module Exports
//!
//! This file exports the modules that turn bytes from the serial link into
//! drive commands.
//!
//! # Modules
//! - `command`: line grammar, parsed commands and reply text.
//! - `channel`: fixed-capacity byte queue and line assembly.

pub mod channel;
/// Line grammar for `hello` and `L,R` commands.
pub mod command;

pub use channel::{CommandChannel, Inbound};
pub use command::{Command, CommandError, Reply, HANDSHAKE_REPLY, USAGE_REPLY};
