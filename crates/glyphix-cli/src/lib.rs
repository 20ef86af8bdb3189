//! GLyphIX CLI - Operator tooling for GLyphIX key vaults
//!
//! Wraps a passphrase-protected vault file with commands for key
//! management, sealing, shard splitting, presence-gated access and
//! glyph bindings.

pub mod commands;
pub mod context;

pub use commands::{execute, Cli, Commands};
pub use context::Context;
