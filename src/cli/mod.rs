//! CLI module
//!
//! Command-line interface for exporting Mailgun data.
//!
//! # Commands
//!
//! - `export` - Export selected data types (all by default)
//! - `events` - Export events, optionally of a single type
//! - `stats` - Export statistics
//! - `status` - Show rate limit status and configuration
//! - `test` - Test API credentials

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputArgs, ResourceSelection};
pub use runner::{failure_hint, Runner};
