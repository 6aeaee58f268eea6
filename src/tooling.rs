//! Tooling & Integration Layer
//!
//! Command-line entry point wiring configuration, logging and the engines together.

pub mod cli;

pub use cli::{Cli, CliContext, RunReport};
