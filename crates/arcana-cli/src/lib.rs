//! Library interface for arcana-cli
//!
//! Exposes argument parsing and command handlers to the binary and tests.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Test allows"
    )
)]

/// Command-line argument definitions.
pub mod cli;
/// Command handlers.
pub mod handlers;
/// Offline provider for `--mock` readings.
pub mod offline;

pub use cli::{Cli, Commands, ReadingArgs};
