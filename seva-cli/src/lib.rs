//! Support code for the `seva` command-line tool.
//!
//! Settings come from the environment; output formatting is kept separate
//! from command dispatch so it can be tested without a backend.

pub mod config;
pub mod output;

pub use config::Settings;
