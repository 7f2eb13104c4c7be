// src/lib.rs
pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod output;
pub mod prober;
pub mod resolver;
pub mod session;
pub mod types;

pub use cli::Args;
pub use engine::{ResultStream, WpFinderEngine};
pub use types::{Config, ProbeResult, Redirect, RunStats, WpFinderError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
