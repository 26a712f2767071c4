//! CLI command handlers.

mod config;
mod poll;

pub use config::run_config;
pub use poll::{parse_header, parse_until, run_poll, UntilCondition};
