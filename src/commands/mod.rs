//! Command-line front end
//!
//! Parses `rax-store` arguments and runs them against a [`crate::storage::LocalStorage`].

mod handlers;
mod parser;

pub use handlers::execute;
pub use parser::{Command, USAGE, parse_args, parse_command};
