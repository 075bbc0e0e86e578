//! Command-line interface module.

mod args;
pub mod common;
pub mod inspect;
pub mod simulate;

pub use args::{Cli, Commands};
