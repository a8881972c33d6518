//! Process-level helpers shared by the reservation crates.

pub mod env;
pub mod utils;
