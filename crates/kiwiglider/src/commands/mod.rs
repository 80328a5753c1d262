// crates/kiwiglider/src/commands/mod.rs

pub mod config;
pub mod process;
pub mod report;
