//! Command-line surface of the `bdtest` binary

pub mod commands;
