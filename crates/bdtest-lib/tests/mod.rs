//! Test suite for bdtest-lib
//!
//! - `common`: shared helpers for building suites and running them
//! - `integration`: end-to-end tests of define resolution, permutation
//!   enumeration and the run driver

pub mod common;
pub mod integration;
