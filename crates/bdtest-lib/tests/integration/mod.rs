//! Integration tests for bdtest-lib
//!
//! These tests drive suites through the public API the way a generated
//! test binary does.

pub mod define_resolution_test;
pub mod permutation_properties_test;
pub mod run_driver_test;
pub mod settings_test;
