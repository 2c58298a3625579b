//! Common helpers for the bdtest-lib integration tests

use bdtest_lib::{RunOptions, RunReport, Runner, TestId, TestSuite};
use std::sync::{Arc, Mutex};

/// Route library logs through the test harness' capture.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run every case of `suites`.
pub fn run_all(suites: &[TestSuite], options: RunOptions) -> RunReport {
    run_selected(suites, options, &[])
}

/// Run the cases matching `selectors`, e.g. `["suite/case:3"]`.
pub fn run_selected(suites: &[TestSuite], options: RunOptions, selectors: &[&str]) -> RunReport {
    init_logging();
    let selectors: Vec<TestId> = selectors
        .iter()
        .map(|s| s.parse().expect("invalid test id"))
        .collect();
    Runner::new(suites, options)
        .expect("failed to create runner")
        .run(&selectors)
        .expect("run aborted")
}

/// Collects values observed inside running cases.
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, value: T) {
        self.seen.lock().unwrap().push(value);
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}
