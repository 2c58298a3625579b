//! Results of a run

use crate::context::TestError;

use super::TestId;

/// What happened to one permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed { powerlosses: u32 },
    Failed { error: TestError, powerlosses: u32 },
    /// The case's filter rejected the permutation.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Full id, including the permutation.
    pub id: TestId,
    pub outcome: Outcome,
}

impl TestResult {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Every result of a run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    results: Vec<TestResult>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: TestId, outcome: Outcome) {
        self.results.push(TestResult { id, outcome });
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn get(&self, id: &TestId) -> Option<&Outcome> {
        self.results
            .iter()
            .find(|r| &r.id == id)
            .map(|r| &r.outcome)
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    /// Permutations that actually ran.
    pub fn executed(&self) -> usize {
        self.results.len() - self.skipped()
    }

    /// Total simulated power losses across all permutations.
    pub fn powerlosses(&self) -> u64 {
        self.results
            .iter()
            .map(|r| match &r.outcome {
                Outcome::Passed { powerlosses } | Outcome::Failed { powerlosses, .. } => {
                    *powerlosses as u64
                }
                Outcome::Skipped => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Append another report's results.
    pub fn merge(&mut self, other: RunReport) {
        self.results.extend(other.results);
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "done: {}/{} passed, {}/{} failed, {} skipped, {} power losses",
            self.passed(),
            self.executed(),
            self.failed(),
            self.executed(),
            self.skipped(),
            self.powerlosses()
        )
    }
}
