//! Test ids
//!
//! A test id names a suite, optionally one of its cases and optionally one
//! permutation of that case: `suite`, `suite/case` or `suite/case:perm`.
//! Every recorded result carries a full id, so a failing permutation can be
//! rerun on its own.

use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestIdError {
    #[error("Empty test id")]
    Empty,

    #[error("Invalid test id {0:?}")]
    Invalid(String),

    #[error("Invalid permutation in test id {0:?}")]
    InvalidPermutation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestId {
    pub suite: String,
    pub case: Option<String>,
    pub perm: Option<usize>,
}

impl TestId {
    pub fn suite(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            case: None,
            perm: None,
        }
    }

    pub fn case(suite: impl Into<String>, case: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            case: Some(case.into()),
            perm: None,
        }
    }

    pub fn with_perm(mut self, perm: usize) -> Self {
        self.perm = Some(perm);
        self
    }

    /// Whether this selector covers `suite`.
    pub fn matches_suite(&self, suite: &str) -> bool {
        self.suite == suite
    }

    /// Whether this selector covers `case` of `suite`.
    pub fn matches_case(&self, suite: &str, case: &str) -> bool {
        self.matches_suite(suite) && self.case.as_deref().map_or(true, |c| c == case)
    }

    /// Whether this selector covers permutation `perm`.
    pub fn matches_perm(&self, perm: usize) -> bool {
        self.perm.map_or(true, |p| p == perm)
    }
}

impl FromStr for TestId {
    type Err = TestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TestIdError::Empty);
        }

        let (path, perm) = match s.rsplit_once(':') {
            Some((path, perm)) => {
                let perm = perm
                    .parse::<usize>()
                    .map_err(|_| TestIdError::InvalidPermutation(s.to_string()))?;
                (path, Some(perm))
            }
            None => (s, None),
        };

        let (suite, case) = match path.split_once('/') {
            Some((suite, case)) => (suite, Some(case)),
            None => (path, None),
        };
        if suite.is_empty() || case.map_or(false, |c| c.is_empty() || c.contains('/')) {
            return Err(TestIdError::Invalid(s.to_string()));
        }
        if perm.is_some() && case.is_none() {
            return Err(TestIdError::Invalid(s.to_string()));
        }

        Ok(Self {
            suite: suite.to_string(),
            case: case.map(String::from),
            perm,
        })
    }
}

impl std::fmt::Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suite)?;
        if let Some(case) = &self.case {
            write!(f, "/{}", case)?;
        }
        if let Some(perm) = self.perm {
            write!(f, ":{}", perm)?;
        }
        Ok(())
    }
}
