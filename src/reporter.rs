use std::fmt;
use std::sync::{Mutex, PoisonError};

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// An incoming request did not match any expectation, or every expectation it matched
    /// had already been consumed.
    NoMatchingExpectation,
    /// An expectation did not receive the number of requests its policy requires.
    UnfulfilledExpectation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NoMatchingExpectation => f.write_str("No matching expectation"),
            FailureKind::UnfulfilledExpectation => f.write_str("Unfulfilled expectation"),
        }
    }
}

/// A structured test failure, as emitted to a [`Reporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    /// What the mock API was set up to expect.
    pub expected_summary: String,
    /// What it actually observed.
    pub actual_summary: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}.", self.kind)?;
        writeln!(f, "Expected:\n{}", textwrap::indent(&self.expected_summary, "\t"))?;
        write!(f, "Actual:\n{}", textwrap::indent(&self.actual_summary, "\t"))
    }
}

/// A sink for the failures detected by a [`MockApi`](crate::MockApi).
///
/// Unmatched requests are reported as soon as they are handled; unfulfilled expectations are
/// reported, all together, when the mock API is verified.
///
/// If you do not configure a reporter, the [`MockApi`](crate::MockApi) collects failures itself
/// and panics with all of them when it is verified.
///
/// Closures taking a [`Failure`] implement `Reporter`:
/// ```rust
/// use mock_http_api::{Failure, MockApi};
/// use std::sync::Arc;
///
/// # async fn run() {
/// let mock_api = MockApi::builder()
///     .reporter(Arc::new(|failure: Failure| eprintln!("{}", failure)))
///     .start()
///     .await;
/// # }
/// ```
pub trait Reporter: Send + Sync {
    fn report(&self, failure: Failure);
}

impl<F> Reporter for F
where
    F: Fn(Failure),
    F: Send + Sync,
{
    fn report(&self, failure: Failure) {
        self(failure)
    }
}

/// A [`Reporter`] that keeps every failure in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    failures: Mutex<Vec<Failure>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the failures reported so far.
    pub fn failures(&self) -> Vec<Failure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the failures reported so far.
    pub fn take(&self) -> Vec<Failure> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// `true` if nothing has been reported yet.
    pub fn is_empty(&self) -> bool {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, failure: Failure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }
}
