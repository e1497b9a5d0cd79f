use crate::reporter::{Failure, FailureKind, Reporter};
use crate::{ConsumptionPolicy, ExpectationRegistry};
use log::debug;

/// A report returned by a mounted expectation detailing what the consumption policy requires
/// and how many calls were actually received since the expectation was mounted.
#[derive(Clone, Debug)]
pub struct VerificationReport {
    /// The expectation name specified by the user.
    pub(crate) expectation_name: Option<String>,
    /// Method, path and query of the expectation's request pattern.
    pub(crate) pattern: String,
    /// What users specified
    pub(crate) policy: ConsumptionPolicy,
    /// Actual number of received requests that matched the pattern
    pub(crate) call_count: u64,
    /// The position occupied by the expectation that generated the report within its parent
    /// registry.
    ///
    /// `0` if it is the first expectation that we try to match against an incoming request, `1`
    /// if it is the second, etc.
    pub(crate) position_in_set: usize,
}

impl VerificationReport {
    pub fn error_message(&self) -> String {
        let required = self
            .policy
            .required_matches()
            .map_or_else(|| "any".to_owned(), |n| n.to_string());
        format!(
            "{}.\n\tRequired matching incoming requests: {} ({})\n\tNumber of matched incoming requests: {}",
            self.expectation_label(),
            required,
            self.policy,
            self.call_count
        )
    }

    pub fn is_satisfied(&self) -> bool {
        self.policy.is_satisfied_by(self.call_count)
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    pub fn policy(&self) -> ConsumptionPolicy {
        self.policy
    }

    /// Method, path and query of the expectation's request pattern, e.g. `GET /users?page=2`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn expectation_name(&self) -> Option<&str> {
        self.expectation_name.as_deref()
    }

    pub(crate) fn to_failure(&self) -> Failure {
        let required = self.policy.required_matches().unwrap_or_default();
        Failure {
            kind: FailureKind::UnfulfilledExpectation,
            expected_summary: format!("{}: {} call(s)", self.expectation_label(), required),
            actual_summary: format!("{} call(s)", self.call_count),
        }
    }

    fn expectation_label(&self) -> String {
        match &self.expectation_name {
            Some(name) => format!(
                "Expectation #{} ({}): {}",
                self.position_in_set, name, self.pattern
            ),
            None => format!("Expectation #{}: {}", self.position_in_set, self.pattern),
        }
    }
}

pub enum VerificationOutcome {
    /// The consumption policies of all mounted expectations were satisfied.
    Success,
    /// The policies of one or more expectations were not satisfied.
    /// All failed reports are returned.
    Failure(Vec<VerificationReport>),
}

/// Checks, at teardown, that every expectation received the number of requests its
/// [`ConsumptionPolicy`] requires.
///
/// All shortfalls are reported together: one failure does not hide the others.
///
/// ### Example:
/// ```rust
/// use mock_http_api::{
///     Expectation, ExpectationRegistry, FailureKind, FulfillmentAuditor, HeaderFilter,
///     RecordingReporter, Reply, Request, RequestPattern,
/// };
///
/// let registry = ExpectationRegistry::new();
/// registry.register(
///     Expectation::given(RequestPattern::new("GET", "/a"))
///         .respond_with(Reply::new(200))
///         .once(),
/// );
/// registry.register(
///     Expectation::given(RequestPattern::new("GET", "/b"))
///         .respond_with(Reply::new(200))
///         .once(),
/// );
///
/// registry.resolve(&Request::new("GET", "/a"), &HeaderFilter::empty());
///
/// let reporter = RecordingReporter::new();
/// FulfillmentAuditor::verify(&registry, &reporter);
///
/// let failures = reporter.failures();
/// assert_eq!(failures.len(), 1);
/// assert_eq!(failures[0].kind, FailureKind::UnfulfilledExpectation);
/// assert!(failures[0].expected_summary.contains("GET /b"));
/// ```
#[derive(Debug)]
pub struct FulfillmentAuditor;

impl FulfillmentAuditor {
    pub fn verify(registry: &ExpectationRegistry, reporter: &dyn Reporter) -> VerificationOutcome {
        debug!("Verify expectations.");
        let shortfalls = registry.audit();
        if shortfalls.is_empty() {
            return VerificationOutcome::Success;
        }

        for shortfall in &shortfalls {
            debug!("{}", shortfall.error_message());
            reporter.report(shortfall.to_failure());
        }
        VerificationOutcome::Failure(shortfalls)
    }
}
