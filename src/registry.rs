use crate::mounted_expectation::MountedExpectation;
use crate::pattern::Mismatch;
use crate::reply::ResolvedReply;
use crate::verification::VerificationReport;
use crate::{Expectation, HeaderFilter, Request};
use log::debug;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifies an [`Expectation`] mounted on an [`ExpectationRegistry`] (or a
/// [`MockApi`](crate::MockApi)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpectationId(usize);

impl ExpectationId {
    /// The position of the expectation in registration order, starting from `0`.
    pub fn position(&self) -> usize {
        self.0
    }
}

/// The outcome of [`ExpectationRegistry::resolve`].
#[derive(Debug, Clone)]
pub enum MatchResult {
    Matched {
        id: ExpectationId,
        reply: ResolvedReply,
    },
    /// No expectation took the request. There is one diagnostic per registered expectation,
    /// in registration order.
    Unmatched(Vec<Diagnostic>),
}

/// Why a specific expectation did not take a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub expectation: ExpectationId,
    /// e.g. `Expectation #0: POST /v1/ask`
    pub summary: String,
    /// The first field that disagreed.
    pub mismatch: Mismatch,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\t{}", self.summary, self.mismatch)
    }
}

/// The ordered collection of mounted [`Expectation`]s and the single place where their call
/// counters are mutated.
///
/// [`resolve`](ExpectationRegistry::resolve) evaluates the candidates and bumps the winner's
/// counter under one lock, so two concurrent requests can never both consume an expectation
/// that allows a single match.
///
/// Registration is expected to happen before traffic starts.
///
/// ### Example:
/// ```rust
/// use mock_http_api::{
///     Expectation, ExpectationRegistry, HeaderFilter, MatchResult, Reply, Request, RequestPattern,
/// };
///
/// let registry = ExpectationRegistry::new();
/// let id = registry.register(
///     Expectation::given(RequestPattern::new("POST", "/v1/ask").body_string("hello"))
///         .respond_with(Reply::new(200))
///         .once(),
/// );
///
/// let request = Request::new("POST", "/v1/ask").with_body("hello");
/// let filter = HeaderFilter::empty();
///
/// assert!(matches!(registry.resolve(&request, &filter), MatchResult::Matched { .. }));
/// // The expectation is exhausted.
/// assert!(matches!(registry.resolve(&request, &filter), MatchResult::Unmatched(_)));
/// assert_eq!(registry.call_count(id), Some(1));
/// ```
#[derive(Default)]
pub struct ExpectationRegistry {
    expectations: Mutex<Vec<MountedExpectation>>,
}

impl ExpectationRegistry {
    /// Create a new, empty, instance of `ExpectationRegistry`.
    pub fn new() -> ExpectationRegistry {
        ExpectationRegistry {
            expectations: Mutex::new(vec![]),
        }
    }

    /// Append an expectation. Expectations are tried in registration order.
    pub fn register(&self, expectation: Expectation) -> ExpectationId {
        let mut expectations = self.lock();
        let n_registered = expectations.len();
        expectations.push(MountedExpectation::new(expectation, n_registered));
        ExpectationId(n_registered)
    }

    /// Find the first expectation, in registration order, that still accepts requests and
    /// whose pattern matches `request`; bump its call counter and return its reply.
    ///
    /// Headers listed in `header_filter` are ignored on both sides.
    pub fn resolve(&self, request: &Request, header_filter: &HeaderFilter) -> MatchResult {
        let mut expectations = self.lock();
        let mut diagnostics = Vec::with_capacity(expectations.len());
        for (position, mounted) in expectations.iter_mut().enumerate() {
            match mounted.try_match(request, header_filter) {
                Ok(reply) => {
                    debug!("Request matched {}.", mounted.summary());
                    return MatchResult::Matched {
                        id: ExpectationId(position),
                        reply,
                    };
                }
                Err(mismatch) => diagnostics.push(Diagnostic {
                    expectation: ExpectationId(position),
                    summary: mounted.summary(),
                    mismatch,
                }),
            }
        }
        MatchResult::Unmatched(diagnostics)
    }

    /// One report for every expectation that did not receive the number of requests its
    /// policy requires. Expectations with an unlimited policy never show up.
    pub fn audit(&self) -> Vec<VerificationReport> {
        self.lock()
            .iter()
            .map(MountedExpectation::verify)
            .filter(|report| !report.is_satisfied())
            .collect()
    }

    /// How many requests the expectation has matched so far, `None` for an unknown id.
    pub fn call_count(&self, id: ExpectationId) -> Option<u64> {
        self.lock().get(id.0).map(MountedExpectation::call_count)
    }

    /// The requests matched by the expectation so far, `None` for an unknown id.
    pub fn received_requests(&self, id: ExpectationId) -> Option<Vec<Request>> {
        self.lock()
            .get(id.0)
            .map(MountedExpectation::received_requests)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all expectations.
    pub fn reset(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave a half-updated expectation behind:
    // the counter is bumped only after matching has succeeded.
    fn lock(&self) -> MutexGuard<'_, Vec<MountedExpectation>> {
        self.expectations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ExpectationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectationRegistry")
            .field("n_expectations", &self.len())
            .finish()
    }
}
