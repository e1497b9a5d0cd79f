use crate::registry::{Diagnostic, ExpectationId, MatchResult};
use crate::reporter::{Failure, FailureKind, Reporter};
use crate::request::{BodyPrintLimit, BODY_PRINT_LIMIT};
use crate::{ExpectationRegistry, HeaderFilter, Request};
use http::{HeaderMap, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// What to send back for a request.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// How long to wait before sending the response.
    pub delay: Option<Duration>,
    /// The expectation that answered, `None` if the request was not matched.
    pub matched: Option<ExpectationId>,
}

impl DispatchOutcome {
    pub(crate) fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Turns incoming requests into replies.
///
/// The dispatcher is the transport-independent entry point of the mock API: it strips
/// filtered headers, asks the [`ExpectationRegistry`] to resolve the request and renders
/// either the matching reply or a diagnostic failure. Unmatched requests are also sent to the
/// [`Reporter`]: the system under test made a call nobody anticipated, and that is always a
/// test failure.
///
/// ### Example:
/// ```rust
/// use mock_http_api::{
///     Dispatcher, Expectation, ExpectationRegistry, HeaderFilter, RecordingReporter, Reply,
///     Request, RequestPattern,
/// };
/// use std::sync::Arc;
///
/// let registry = Arc::new(ExpectationRegistry::new());
/// registry.register(
///     Expectation::given(RequestPattern::new("GET", "/health"))
///         .respond_with(Reply::new(204)),
/// );
/// let reporter = Arc::new(RecordingReporter::new());
/// let dispatcher = Dispatcher::new(registry, reporter.clone())
///     .header_filter(HeaderFilter::new(["user-agent"]));
///
/// let outcome = dispatcher.handle(&Request::new("GET", "/health").with_header("user-agent", "curl"));
/// assert_eq!(outcome.status, 204);
///
/// let outcome = dispatcher.handle(&Request::new("GET", "/unknown"));
/// assert_eq!(outcome.status, 500);
/// assert_eq!(reporter.failures().len(), 1);
/// ```
pub struct Dispatcher {
    registry: Arc<ExpectationRegistry>,
    header_filter: HeaderFilter,
    reporter: Arc<dyn Reporter>,
    unmatched_status: StatusCode,
    body_print_limit: BodyPrintLimit,
}

impl Dispatcher {
    pub fn new(registry: Arc<ExpectationRegistry>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            registry,
            header_filter: HeaderFilter::empty(),
            reporter,
            unmatched_status: StatusCode::INTERNAL_SERVER_ERROR,
            body_print_limit: BodyPrintLimit::Limited(BODY_PRINT_LIMIT),
        }
    }

    /// Headers to ignore for matching and diagnostics.
    pub fn header_filter(mut self, header_filter: HeaderFilter) -> Self {
        self.header_filter = header_filter;
        self
    }

    /// The status code used to answer requests that match no expectation. `500` by default.
    pub fn unmatched_status(mut self, status: StatusCode) -> Self {
        self.unmatched_status = status;
        self
    }

    pub fn body_print_limit(mut self, limit: BodyPrintLimit) -> Self {
        self.body_print_limit = limit;
        self
    }

    pub fn registry(&self) -> &Arc<ExpectationRegistry> {
        &self.registry
    }

    pub(crate) fn set_header_filter(&mut self, header_filter: HeaderFilter) {
        self.header_filter = header_filter;
    }

    /// Render `request` the way it appears in diagnostics: filtered headers are left out and
    /// the body is truncated to the print limit.
    pub(crate) fn print_request(&self, request: &Request) -> String {
        let mut printed = String::new();
        // Writing into a `String` cannot fail.
        let _ = request
            .filtered(&self.header_filter)
            .print_with_limit(&mut printed, self.body_print_limit);
        printed
    }

    pub fn handle(&self, request: &Request) -> DispatchOutcome {
        debug!("Handling request.");
        let request = request.filtered(&self.header_filter);

        match self.registry.resolve(&request, &self.header_filter) {
            MatchResult::Matched { id, reply } => DispatchOutcome {
                status: reply.status_code(),
                headers: reply.response_headers(),
                body: reply.body_bytes(),
                delay: reply.delay(),
                matched: Some(id),
            },
            MatchResult::Unmatched(diagnostics) => self.unmatched(&request, &diagnostics),
        }
    }

    fn unmatched(&self, request: &Request, diagnostics: &[Diagnostic]) -> DispatchOutcome {
        let mut actual_summary = String::new();
        // Writing to a `String` cannot fail.
        let _ = request.print_with_limit(&mut actual_summary, self.body_print_limit);
        let actual_summary = actual_summary.trim_end().to_owned();

        let expected_summary = if diagnostics.is_empty() {
            "No expectations were registered.".to_owned()
        } else {
            diagnostics
                .iter()
                .map(|diagnostic| format!("- {}", diagnostic))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let body = format!(
            "No expectation matched the incoming request.\n\nRequest:\n{}\n\nExpectations:\n{}\n",
            actual_summary, expected_summary
        );
        warn!("{}", body);

        self.reporter.report(Failure {
            kind: FailureKind::NoMatchingExpectation,
            expected_summary,
            actual_summary,
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        DispatchOutcome {
            status: self.unmatched_status,
            headers,
            body: Bytes::from(body),
            delay: None,
            matched: None,
        }
    }
}
