use crate::mock_server::bare_server::{BareMockServer, RequestRecording, ServerConfig};
use crate::mock_server::exposed_server::InnerServer;
use crate::reporter::Reporter;
use crate::request::{BodyPrintLimit, BODY_PRINT_LIMIT};
use crate::{HeaderFilter, MockApi};
use http::StatusCode;
use std::convert::TryInto;
use std::env;
use std::net::TcpListener;
use std::sync::Arc;

/// A builder providing a fluent API to assemble a [`MockApi`] step-by-step.
/// Use [`MockApi::builder`] to get started.
pub struct MockApiBuilder {
    listener: Option<TcpListener>,
    header_filter: HeaderFilter,
    record_incoming_requests: bool,
    body_print_limit: BodyPrintLimit,
    unmatched_status: StatusCode,
    reporter: Option<Arc<dyn Reporter>>,
}

impl MockApiBuilder {
    pub(super) fn new() -> Self {
        let body_print_limit = match env::var("MOCK_HTTP_API_BODY_PRINT_LIMIT")
            .ok()
            .and_then(|x| x.parse::<usize>().ok())
        {
            Some(limit) => BodyPrintLimit::Limited(limit),
            None => BodyPrintLimit::Limited(BODY_PRINT_LIMIT),
        };
        Self {
            listener: None,
            header_filter: HeaderFilter::empty(),
            record_incoming_requests: true,
            body_print_limit,
            unmatched_status: StatusCode::INTERNAL_SERVER_ERROR,
            reporter: None,
        }
    }

    /// Each instance of [`MockApi`] is, by default, running on a random
    /// port available on your local machine.
    /// With `MockApiBuilder::listener` you can choose to start the `MockApi`
    /// instance on a specific port you have already bound.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http_api::MockApi;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    ///     let expected_server_address = listener
    ///         .local_addr()
    ///         .expect("Failed to get server address.");
    ///
    ///     // Act
    ///     let mock_api = MockApi::builder().listener(listener).start().await;
    ///
    ///     // Assert
    ///     assert_eq!(&expected_server_address, mock_api.address());
    /// }
    /// ```
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Headers whose presence and value are irrelevant to the test - e.g. `user-agent`,
    /// `content-length` or a `date` stamped by the client.
    ///
    /// Filtered headers are ignored by every expectation, even if the expectation explicitly
    /// lists them, and they are left out of failure messages.
    /// Names are matched case-insensitively.
    ///
    /// It panics if one of the names is not a valid header name.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http_api::{Expectation, MockApi, Reply, RequestPattern};
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_api = MockApi::builder()
    ///         .filtered_headers(["user-agent", "accept"])
    ///         .start()
    ///         .await;
    ///     Expectation::given(RequestPattern::new("GET", "/hello").header("user-agent", "my-app"))
    ///         .respond_with(Reply::new(200))
    ///         .mount(&mock_api)
    ///         .await;
    ///
    ///     // Act
    ///     let status = reqwest::Client::new()
    ///         .get(format!("{}/hello", mock_api.uri()))
    ///         .header("user-agent", "something-else")
    ///         .send()
    ///         .await
    ///         .unwrap()
    ///         .status();
    ///
    ///     // Assert
    ///     assert_eq!(status, 200);
    /// }
    /// ```
    pub fn filtered_headers<K, I>(mut self, names: I) -> Self
    where
        K: TryInto<http::HeaderName>,
        <K as TryInto<http::HeaderName>>::Error: std::fmt::Debug,
        I: IntoIterator<Item = K>,
    {
        self.header_filter = HeaderFilter::new(names);
        self
    }

    /// By default, [`MockApi`] will record all incoming requests to display
    /// more meaningful error messages when your expectations are not verified.
    ///
    /// This can sometimes be undesirable (e.g. a long-lived server serving
    /// high volumes of traffic) - you can disable request recording using
    /// `MockApiBuilder::disable_request_recording`.
    ///
    /// ### Example (Request recording disabled):
    ///
    /// ```rust
    /// use mock_http_api::MockApi;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_api = MockApi::builder().disable_request_recording().start().await;
    ///
    ///     // Act
    ///     let received_requests = mock_api.received_requests().await;
    ///
    ///     // Assert
    ///     assert!(received_requests.is_none());
    /// }
    /// ```
    pub fn disable_request_recording(mut self) -> Self {
        self.record_incoming_requests = false;
        self
    }

    /// The mock API prints the requests it received when they match no expectation or when
    /// one or more expectations have not been satisfied.
    /// By default, the size of the printed body is limited.
    ///
    /// You may want to change this if you're working with services with very large
    /// bodies, or when printing the output to a file where size matters
    /// less than in a terminal window. You can configure this limit with
    /// `MockApiBuilder::body_print_limit` or with the `MOCK_HTTP_API_BODY_PRINT_LIMIT`
    /// environment variable.
    pub fn body_print_limit(mut self, limit: BodyPrintLimit) -> Self {
        self.body_print_limit = limit;
        self
    }

    /// The status code used to answer requests that match no expectation. `500` by default.
    ///
    /// It panics if `status` is not a valid status code.
    pub fn unmatched_status<S>(mut self, status: S) -> Self
    where
        S: TryInto<StatusCode>,
        <S as TryInto<StatusCode>>::Error: std::fmt::Debug,
    {
        self.unmatched_status = status
            .try_into()
            .expect("Failed to convert into status code.");
        self
    }

    /// Send failures - unmatched requests and unfulfilled expectations - to `reporter`.
    ///
    /// By default the [`MockApi`] collects failures and panics with all of them when it is
    /// verified. Once a reporter is set, failures are handed over to it and the `MockApi`
    /// never panics on its own.
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Finalise the builder to get an instance of a [`BareMockServer`].
    pub(super) async fn build_bare(self) -> BareMockServer {
        let listener = if let Some(listener) = self.listener {
            listener
        } else {
            TcpListener::bind("127.0.0.1:0").expect("Failed to bind an OS port for a mock API.")
        };
        let recording = if self.record_incoming_requests {
            RequestRecording::Enabled
        } else {
            RequestRecording::Disabled
        };
        BareMockServer::start(
            listener,
            ServerConfig {
                header_filter: self.header_filter,
                recording,
                body_print_limit: self.body_print_limit,
                unmatched_status: self.unmatched_status,
                reporter: self.reporter,
            },
        )
    }

    /// Finalise the builder and launch the [`MockApi`] instance!
    pub async fn start(self) -> MockApi {
        MockApi::new(InnerServer::Bare(self.build_bare().await))
    }
}
