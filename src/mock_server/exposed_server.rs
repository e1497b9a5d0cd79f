use crate::mock_server::bare_server::BareMockServer;
use crate::mock_server::pool::{get_pooled_mock_server, PooledMockServer};
use crate::mock_server::MockApiBuilder;
use crate::{Expectation, ExpectationId, HeaderFilter, Request};
use log::debug;
use std::convert::TryInto;
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::ops::Deref;

/// An HTTP web-server running in the background to stand in for one of your dependencies,
/// answering requests according to the [`Expectation`]s you mount on it.
///
/// Each instance of `MockApi` is fully isolated: [`MockApi::start`] takes care of finding a
/// random port available on your local machine which is assigned to the new `MockApi`.
///
/// You can use [`MockApi::builder`] if you need to specify custom configuration - e.g.
/// filter headers, run on a specific port or send failures to your own reporter.
///
/// ## Failures
///
/// Two things make a test fail:
/// - a request that no expectation accepts. It is answered with a `500` and a diagnostic body
///   listing, for each expectation, the first field that did not match;
/// - an expectation that did not receive the number of requests its
///   [`ConsumptionPolicy`](crate::ConsumptionPolicy) requires.
///
/// Both are collected and the `MockApi` panics with all of them when it is verified, i.e.
/// when [`MockApi::verify`] is called or when the `MockApi` goes out of scope.
///
/// ## Best practices
///
/// You should use one instance of `MockApi` for each REST API that your application interacts
/// with and needs mocking for testing purposes.
///
/// To ensure full isolation and no cross-test interference, `MockApi`s shouldn't be
/// shared between tests. Instead, `MockApi`s should be created in the test where they are used.
pub struct MockApi(InnerServer);

/// `MockApi` is either a wrapper around a `BareMockServer` retrieved from an
/// object pool or a wrapper around an exclusive `BareMockServer`.
/// We use the pool when the user sticks to the default configuration, while
/// we provision a dedicated one if they go through [`MockApiBuilder`].
///
/// `InnerServer` implements `Deref<Target=BareMockServer>`, so we never actually have to match
/// on `InnerServer` in `MockApi` - the compiler does all the boring heavy-lifting for us.
#[derive(Debug)]
pub(super) enum InnerServer {
    Bare(BareMockServer),
    Pooled(PooledMockServer),
}

impl Deref for InnerServer {
    type Target = BareMockServer;

    fn deref(&self) -> &Self::Target {
        match self {
            InnerServer::Bare(b) => b,
            InnerServer::Pooled(p) => p.deref(),
        }
    }
}

impl MockApi {
    pub(super) fn new(server: InnerServer) -> Self {
        Self(server)
    }

    /// You can use `MockApi::builder` if you need to specify custom configuration - e.g.
    /// filter headers, run on a specific port or disable request recording.
    ///
    /// If this is not your case, use [`MockApi::start`].
    pub fn builder() -> MockApiBuilder {
        MockApiBuilder::new()
    }

    /// Start a new instance of a `MockApi` listening on a random port.
    ///
    /// Each instance of `MockApi` is fully isolated: `start` takes care of finding a random port
    /// available on your local machine which is assigned to the new `MockApi`.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http_api::{Expectation, MockApi, Reply, RequestPattern};
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_api_one = MockApi::start().await;
    ///     let mock_api_two = MockApi::start().await;
    ///
    ///     assert!(mock_api_one.address() != mock_api_two.address());
    ///
    ///     let expectation = Expectation::given(RequestPattern::new("GET", "/"))
    ///         .respond_with(Reply::new(200));
    ///     // Registering the expectation with the first mock API - it's now effective!
    ///     // But it *won't* be used by the second one!
    ///     mock_api_one.register(expectation).await;
    ///
    ///     // Act
    ///     let status = reqwest::get(mock_api_one.uri()).await.unwrap().status();
    ///     assert_eq!(status, 200);
    /// }
    /// ```
    pub async fn start() -> Self {
        Self(InnerServer::Pooled(get_pooled_mock_server().await))
    }

    /// Register an [`Expectation`] on an instance of `MockApi`.
    ///
    /// Be careful! `Expectation`s are not effective until they are `mount`ed or `register`ed
    /// on a `MockApi`. Register all expectations before the system under test starts sending
    /// requests.
    ///
    /// `register` is an asynchronous method, make sure to `.await` it!
    pub async fn register(&self, expectation: Expectation) -> ExpectationId {
        self.0.register(expectation).await
    }

    /// Replace the set of headers ignored for matching and diagnostics.
    ///
    /// It panics if one of the names is not a valid header name.
    pub async fn set_filtered_headers<K, I>(&self, names: I)
    where
        K: TryInto<http::HeaderName>,
        <K as TryInto<http::HeaderName>>::Error: std::fmt::Debug,
        I: IntoIterator<Item = K>,
    {
        self.0.set_header_filter(HeaderFilter::new(names)).await
    }

    /// Drop all mounted [`Expectation`]s from an instance of [`MockApi`].
    /// It also deletes all recorded requests, pending failures and filtered headers.
    ///
    /// ### Example
    ///
    /// ```rust
    /// use mock_http_api::{Expectation, MockApi, Reply, RequestPattern};
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_api = MockApi::start().await;
    ///
    ///     Expectation::given(RequestPattern::new("GET", "/"))
    ///         .respond_with(Reply::new(200))
    ///         .mount(&mock_api)
    ///         .await;
    ///
    ///     // Act
    ///     let status = reqwest::get(mock_api.uri()).await.unwrap().status();
    ///     assert_eq!(status, 200);
    ///
    ///     // Reset the server
    ///     mock_api.reset().await;
    ///
    ///     // Recorded requests are gone as well.
    ///     let received_requests = mock_api.received_requests().await.unwrap();
    ///     assert!(received_requests.is_empty());
    /// }
    /// ```
    pub async fn reset(&self) {
        self.0.reset().await;
    }

    /// Verify that every mounted [`Expectation`] received the number of requests its policy
    /// requires and that no request went unmatched. Panics otherwise, listing every failure.
    ///
    /// If a [`Reporter`](crate::Reporter) has been set on the [`MockApiBuilder`], failures are
    /// sent to it instead and `verify` never panics.
    ///
    /// Expectations are audited once: automatically when the `MockApi` goes out of scope,
    /// unless you called `verify` yourself. Requests that match no expectation are reported
    /// by every call, including the one on drop, if they arrived after the previous one.
    ///
    /// Filtered headers are left out of the requests printed in the panic message.
    pub async fn verify(&self) {
        debug!("Verify expectations.");
        let failures = self.0.verify().await;
        if failures.is_empty() {
            return;
        }

        let received_requests_message = match self.0.printed_received_requests().await {
            Some(received_requests) if received_requests.is_empty() => {
                "The server did not receive any request.".to_owned()
            }
            Some(received_requests) => format!(
                "Received requests:\n{}",
                received_requests
                    .into_iter()
                    .enumerate()
                    .map(|(index, request)| {
                        format!(
                            "- Request #{}\n{}",
                            index + 1,
                            textwrap::indent(&request, "\t")
                        )
                    })
                    .collect::<String>()
            ),
            None => "Enable request recording on the mock API to get the list of incoming requests as part of the panic message.".to_owned(),
        };
        let failure_messages: String = failures
            .iter()
            .map(|failure| format!("- {}\n", failure))
            .collect();
        let error_message = format!(
            "Verifications failed:\n{}\n{}",
            failure_messages, received_requests_message
        );
        if std::thread::panicking() {
            debug!("{}", &error_message);
        } else {
            panic!("{}", &error_message);
        }
    }

    /// How many requests the expectation identified by `id` matched so far, `None` if `id` does
    /// not belong to this `MockApi`.
    pub async fn call_count(&self, id: ExpectationId) -> Option<u64> {
        self.0.call_count(id).await
    }

    /// Return the base uri of this running instance of `MockApi`, e.g. `http://127.0.0.1:4372`.
    ///
    /// Use this method to compose uris when interacting with this instance of `MockApi` via
    /// an HTTP client.
    pub fn uri(&self) -> String {
        self.0.uri()
    }

    /// Return the socket address of this running instance of `MockApi`, e.g. `127.0.0.1:4372`.
    ///
    /// Use this method to interact with the `MockApi` using `TcpStream`s.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http_api::MockApi;
    /// use std::net::TcpStream;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Act - the server is started
    ///     let mock_api = MockApi::start().await;
    ///
    ///     // Assert - we can connect to it
    ///     assert!(TcpStream::connect(mock_api.address()).is_ok());
    /// }
    /// ```
    pub fn address(&self) -> &SocketAddr {
        self.0.address()
    }

    /// Return a vector with all the requests received by the `MockApi` since it started,
    /// matched or not. If no request has been served, it returns an empty vector.
    ///
    /// If request recording has been disabled using
    /// [`MockApiBuilder::disable_request_recording`], it returns `None`.
    ///
    /// ### Example:
    ///
    /// ```rust
    /// use mock_http_api::MockApi;
    /// use mock_http_api::http::Method;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_api = MockApi::builder().unmatched_status(404).start().await;
    ///
    ///     // Act
    ///     reqwest::get(mock_api.uri()).await.unwrap();
    ///
    ///     // Assert
    ///     let received_requests = mock_api.received_requests().await.unwrap();
    ///     assert_eq!(received_requests.len(), 1);
    ///
    ///     let received_request = &received_requests[0];
    ///     assert_eq!(received_request.method, Method::GET);
    ///     assert_eq!(received_request.url.path(), "/");
    ///     assert!(received_request.body.is_empty());
    ///
    ///     // The request matched nothing: we do not want `mock_api` to panic when dropped.
    ///     mock_api.reset().await;
    /// }
    /// ```
    pub async fn received_requests(&self) -> Option<Vec<Request>> {
        self.0.received_requests().await
    }
}

impl Debug for MockApi {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MockApi").field(&self.0).finish()
    }
}

impl Drop for MockApi {
    // Clean up when the `MockApi` instance goes out of scope.
    fn drop(&mut self) {
        futures::executor::block_on(self.verify())
        // The sender half of the channel, `shutdown_trigger`, gets dropped here
        // Triggering the graceful shutdown of the server itself.
    }
}
