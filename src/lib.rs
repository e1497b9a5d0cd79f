#![allow(clippy::needless_doctest_main)]
//! `mock_http_api` provides an HTTP test double to perform black-box testing of Rust applications
//! that interact with third-party APIs.
//!
//! You describe the requests your application is expected to send, the replies it should get
//! back and how many times each request should happen. The mock API answers accordingly and,
//! at the end of the test, fails loudly if something unexpected happened.
//!
//! # Table of Contents
//! 1. [Getting started](#getting-started)
//! 2. [Matching](#matching)
//! 3. [Consumption policies](#consumption-policies)
//! 4. [Failures](#failures)
//! 5. [Test isolation](#test-isolation)
//! 6. [Runtime compatibility](#runtime-compatibility)
//!
//! ## Getting started
//! ```rust
//! use mock_http_api::{Expectation, MockApi, Reply, RequestPattern};
//! use serde_json::json;
//!
//! #[async_std::main]
//! async fn main() {
//!     // Start a background HTTP server on a random local port
//!     let mock_api = MockApi::start().await;
//!
//!     // Arrange the behaviour of the MockApi adding an Expectation:
//!     // when it receives a POST request on '/v1/ask' with the right body it will respond
//!     // with a 200, exactly once.
//!     Expectation::given(
//!         RequestPattern::new("POST", "/v1/ask").body_json(json!({ "question": "why?" })),
//!     )
//!     .respond_with(Reply::new(200).set_body_json(json!({ "answer": "because" })))
//!     .once()
//!     // Mounting the expectation on the mock API - it's now effective!
//!     .mount(&mock_api)
//!     .await;
//!
//!     // If we call the MockApi using any HTTP client it behaves as expected.
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/v1/ask", &mock_api.uri()))
//!         .json(&json!({ "question": "why?" }))
//!         .send()
//!         .await
//!         .unwrap();
//!     assert_eq!(response.status(), 200);
//!
//!     // The expectation is verified when `mock_api` goes out of scope.
//! }
//! ```
//!
//! ## Matching
//!
//! A [`RequestPattern`] describes a class of requests: method, path, query parameters, headers
//! and body. Headers are matched partially: only the headers listed in the pattern are checked,
//! and any other header sent by the client is ignored.
//!
//! Bodies declared with [`RequestPattern::body_json`] are compared structurally - key order,
//! whitespace and the representation of numbers do not matter. Bodies declared as bytes or
//! strings are compared byte-for-byte. Check [`compare_bodies`] for the details.
//!
//! Some headers are just noise for a test (`user-agent`, `content-length`, a `date` stamped by
//! the client, ...): list them with [`MockApiBuilder::filtered_headers`] and they will be ignored
//! both for matching and in failure messages.
//!
//! ## Consumption policies
//!
//! Each [`Expectation`] carries a [`ConsumptionPolicy`]: it can match any number of requests
//! (the default), or exactly `n`. Once an expectation has matched as many requests as its
//! policy allows, it stops matching - the next request falls through to the expectations
//! mounted after it.
//!
//! Expectations are tried in the order they were mounted: the first one that accepts a
//! request answers it.
//!
//! ## Failures
//!
//! A request that matches no expectation is answered with a `500` and a body explaining, for
//! each mounted expectation, what did not match.
//!
//! When the [`MockApi`] is verified - explicitly, with [`MockApi::verify`], or when it goes out
//! of scope - it panics listing every unmatched request and every expectation that did not
//! receive the number of requests its policy requires.
//!
//! You can send failures somewhere else implementing the [`Reporter`] trait and passing your
//! reporter to [`MockApiBuilder::reporter`].
//!
//! ## Test isolation
//!
//! Each instance of [`MockApi`] is fully isolated: [`MockApi::start`] takes care of finding a
//! random port available on your local machine which is assigned to the new [`MockApi`].
//!
//! You should use one instance of [`MockApi`] for each test, to ensure full isolation and
//! no cross-test interference.
//!
//! When a [`MockApi`] instance goes out of scope (e.g. the test finishes), the corresponding
//! HTTP server running in the background is shut down or given back to a pool to be reused
//! by another test.
//!
//! ## Runtime compatibility
//!
//! `mock_http_api` can be used (and it is tested to work) with [`async_std`], [`tokio`] and
//! `actix-rt` as futures runtimes: the HTTP server runs on its own thread.
//!
//! If you do not need an HTTP server at all, [`ExpectationRegistry`] and [`Dispatcher`] can be
//! driven directly with hand-built [`Request`]s.
//!
//! [`async_std`]: https://docs.rs/async-std/
//! [`tokio`]: https://docs.rs/tokio/
mod body;
mod dispatcher;
mod expectation;
mod header_filter;
pub mod http;
mod mock_server;
mod mounted_expectation;
mod pattern;
mod registry;
mod reply;
mod reporter;
mod request;
mod verification;

pub use body::{compare_bodies, BodyComparison, ExpectedBody};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use expectation::{ConsumptionPolicy, Expectation, ExpectationBuilder};
pub use header_filter::HeaderFilter;
pub use mock_server::{MockApi, MockApiBuilder};
pub use pattern::{Mismatch, RequestPattern};
pub use registry::{Diagnostic, ExpectationId, ExpectationRegistry, MatchResult};
pub use reply::{JsonEncoder, Reply, ReplyBody, ReplyEncoder, ResolvedReply};
pub use reporter::{Failure, FailureKind, RecordingReporter, Reporter};
pub use request::{BodyPrintLimit, Request, BODY_PRINT_LIMIT};
pub use verification::{FulfillmentAuditor, VerificationOutcome, VerificationReport};
