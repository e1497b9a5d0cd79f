use mock_http_api::{
    Expectation, FailureKind, MockApi, RecordingReporter, Reply, RequestPattern,
};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::json;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

#[async_std::test]
async fn new_starts_the_server() {
    // Act
    let mock_api = MockApi::start().await;

    // Assert
    assert!(TcpStream::connect(mock_api.address()).is_ok())
}

#[async_std::test]
async fn returns_500_with_a_diagnostic_if_nothing_matches() {
    // Arrange - no expectations mounted
    let reporter = Arc::new(RecordingReporter::new());
    let mock_api = MockApi::builder().reporter(reporter.clone()).start().await;

    // Act
    let response = reqwest::get(format!("{}/missing", mock_api.uri()))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), 500);
    let body = response.text().await.unwrap();
    assert!(body.contains("No expectation matched the incoming request."));
    assert!(body.contains("GET http://localhost/missing"));
    assert!(body.contains("No expectations were registered."));

    let failures = reporter.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::NoMatchingExpectation);
}

#[async_std::test]
async fn the_unmatched_status_can_be_customised() {
    // Arrange
    let reporter = Arc::new(RecordingReporter::new());
    let mock_api = MockApi::builder()
        .unmatched_status(404)
        .reporter(reporter.clone())
        .start()
        .await;

    // Act
    let status = reqwest::get(mock_api.uri()).await.unwrap().status();

    // Assert
    assert_eq!(status, 404);
    assert_eq!(reporter.failures().len(), 1);
}

#[async_std::test]
async fn the_diagnostic_lists_the_first_mismatch_of_every_expectation() {
    // Arrange
    let reporter = Arc::new(RecordingReporter::new());
    let mock_api = MockApi::builder().reporter(reporter.clone()).start().await;
    Expectation::given(RequestPattern::new("POST", "/v1/ask"))
        .respond_with(Reply::new(200))
        .named("ask")
        .mount(&mock_api)
        .await;
    Expectation::given(RequestPattern::new("GET", "/v1/health"))
        .respond_with(Reply::new(200))
        .mount(&mock_api)
        .await;

    // Act
    let response = reqwest::get(format!("{}/v1/ask", mock_api.uri()))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), 500);
    let body = response.text().await.unwrap();
    assert!(body.contains("Expectation #0 (ask): POST /v1/ask\n\tmethod: expected POST, got GET"));
    assert!(body.contains(
        "Expectation #1: GET /v1/health\n\tpath: expected `/v1/health`, got `/v1/ask`"
    ));
}

#[async_std::test]
#[should_panic]
async fn panics_if_the_expectation_is_not_satisfied() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .once()
        .named("panics_if_the_expectation_is_not_satisfied expectation failed")
        .mount(&mock_api)
        .await;

    // Act - we never call the expectation
}

#[async_std::test]
#[should_panic(expected = "Verifications failed:
- Unfulfilled expectation.
Expected:
\tExpectation #0: GET /: 1 call(s)
Actual:
\t0 call(s)

The server did not receive any request.")]
async fn no_received_request_line_is_printed_in_the_panic_message_if_expectations_are_not_verified()
{
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;

    // Act - we never call the expectation
}

#[async_std::test]
#[should_panic(expected = "Received requests:
- Request #1
\tGET http://localhost/")]
async fn received_requests_are_printed_as_panic_message_if_expectations_are_not_verified() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("POST", "/"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;

    // Act - we sent a request that does not match (GET)
    reqwest::get(mock_api.uri()).await.unwrap();

    // Assert - verified on drop
}

#[async_std::test]
#[should_panic(expected = "No matching expectation.")]
async fn an_unmatched_request_fails_the_test_even_if_every_expectation_is_satisfied() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;

    // Act
    reqwest::get(mock_api.uri()).await.unwrap();
    reqwest::get(format!("{}/unexpected", mock_api.uri()))
        .await
        .unwrap();

    // Assert - verified on drop
}

#[async_std::test]
async fn simple_route_expectation() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200).set_body_bytes("world"))
        .mount(&mock_api)
        .await;

    // Act
    let response = reqwest::get(mock_api.uri()).await.unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    assert_eq!("world", response.text().await.unwrap());
}

#[async_std::test]
async fn the_method_is_matched_case_insensitively() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("post", "/hello"))
        .respond_with(Reply::new(201))
        .once()
        .mount(&mock_api)
        .await;

    // Act
    let status = reqwest::Client::new()
        .post(format!("{}/hello", mock_api.uri()))
        .send()
        .await
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 201);
}

#[async_std::test]
async fn query_parameters_are_matched_as_a_subset() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("GET", "/search").query_param("q", "rust"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;

    // Act
    let status = reqwest::get(format!("{}/search?page=2&q=rust", mock_api.uri()))
        .await
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 200);
}

#[test]
#[should_panic(expected = "Can't match the path `abcd?` because it contains a `?`. You must use `RequestPattern::query_param` to match on query parameters (the part of the path after the `?`).")]
fn query_parameter_is_not_accepted_in_path() {
    RequestPattern::new("GET", "abcd?");
}

#[test]
#[should_panic(expected = "Can't match the path `https://domain.com/abcd` because it contains the host `domain.com`. You don't have to specify the host - the mock API knows it. Try replacing your path with `\"/abcd\"`")]
fn host_is_not_accepted_in_path() {
    RequestPattern::new("GET", "https://domain.com/abcd");
}

#[async_std::test]
async fn reply_headers_and_json_body_are_sent_back() {
    #[derive(Serialize)]
    struct Answer {
        answer: String,
    }

    // Arrange
    let mock_api = MockApi::start().await;
    let reply = Reply::new(200)
        .insert_header("x-request-id", "abc-123")
        .set_body_json(Answer {
            answer: "42".into(),
        });
    Expectation::given(RequestPattern::new("GET", "/answer"))
        .respond_with(reply)
        .mount(&mock_api)
        .await;

    // Act
    let response = reqwest::get(format!("{}/answer", mock_api.uri()))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "abc-123");
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "answer": "42" }));
}

#[async_std::test]
async fn an_exactly_once_expectation_stops_matching_after_the_first_request() {
    // Arrange
    let reporter = Arc::new(RecordingReporter::new());
    let mock_api = MockApi::builder().reporter(reporter.clone()).start().await;
    let id = Expectation::given(RequestPattern::new("GET", "/once"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;
    let uri = format!("{}/once", mock_api.uri());

    // Act
    let first = reqwest::get(&uri).await.unwrap();
    let second = reqwest::get(&uri).await.unwrap();

    // Assert
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 500);
    let body = second.text().await.unwrap();
    assert!(body.contains("already matched 1 time(s), the maximum allowed by an exactly-once policy"));
    assert_eq!(mock_api.call_count(id).await, Some(1));

    let failures = reporter.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::NoMatchingExpectation);
}

#[async_std::test]
async fn exactly_zero_means_the_request_must_never_happen() {
    // Arrange
    let reporter = Arc::new(RecordingReporter::new());
    let mock_api = MockApi::builder().reporter(reporter.clone()).start().await;
    Expectation::given(RequestPattern::new("DELETE", "/everything"))
        .respond_with(Reply::new(200))
        .times(0)
        .mount(&mock_api)
        .await;

    // Act
    let status = reqwest::Client::new()
        .delete(format!("{}/everything", mock_api.uri()))
        .send()
        .await
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 500);
    mock_api.verify().await;
    let failures = reporter.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::NoMatchingExpectation);
}

#[async_std::test]
async fn reset_drops_expectations_and_received_requests() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;
    reqwest::get(mock_api.uri()).await.unwrap();
    assert_eq!(mock_api.received_requests().await.unwrap().len(), 1);

    // Act
    mock_api.reset().await;

    // Assert
    assert!(mock_api.received_requests().await.unwrap().is_empty());
    // No expectation left: verification succeeds.
    mock_api.verify().await;
}

#[async_std::test]
async fn received_requests_are_recorded_matched_or_not() {
    // Arrange
    let reporter = Arc::new(RecordingReporter::new());
    let mock_api = MockApi::builder().reporter(reporter.clone()).start().await;
    Expectation::given(RequestPattern::new("GET", "/known"))
        .respond_with(Reply::new(200))
        .mount(&mock_api)
        .await;

    // Act
    reqwest::get(format!("{}/known", mock_api.uri()))
        .await
        .unwrap();
    reqwest::get(format!("{}/unknown", mock_api.uri()))
        .await
        .unwrap();

    // Assert
    let received_requests = mock_api.received_requests().await.unwrap();
    assert_eq!(received_requests.len(), 2);
    assert_eq!(received_requests[0].url.path(), "/known");
    assert_eq!(received_requests[1].url.path(), "/unknown");
}

#[async_std::test]
async fn a_custom_reporter_receives_every_shortfall_at_verification() {
    // Arrange
    let reporter = Arc::new(RecordingReporter::new());
    let mock_api = MockApi::builder().reporter(reporter.clone()).start().await;
    Expectation::given(RequestPattern::new("GET", "/a"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;
    Expectation::given(RequestPattern::new("GET", "/b"))
        .respond_with(Reply::new(200))
        .times(2)
        .mount(&mock_api)
        .await;

    // Act
    mock_api.verify().await;
    // Verification runs once: dropping `mock_api` does not report again.
    drop(mock_api);

    // Assert
    let failures = reporter.failures();
    assert_eq!(failures.len(), 2);
    assert!(failures
        .iter()
        .all(|failure| failure.kind == FailureKind::UnfulfilledExpectation));
    assert_eq!(failures[0].expected_summary, "Expectation #0: GET /a: 1 call(s)");
    assert_eq!(failures[1].expected_summary, "Expectation #1: GET /b: 2 call(s)");
    assert_eq!(failures[1].actual_summary, "0 call(s)");
}

#[async_std::test]
#[should_panic(expected = "Verifications failed:
- No matching expectation.")]
async fn an_unmatched_request_received_after_verify_fails_the_test_on_drop() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;
    let status = reqwest::get(mock_api.uri()).await.unwrap().status();
    assert_eq!(status, 200);
    mock_api.verify().await;

    // Act
    let status = reqwest::get(format!("{}/unexpected", mock_api.uri()))
        .await
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 500);
    // `mock_api` is dropped here: the unmatched request must not go unnoticed.
}

#[async_std::test]
async fn use_expectations_from_a_pooled_server_after_reset() {
    // A pooled server is reset before being handed out again: every test starts clean.
    for _ in 0..3 {
        let mock_api = MockApi::start().await;
        Expectation::given(RequestPattern::new("GET", "/"))
            .respond_with(Reply::new(200))
            .once()
            .mount(&mock_api)
            .await;

        let status = reqwest::get(mock_api.uri()).await.unwrap().status();
        assert_eq!(status, 200);
    }
}

#[async_std::test]
async fn pooled_servers_do_not_carry_over_filtered_headers() {
    for _ in 0..3 {
        // Arrange
        let mock_api = MockApi::start().await;
        assert!(mock_api.received_requests().await.unwrap().is_empty());
        Expectation::given(RequestPattern::new("GET", "/").header("x-noise", "expected"))
            .respond_with(Reply::new(200))
            .once()
            .mount(&mock_api)
            .await;
        let other = Expectation::given(RequestPattern::new("GET", "/").header("x-noise", "other"))
            .respond_with(Reply::new(201))
            .once();
        let other_id = mock_api.register(other).await;
        let client = reqwest::Client::new();

        // Act
        let first = client
            .get(mock_api.uri())
            .header("x-noise", "other")
            .send()
            .await
            .unwrap();
        let second = client
            .get(mock_api.uri())
            .header("x-noise", "expected")
            .send()
            .await
            .unwrap();

        // Assert - `x-noise` is still relevant, even if the previous user filtered it
        assert_eq!(first.status(), 201);
        assert_eq!(second.status(), 200);
        assert_eq!(mock_api.call_count(other_id).await, Some(1));

        mock_api.set_filtered_headers(["x-noise"]).await;
    }
}

#[async_std::test]
async fn the_delay_is_applied_to_the_reply() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("GET", "/slow"))
        .respond_with(Reply::new(200).set_delay(Duration::from_millis(200)))
        .mount(&mock_api)
        .await;

    // Act
    let start = std::time::Instant::now();
    let status = reqwest::get(format!("{}/slow", mock_api.uri()))
        .await
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 200);
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[async_std::test]
async fn debug_prints_the_server_address() {
    let mock_api = MockApi::builder().start().await;

    let debug = format!("{:?}", mock_api);

    assert!(debug.starts_with("MockApi(Bare(BareMockServer { address: 127.0.0.1:"));
}
