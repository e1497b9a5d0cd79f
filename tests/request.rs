use futures::FutureExt;
use mock_http_api::{Expectation, MockApi, Reply, RequestPattern};
use serde::Deserialize;
use serde_json::json;
use std::panic::AssertUnwindSafe;

#[derive(Deserialize, Debug, PartialEq)]
struct Question {
    question: String,
}

#[async_std::test]
async fn recorded_requests_expose_their_json_body() {
    // Arrange
    let mock_api = MockApi::start().await;
    Expectation::given(RequestPattern::new("POST", "/v1/ask"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;

    // Act
    reqwest::Client::new()
        .post(format!("{}/v1/ask", mock_api.uri()))
        .json(&json!({ "question": "why?" }))
        .send()
        .await
        .unwrap();

    // Assert
    let received_requests = mock_api.received_requests().await.unwrap();
    assert_eq!(received_requests.len(), 1);
    let request = &received_requests[0];
    assert_eq!(request.content_type(), Some("application/json"));
    assert_eq!(
        request.body_json::<Question>().unwrap(),
        Question {
            question: "why?".into()
        }
    );
}

#[async_std::test]
async fn recorded_requests_keep_filtered_headers() {
    // Arrange
    let mock_api = MockApi::builder()
        .filtered_headers(["x-trace-id"])
        .start()
        .await;
    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .once()
        .mount(&mock_api)
        .await;

    // Act
    reqwest::Client::new()
        .get(mock_api.uri())
        .header("x-trace-id", "123")
        .send()
        .await
        .unwrap();

    // Assert - filtering affects matching and diagnostics, not what `received_requests` returns
    let received_requests = mock_api.received_requests().await.unwrap();
    assert_eq!(received_requests[0].headers["x-trace-id"], "123");
}

#[async_std::test]
async fn filtered_headers_are_left_out_of_the_requests_printed_at_verification() {
    // Arrange
    let mock_api = MockApi::builder()
        .filtered_headers(["x-secret-noise"])
        .start()
        .await;
    Expectation::given(RequestPattern::new("GET", "/expected"))
        .respond_with(Reply::new(200))
        .mount(&mock_api)
        .await;
    reqwest::Client::new()
        .get(format!("{}/other", mock_api.uri()))
        .header("x-secret-noise", "zzz")
        .header("x-visible", "yes")
        .send()
        .await
        .unwrap();

    // Act
    let outcome = AssertUnwindSafe(mock_api.verify()).catch_unwind().await;

    // Assert
    let panic_payload = outcome.expect_err("An unmatched request must fail verification");
    let message = panic_payload
        .downcast_ref::<String>()
        .expect("The panic message is a formatted string");
    assert!(message.contains("Received requests:\n- Request #1\n\tGET http://localhost/other"));
    assert!(message.contains("x-visible: yes"));
    assert!(!message.contains("x-secret-noise"));
    assert!(!message.contains("zzz"));
}

#[async_std::test]
async fn request_recording_can_be_disabled() {
    let mock_api = MockApi::builder().disable_request_recording().start().await;

    assert!(mock_api.received_requests().await.is_none());
}
