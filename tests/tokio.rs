use mock_http_api::{Expectation, MockApi, Reply, RequestPattern};
use reqwest::Client;

// Running these tests together will _sometimes_ trigger a hang if the runtimes aren't
// separated correctly.

#[tokio::test]
async fn hello_reqwest() {
    let mock_api = MockApi::start().await;

    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .mount(&mock_api)
        .await;

    let resp = Client::new().get(mock_api.uri()).send().await.unwrap();

    assert_eq!(resp.status(), 200);
}

#[actix_rt::test]
async fn hello_reqwest_actix() {
    let mock_api = MockApi::start().await;

    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .mount(&mock_api)
        .await;

    let resp = Client::new().get(mock_api.uri()).send().await.unwrap();

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn hello_reqwest_http2() {
    let mock_api = MockApi::start().await;

    Expectation::given(RequestPattern::new("GET", "/"))
        .respond_with(Reply::new(200))
        .mount(&mock_api)
        .await;

    let resp = Client::builder()
        .http2_prior_knowledge()
        .build()
        .expect("http client")
        .get(mock_api.uri())
        .send()
        .await
        .expect("response");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.version(), reqwest::Version::HTTP_2);
}
