use criterion::{criterion_group, criterion_main, Criterion};
use mock_http_api::{
    compare_bodies, Expectation, ExpectationRegistry, ExpectedBody, HeaderFilter, Reply, Request,
    RequestPattern,
};
use serde_json::json;

// The request only matches the last expectation: every candidate is evaluated.
pub fn resolve_last_of_twenty(c: &mut Criterion) {
    let registry = ExpectationRegistry::new();
    for i in 0..20 {
        registry.register(
            Expectation::given(
                RequestPattern::new("POST", format!("/v1/items/{}", i))
                    .header("authorization", "Bearer token")
                    .body_json(json!({ "id": i, "tags": ["a", "b"] })),
            )
            .respond_with(Reply::new(200).set_body_json(json!({ "ok": true }))),
        );
    }
    let request = Request::new("POST", "/v1/items/19")
        .with_header("authorization", "Bearer token")
        .with_header("content-type", "application/json")
        .with_body(r#"{"tags": ["a", "b"], "id": 19}"#);
    let filter = HeaderFilter::new(["user-agent", "date"]);

    c.bench_function("ExpectationRegistry::resolve", |b| {
        b.iter(|| registry.resolve(&request, &filter))
    });
}

pub fn compare_structured_bodies(c: &mut Criterion) {
    let expected = ExpectedBody::Structured(json!({
        "question": "What is the answer?",
        "sent_at": "2019-01-01T12:34:56Z",
        "context": { "lang": "en", "attempt": 1 }
    }));
    let body = br#"{"context": {"attempt": 1.0, "lang": "en"}, "sent_at": "2019-01-01T13:34:56+01:00", "question": "What is the answer?"}"#;

    c.bench_function("compare_bodies (structured)", |b| {
        b.iter(|| compare_bodies(body, Some("application/json"), Some(&expected)))
    });
}

criterion_group!(benches, resolve_last_of_twenty, compare_structured_bodies);
criterion_main!(benches);
