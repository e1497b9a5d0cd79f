//! Deciding whether the body of an incoming request matches the body declared by an
//! [`Expectation`](crate::Expectation).
//!
//! Two comparison modes are available:
//! - byte-exact, for bodies declared as raw bytes/strings or for requests whose content type
//!   is not structured (e.g. `text/plain`);
//! - structural, for bodies declared as JSON values: both sides are decoded and compared as
//!   data trees, so formatting, key order and integer-vs-float representation do not matter.
//!   Integers are compared exactly, even past the range an `f64` can represent.
//!
//! A JSON declaration never forces JSON decoding onto a payload the client labelled as
//! something else: a `text/plain` request is compared byte-by-byte against the rendered JSON.
use assert_json_diff::{assert_json_matches_no_panic, CompareMode, Config, NumericMode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

/// The body an [`Expectation`](crate::Expectation) expects to receive.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedBody {
    /// Compared byte-by-byte.
    Raw(Vec<u8>),
    /// Compared structurally when the request carries (or is assumed to carry) JSON.
    Structured(Value),
}

/// The outcome of [`compare_bodies`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyComparison {
    Match,
    /// The body was readable but different. Carries a human-readable explanation.
    Mismatch(String),
    /// Structural comparison was required but the body could not be decoded.
    Undecodable(String),
}

impl BodyComparison {
    /// `true` if the bodies are considered equal.
    pub fn is_match(&self) -> bool {
        matches!(self, BodyComparison::Match)
    }
}

/// Compare the body of an incoming request against the expected one.
///
/// `live_content_type` is the `content-type` of the incoming request *after* header filtering:
/// `None` means that either the client did not send one or it has been filtered out, in which
/// case the way the body was declared decides the comparison mode.
///
/// ### Example:
/// ```rust
/// use mock_http_api::{compare_bodies, BodyComparison, ExpectedBody};
/// use serde_json::json;
///
/// let expected = ExpectedBody::Structured(json!({ "a": 1, "b": [1, 2] }));
///
/// // Key order, whitespace and number representation are irrelevant.
/// let outcome = compare_bodies(
///     br#"{ "b": [1, 2.0],   "a": 1 }"#,
///     Some("application/json"),
///     Some(&expected),
/// );
/// assert_eq!(outcome, BodyComparison::Match);
///
/// // A `text/plain` request is compared literally.
/// let outcome = compare_bodies(br#"{"b":[1,2],"a":1}"#, Some("text/plain"), Some(&expected));
/// assert!(!outcome.is_match());
/// ```
pub fn compare_bodies(
    live_body: &[u8],
    live_content_type: Option<&str>,
    expected: Option<&ExpectedBody>,
) -> BodyComparison {
    match expected {
        None => BodyComparison::Match,
        Some(ExpectedBody::Raw(bytes)) => compare_bytes(live_body, bytes),
        Some(ExpectedBody::Structured(value)) => match live_content_type {
            Some(content_type) if !is_structured_content_type(content_type) => {
                compare_bytes(live_body, value.to_string().as_bytes())
            }
            _ => compare_structured(live_body, value),
        },
    }
}

/// `true` for `application/json` and for any `+json` media type (e.g. `application/problem+json`).
pub(crate) fn is_structured_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

fn compare_bytes(live: &[u8], expected: &[u8]) -> BodyComparison {
    if live == expected {
        BodyComparison::Match
    } else {
        BodyComparison::Mismatch(format!(
            "expected body `{}`, got `{}`",
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(live)
        ))
    }
}

fn compare_structured(live: &[u8], expected: &Value) -> BodyComparison {
    let live = match serde_json::from_slice::<Value>(live) {
        Ok(live) => live,
        Err(e) => {
            return BodyComparison::Undecodable(format!(
                "body is not valid structured data: {}",
                e
            ));
        }
    };

    let config = Config::new(CompareMode::Strict).numeric_mode(NumericMode::Strict);
    match assert_json_matches_no_panic(&normalize(live), &normalize(expected.clone()), config) {
        Ok(()) => BodyComparison::Match,
        Err(diff) => BodyComparison::Mismatch(diff),
    }
}

/// Rewrite every RFC 3339 timestamp as UTC so that `2019-01-01T12:34:56Z` and
/// `2019-01-01T13:34:56+01:00` compare equal, and every float without a fractional part as an
/// integer so that `1.0` and `1` do.
fn normalize(value: Value) -> Value {
    match value {
        Value::Number(number) => Value::Number(normalize_number(number)),
        Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(timestamp) => Value::String(
                timestamp
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            Err(_) => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect(),
        ),
        scalar => scalar,
    }
}

fn normalize_number(number: Number) -> Number {
    // 2^64: the first float past `u64::MAX`.
    const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 => {
            if (0.0..U64_BOUND).contains(&float) {
                Number::from(float as u64)
            } else if float >= i64::MIN as f64 && float < 0.0 {
                Number::from(float as i64)
            } else {
                number
            }
        }
        _ => number,
    }
}
