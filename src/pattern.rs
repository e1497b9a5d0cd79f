//! The request half of an [`Expectation`](crate::Expectation): which method, path, query
//! parameters, headers and body an incoming request must have to be answered.
use crate::body::{compare_bodies, BodyComparison, ExpectedBody};
use crate::{ConsumptionPolicy, HeaderFilter, Request};
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::convert::TryInto;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Describes the requests an [`Expectation`](crate::Expectation) responds to.
///
/// Method and path are always checked. Query parameters, headers and body are only checked
/// if you declare them: anything left out is unconstrained.
///
/// ### Example:
/// ```rust
/// use mock_http_api::RequestPattern;
/// use serde_json::json;
///
/// let pattern = RequestPattern::new("post", "/v1/ask")
///     .header("authorization", "Bearer token")
///     .query_param("lang", "en")
///     .body_json(json!({ "question": "What is the answer?" }));
///
/// assert_eq!(pattern.to_string(), "POST /v1/ask?lang=en");
/// ```
#[derive(Debug, Clone)]
pub struct RequestPattern {
    method: Method,
    path: String,
    query_params: Vec<(String, String)>,
    headers: Vec<(HeaderName, Vec<HeaderValue>)>,
    body: Option<ExpectedBody>,
}

impl RequestPattern {
    /// Match requests with the given method (case-insensitive) on the given path.
    ///
    /// The path is matched exactly: no templating, no wildcards. A leading `/` is added if
    /// missing.
    ///
    /// It panics if the method is not a valid HTTP method, or if the path contains a query
    /// string or a host.
    pub fn new<M, P>(method: M, path: P) -> Self
    where
        M: AsRef<str>,
        P: Into<String>,
    {
        let method = Method::from_str(&method.as_ref().to_ascii_uppercase())
            .expect("Failed to convert to HTTP method.");
        let path = path.into();

        if path.contains('?') {
            panic!(
                "Can't match the path `{}` because it contains a `?`. You must use `RequestPattern::query_param` to match on query parameters (the part of the path after the `?`).",
                path
            );
        }

        if let Ok(url) = Url::parse(&path) {
            if let Some(host) = url.host_str() {
                panic!(
                    "Can't match the path `{}` because it contains the host `{}`. You don't have to specify the host - the mock API knows it. Try replacing your path with `\"{}\"`",
                    path,
                    host,
                    url.path()
                );
            }
        }

        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        Self {
            method,
            path,
            query_params: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Require a header with exactly this value.
    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        self.headers(key, vec![value])
    }

    /// Require a multi-valued header.
    ///
    /// Values are compared in order; comma-separated values in a single header line and
    /// repeated header lines are equivalent, i.e. `cache-control: no-cache, no-store` matches
    /// `headers("cache-control", vec!["no-cache", "no-store"])`.
    pub fn headers<K, V>(mut self, key: K, values: Vec<V>) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert to header name.");
        let values: Vec<HeaderValue> = values
            .into_iter()
            .map(|value| {
                value
                    .try_into()
                    .expect("Failed to convert to header value.")
            })
            .collect();
        // Split the same way incoming values are split, so that `accept: a, b` can be declared
        // either as one value or as two.
        let values = values.iter().flat_map(split_header_value).collect();
        // A later declaration for the same header replaces the earlier one.
        self.headers.retain(|(name, _)| *name != key);
        self.headers.push((key, values));
        self
    }

    /// Require a query parameter with this value. Other query parameters are allowed.
    pub fn query_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Require a body equal, byte-by-byte, to `body`.
    pub fn body_bytes<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = Some(ExpectedBody::Raw(body.into()));
        self
    }

    /// Require a body equal, byte-by-byte, to `body`.
    pub fn body_string<T: Into<String>>(self, body: T) -> Self {
        self.body_bytes(body.into().into_bytes())
    }

    /// Require a body structurally equal to the JSON rendering of `body`.
    ///
    /// See [`compare_bodies`](crate::compare_bodies) for the comparison rules.
    pub fn body_json<T: Serialize>(mut self, body: T) -> Self {
        let body = serde_json::to_value(body).expect("Failed to serialize JSON body");
        self.body = Some(ExpectedBody::Structured(body));
        self
    }

    /// Same as [`body_json`](RequestPattern::body_json), starting from an already-encoded document.
    pub fn body_json_string(mut self, body: impl AsRef<[u8]>) -> Self {
        let body = serde_json::from_slice(body.as_ref()).expect("Failed to parse JSON string");
        self.body = Some(ExpectedBody::Structured(body));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn expected_body(&self) -> Option<&ExpectedBody> {
        self.body.as_ref()
    }

    /// Check `request` against this pattern, returning the first field that disagrees.
    ///
    /// Fields are checked in this order: method, path, query parameters, headers, body.
    /// Expected headers listed in `header_filter` are not checked.
    pub(crate) fn evaluate(
        &self,
        request: &Request,
        header_filter: &HeaderFilter,
    ) -> Result<(), Mismatch> {
        if request.method != self.method {
            return Err(Mismatch::Method {
                expected: self.method.clone(),
                actual: request.method.clone(),
            });
        }

        if request.url.path() != self.path {
            return Err(Mismatch::Path {
                expected: self.path.clone(),
                actual: request.url.path().to_owned(),
            });
        }

        for (key, value) in &self.query_params {
            let found = request
                .url
                .query_pairs()
                .any(|(k, v)| k == key.as_str() && v == value.as_str());
            if !found {
                return Err(Mismatch::QueryParam {
                    key: key.clone(),
                    expected: value.clone(),
                });
            }
        }

        for (name, expected) in &self.headers {
            if header_filter.contains_name(name) {
                continue;
            }
            let actual = header_values(request, name);
            if actual != *expected {
                return Err(Mismatch::Header {
                    name: name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let content_type = if header_filter.contains_name(&http::header::CONTENT_TYPE) {
            None
        } else {
            request.content_type()
        };
        match compare_bodies(&request.body, content_type, self.body.as_ref()) {
            BodyComparison::Match => Ok(()),
            BodyComparison::Mismatch(reason) => Err(Mismatch::Body(reason)),
            BodyComparison::Undecodable(reason) => Err(Mismatch::UndecodableBody(reason)),
        }
    }
}

impl fmt::Display for RequestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        for (index, (key, value)) in self.query_params.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", separator, key, value)?;
        }
        Ok(())
    }
}

fn header_values(request: &Request, name: &HeaderName) -> Vec<HeaderValue> {
    request
        .headers
        .get_all(name)
        .iter()
        .flat_map(split_header_value)
        .collect()
}

fn split_header_value(value: &HeaderValue) -> Vec<HeaderValue> {
    match value.to_str() {
        Ok(value) => value
            .split(',')
            .map(str::trim)
            .filter_map(|v| HeaderValue::from_str(v).ok())
            .collect(),
        // Opaque bytes are compared as a whole.
        Err(_) => vec![value.clone()],
    }
}

/// Why an incoming request was not matched by a given expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// The expectation already matched as many requests as its policy allows.
    Exhausted {
        policy: ConsumptionPolicy,
        call_count: u64,
    },
    Method {
        expected: Method,
        actual: Method,
    },
    Path {
        expected: String,
        actual: String,
    },
    QueryParam {
        key: String,
        expected: String,
    },
    Header {
        name: HeaderName,
        expected: Vec<HeaderValue>,
        actual: Vec<HeaderValue>,
    },
    /// The body was readable but different.
    Body(String),
    /// The body had to be decoded as structured data and could not be.
    UndecodableBody(String),
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Exhausted { policy, call_count } => write!(
                f,
                "already matched {} time(s), the maximum allowed by {}",
                call_count, policy
            ),
            Mismatch::Method { expected, actual } => {
                write!(f, "method: expected {}, got {}", expected, actual)
            }
            Mismatch::Path { expected, actual } => {
                write!(f, "path: expected `{}`, got `{}`", expected, actual)
            }
            Mismatch::QueryParam { key, expected } => {
                write!(f, "query parameter `{}`: expected `{}`", key, expected)
            }
            Mismatch::Header {
                name,
                expected,
                actual,
            } => {
                if actual.is_empty() {
                    write!(f, "header `{}`: expected {:?}, missing", name, expected)
                } else {
                    write!(
                        f,
                        "header `{}`: expected {:?}, got {:?}",
                        name, expected, actual
                    )
                }
            }
            Mismatch::Body(reason) | Mismatch::UndecodableBody(reason) => {
                write!(f, "body: {}", reason)
            }
        }
    }
}
