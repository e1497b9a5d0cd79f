use std::fmt;

use http::{HeaderMap, Method};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use url::Url;

use crate::HeaderFilter;

pub const BODY_PRINT_LIMIT: usize = 10_000;

pub(crate) type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Specifies limitations on printing request bodies when logging requests. For some mock servers
/// the bodies may be too large to reasonably print and it may be desirable to limit them.
#[derive(Debug, Copy, Clone)]
pub enum BodyPrintLimit {
    /// Maximum length of a body to print in bytes.
    Limited(usize),
    /// There is no limit to the size of a body that may be printed.
    Unlimited,
}

/// An incoming request to an instance of [`MockApi`].
///
/// The body of an HTTP request is a stream that can be consumed only once: the transport
/// reads it fully when the request arrives and stores the bytes here, so that matching
/// and diagnostics can look at it as many times as they need.
///
/// [`MockApi`]: crate::MockApi
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Request {
    /// Build a request by hand - e.g. to drive a [`Dispatcher`](crate::Dispatcher) or an
    /// [`ExpectationRegistry`](crate::ExpectationRegistry) without going through HTTP.
    ///
    /// `path_and_query` is resolved against `http://localhost`.
    /// It panics if `method` is not a valid HTTP method or `path_and_query` is not a valid path.
    pub fn new<M: AsRef<str>>(method: M, path_and_query: &str) -> Self {
        let method: Method = method
            .as_ref()
            .to_ascii_uppercase()
            .parse()
            .expect("Failed to convert to HTTP method.");
        let url = Url::parse("http://localhost")
            .and_then(|base| base.join(path_and_query))
            .expect("Failed to parse request path.");
        Self {
            url,
            method,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Append a header, panicking if name or value are invalid.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name: http::HeaderName = name.parse().expect("Failed to convert to header name.");
        let value: http::HeaderValue = value.parse().expect("Failed to convert to header value.");
        self.headers.append(name, value);
        self
    }

    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The value of the `content-type` header, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// A copy of this request without the headers listed in `filter`.
    pub(crate) fn filtered(&self, filter: &HeaderFilter) -> Request {
        Request {
            url: self.url.clone(),
            method: self.method.clone(),
            headers: filter.apply(&self.headers),
            body: self.body.clone(),
        }
    }

    pub(crate) async fn from_hyper(
        request: hyper::Request<hyper::body::Incoming>,
    ) -> Result<Request, DynError> {
        let (parts, body) = request.into_parts();
        let url: Url = match parts.uri.authority() {
            Some(_) => parts.uri.to_string(),
            None => format!("http://localhost{}", parts.uri),
        }
        .parse()?;

        let body = body.collect().await?.to_bytes();

        Ok(Self {
            url,
            method: parts.method,
            headers: parts.headers,
            body: body.to_vec(),
        })
    }

    pub(crate) fn print_with_limit(
        &self,
        mut buffer: impl fmt::Write,
        body_print_limit: BodyPrintLimit,
    ) -> fmt::Result {
        writeln!(buffer, "{} {}", self.method, self.url)?;
        for name in self.headers.keys() {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>();
            let values = values.join(",");
            writeln!(buffer, "{}: {}", name, values)?;
        }

        match body_print_limit {
            BodyPrintLimit::Limited(limit) if self.body.len() > limit => {
                // Back off to the closest char boundary, at most three bytes away.
                let truncated = (limit.saturating_sub(3)..=limit)
                    .rev()
                    .find_map(|end_byte| std::str::from_utf8(&self.body[..end_byte]).ok());
                match truncated {
                    Some(truncated) => {
                        writeln!(buffer, "{}", truncated)?;
                        writeln!(
                            buffer,
                            "We truncated the body because it was too large: {} bytes (limit: {} bytes)",
                            self.body.len(),
                            limit
                        )?;
                        writeln!(
                            buffer,
                            "Increase this limit by setting `MOCK_HTTP_API_BODY_PRINT_LIMIT`, or calling `MockApiBuilder::body_print_limit` when building your MockApi instance"
                        )
                    }
                    None => writeln!(
                        buffer,
                        "Body is likely binary (invalid utf-8) size is {} bytes",
                        self.body.len()
                    ),
                }
            }
            _ => {
                if let Ok(body) = std::str::from_utf8(&self.body) {
                    writeln!(buffer, "{}", body)
                } else {
                    writeln!(
                        buffer,
                        "Body is likely binary (invalid utf-8) size is {} bytes",
                        self.body.len()
                    )
                }
            }
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print_with_limit(f, BodyPrintLimit::Limited(BODY_PRINT_LIMIT))
    }
}
