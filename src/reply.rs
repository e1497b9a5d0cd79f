use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use hyper::body::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::convert::TryInto;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Renders a structured reply body to bytes.
///
/// [`JsonEncoder`] is used by [`Reply::set_body_json`]; implement this trait if the service you
/// are mocking speaks another structured format.
pub trait ReplyEncoder: Send + Sync + Debug {
    /// The `content-type` of the encoded body.
    fn content_type(&self) -> &str;

    fn encode(&self, value: &Value) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl ReplyEncoder for JsonEncoder {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn encode(&self, value: &Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }
}

/// The body of a [`Reply`].
#[derive(Debug, Clone)]
pub enum ReplyBody {
    Empty,
    /// Sent as-is, with the given content type (if any).
    Raw {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    /// Rendered through `encoder` when the expectation is registered.
    Structured {
        value: Value,
        encoder: Arc<dyn ReplyEncoder>,
    },
}

/// The response returned by the mock API when an incoming request matches an
/// [`Expectation`](crate::Expectation).
///
/// ### Example:
/// ```rust
/// use mock_http_api::Reply;
/// use serde_json::json;
///
/// let reply = Reply::new(200).set_body_json(json!({ "response": "ok" }));
/// let resolved = reply.resolve();
///
/// assert_eq!(resolved.status_code(), 200);
/// assert_eq!(resolved.content_type(), Some("application/json"));
/// assert_eq!(resolved.body(), br#"{"response":"ok"}"#);
/// ```
#[derive(Clone, Debug)]
pub struct Reply {
    status_code: StatusCode,
    headers: HeaderMap,
    body: ReplyBody,
    delay: Option<Duration>,
}

// Replies are assembled while writing a test - a failed conversion is a mistake in the test
// itself. We panic with a descriptive message instead of asking callers to juggle `Result`s.
impl Reply {
    /// Start building a `Reply` with the given status code.
    ///
    /// It panics if `s` is not a valid status code.
    pub fn new<S>(s: S) -> Self
    where
        S: TryInto<StatusCode>,
        <S as TryInto<StatusCode>>::Error: std::fmt::Debug,
    {
        let status_code = s.try_into().expect("Failed to convert into status code.");
        Self {
            status_code,
            headers: HeaderMap::new(),
            body: ReplyBody::Empty,
            delay: None,
        }
    }

    /// Append a header `value` to list of headers with `key` as header name.
    pub fn append_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.append(key, value);
        self
    }

    /// Insert a header, replacing any value previously set for `key`.
    pub fn insert_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.insert(key, value);
        self
    }

    /// Set the body as raw bytes, without a content type.
    pub fn set_body_bytes<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = ReplyBody::Raw {
            bytes: body.into(),
            content_type: None,
        };
        self
    }

    /// Set the body as a JSON document. The content type is set to `application/json`.
    ///
    /// It panics if `body` cannot be serialized to JSON.
    pub fn set_body_json<B: Serialize>(self, body: B) -> Self {
        self.set_body_encoded(body, JsonEncoder)
    }

    /// Set a structured body rendered with a custom encoder.
    pub fn set_body_encoded<B, E>(mut self, body: B, encoder: E) -> Self
    where
        B: Serialize,
        E: ReplyEncoder + 'static,
    {
        let value = serde_json::to_value(body).expect("Failed to convert into body.");
        self.body = ReplyBody::Structured {
            value,
            encoder: Arc::new(encoder),
        };
        self
    }

    /// Set the body as a string. The content type is set to `text/plain`.
    pub fn set_body_string<T: Into<String>>(self, body: T) -> Self {
        self.set_body_raw(body.into().into_bytes(), "text/plain")
    }

    /// Set raw bytes as body with an explicit content type.
    pub fn set_body_raw<B: Into<Vec<u8>>>(mut self, body: B, mime: &str) -> Self {
        self.body = ReplyBody::Raw {
            bytes: body.into(),
            content_type: Some(mime.to_string()),
        };
        self
    }

    /// Wait `delay` before sending the reply.
    ///
    /// The delay is applied after matching has completed: other requests are served while
    /// this one waits.
    pub fn set_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn body(&self) -> &ReplyBody {
        &self.body
    }

    /// Render the body to bytes, once.
    pub fn resolve(&self) -> ResolvedReply {
        let (body, content_type) = match &self.body {
            ReplyBody::Empty => (Bytes::new(), None),
            ReplyBody::Raw {
                bytes,
                content_type,
            } => (Bytes::from(bytes.clone()), content_type.clone()),
            ReplyBody::Structured { value, encoder } => (
                Bytes::from(encoder.encode(value)),
                Some(encoder.content_type().to_string()),
            ),
        };
        ResolvedReply {
            status_code: self.status_code,
            content_type,
            headers: self.headers.clone(),
            body,
            delay: self.delay,
        }
    }
}

/// A [`Reply`] whose body has already been rendered to bytes.
///
/// This is what the mock API sends back, verbatim, for every matching request.
#[derive(Clone, Debug)]
pub struct ResolvedReply {
    status_code: StatusCode,
    content_type: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    delay: Option<Duration>,
}

impl ResolvedReply {
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// The reply headers, `content-type` included.
    pub(crate) fn response_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        // Set content-type, if needed
        if let Some(content_type) = self
            .content_type
            .as_deref()
            .and_then(|mime| HeaderValue::from_str(mime).ok())
        {
            headers.insert(http::header::CONTENT_TYPE, content_type);
        }
        headers
    }

    pub(crate) fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }
}
