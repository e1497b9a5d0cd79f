use http::{HeaderMap, HeaderName};
use std::collections::HashSet;
use std::convert::TryInto;

/// A set of header names that are ignored when matching incoming requests against
/// [`Expectation`]s and when rendering diagnostics.
///
/// HTTP clients tend to inject headers the test does not care about (`user-agent`,
/// `accept-encoding`, `content-length`, ...): filtering them out lets you declare
/// expectations without having to mirror every header your client sends.
///
/// Header names are case-insensitive: `User-Agent` and `user-agent` are the same entry.
///
/// ### Example:
/// ```rust
/// use mock_http_api::HeaderFilter;
///
/// let filter = HeaderFilter::new(["User-Agent", "accept-encoding"]);
///
/// assert!(filter.contains("user-agent"));
/// assert!(filter.contains("Accept-Encoding"));
/// assert!(!filter.contains("authorization"));
/// ```
///
/// [`Expectation`]: crate::Expectation
#[derive(Debug, Clone, Default)]
pub struct HeaderFilter(HashSet<HeaderName>);

impl HeaderFilter {
    /// Build a filter from a list of header names.
    ///
    /// It panics if one of the names is not a valid header name.
    pub fn new<K, I>(names: I) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        I: IntoIterator<Item = K>,
    {
        let names = names
            .into_iter()
            .map(|name| name.try_into().expect("Failed to convert to header name."))
            .collect();
        Self(names)
    }

    /// A filter that lets every header through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` if headers named `name` are ignored.
    ///
    /// Names that are not valid header names are never filtered.
    pub fn contains(&self, name: &str) -> bool {
        HeaderName::from_bytes(name.as_bytes())
            .map(|name| self.0.contains(&name))
            .unwrap_or(false)
    }

    pub(crate) fn contains_name(&self, name: &HeaderName) -> bool {
        self.0.contains(name)
    }

    /// `true` if no header is filtered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a copy of `headers` without any of the filtered names.
    pub fn apply(&self, headers: &HeaderMap) -> HeaderMap {
        if self.0.is_empty() {
            return headers.clone();
        }
        let mut filtered = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if !self.contains_name(name) {
                filtered.append(name.clone(), value.clone());
            }
        }
        filtered
    }
}
