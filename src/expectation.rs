use crate::{ExpectationId, MockApi, Reply, RequestPattern};
use std::fmt;

/// Caps how many times an [`Expectation`] may match and, at the same time, how many times it
/// must have matched when the [`MockApi`] is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionPolicy {
    /// Matches any number of requests, including none. Never reported as unfulfilled.
    Unlimited,
    /// Matches exactly one request.
    ExactlyOnce,
    /// Matches exactly `n` requests.
    ExactlyN(u64),
}

impl ConsumptionPolicy {
    /// The maximum number of requests this policy lets an expectation match, if any.
    pub fn max_matches(&self) -> Option<u64> {
        match self {
            ConsumptionPolicy::Unlimited => None,
            ConsumptionPolicy::ExactlyOnce => Some(1),
            ConsumptionPolicy::ExactlyN(n) => Some(*n),
        }
    }

    /// The number of requests that must have matched at verification time, if any.
    pub fn required_matches(&self) -> Option<u64> {
        self.max_matches()
    }

    /// `true` if an expectation with this policy can take one more request after `n_calls`.
    pub(crate) fn permits_another(&self, n_calls: u64) -> bool {
        self.max_matches().map_or(true, |max| n_calls < max)
    }

    /// `true` if `n_calls` fulfills this policy.
    pub(crate) fn is_satisfied_by(&self, n_calls: u64) -> bool {
        self.required_matches().map_or(true, |required| n_calls == required)
    }
}

impl fmt::Display for ConsumptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumptionPolicy::Unlimited => write!(f, "an unlimited policy"),
            ConsumptionPolicy::ExactlyOnce => write!(f, "an exactly-once policy"),
            ConsumptionPolicy::ExactlyN(n) => write!(f, "an exactly-{} policy", n),
        }
    }
}

/// Given a [`RequestPattern`], build an [`Expectation`] using [`ExpectationBuilder::respond_with`].
#[derive(Debug)]
pub struct ExpectationBuilder {
    pub(crate) pattern: RequestPattern,
}

impl ExpectationBuilder {
    /// Establish what [`Reply`] should be used to answer requests matching the pattern.
    pub fn respond_with(self, reply: Reply) -> Expectation {
        Expectation {
            pattern: self.pattern,
            reply,
            policy: ConsumptionPolicy::Unlimited,
            name: None,
        }
    }
}

/// An `Expectation` tells a [`MockApi`] how to answer a class of requests, and how many such
/// requests it should see.
///
/// An expectation is made of:
/// - a [`RequestPattern`], describing the requests it answers;
/// - a [`Reply`], sent back verbatim for every matching request;
/// - a [`ConsumptionPolicy`], [`ConsumptionPolicy::Unlimited`] unless you say otherwise.
///
/// Expectations are not effective until they are [`mount`]ed on a [`MockApi`].
/// They are tried in the order they were mounted: the first one whose pattern matches, and
/// whose policy still allows another match, answers the request.
///
/// ### Example:
/// ```rust
/// use mock_http_api::{Expectation, MockApi, Reply, RequestPattern};
/// use serde_json::json;
///
/// #[async_std::main]
/// async fn main() {
///     // Arrange
///     let mock_api = MockApi::start().await;
///
///     Expectation::given(RequestPattern::new("GET", "/my/endpoint"))
///         .respond_with(Reply::new(200).set_body_json(json!({ "foo": "bar" })))
///         .once()
///         .mount(&mock_api)
///         .await;
///
///     // Act
///     let response = reqwest::get(format!("{}/my/endpoint", mock_api.uri()))
///         .await
///         .unwrap();
///
///     // Assert
///     assert_eq!(response.status(), 200);
///     let body: serde_json::Value = response.json().await.unwrap();
///     assert_eq!(body, json!({ "foo": "bar" }));
///
///     // The expectation is verified when `mock_api` goes out of scope.
/// }
/// ```
///
/// [`mount`]: Expectation::mount
#[derive(Debug, Clone)]
pub struct Expectation {
    pub(crate) pattern: RequestPattern,
    pub(crate) reply: Reply,
    pub(crate) policy: ConsumptionPolicy,
    pub(crate) name: Option<String>,
}

impl Expectation {
    /// Start building an `Expectation` for requests matching `pattern`.
    pub fn given(pattern: RequestPattern) -> ExpectationBuilder {
        ExpectationBuilder { pattern }
    }

    /// Match exactly one request, and require that one request to happen.
    pub fn once(self) -> Self {
        self.policy(ConsumptionPolicy::ExactlyOnce)
    }

    /// Match exactly two requests, and require both to happen.
    pub fn twice(self) -> Self {
        self.times(2)
    }

    /// Match exactly `n` requests, and require all of them to happen.
    pub fn times(self, n: u64) -> Self {
        self.policy(ConsumptionPolicy::ExactlyN(n))
    }

    /// Match any number of requests, none required. This is the default.
    pub fn unlimited(self) -> Self {
        self.policy(ConsumptionPolicy::Unlimited)
    }

    pub fn policy(mut self, policy: ConsumptionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Assign a name to your expectation.
    ///
    /// The name is used in verification and no-match reports, making them easier to relate
    /// to the expectation you declared.
    pub fn named<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn pattern(&self) -> &RequestPattern {
        &self.pattern
    }

    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    pub fn consumption_policy(&self) -> ConsumptionPolicy {
        self.policy
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Mount this expectation on a [`MockApi`], making it effective.
    ///
    /// `mount` is an asynchronous method, make sure to `.await` it!
    pub async fn mount(self, api: &MockApi) -> ExpectationId {
        api.register(self).await
    }
}
