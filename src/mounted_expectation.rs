use crate::pattern::Mismatch;
use crate::reply::ResolvedReply;
use crate::verification::VerificationReport;
use crate::{Expectation, HeaderFilter, Request};

/// Given the behaviour specification as an [`Expectation`], keep track of runtime information
/// concerning it - e.g. how many times it matched an incoming request.
pub(crate) struct MountedExpectation {
    pub(crate) specification: Expectation,
    /// The reply, rendered once at registration time.
    reply: ResolvedReply,
    call_count: u64,
    /// The position occupied by this expectation within the parent registry.
    ///
    /// E.g. `0` if this is the first expectation we try to match against an incoming request,
    /// `1` if it is the second, etc.
    position_in_set: usize,
    matched_requests: Vec<Request>,
}

impl MountedExpectation {
    pub(crate) fn new(specification: Expectation, position_in_set: usize) -> Self {
        let reply = specification.reply.resolve();
        Self {
            specification,
            reply,
            call_count: 0,
            position_in_set,
            matched_requests: Vec::new(),
        }
    }

    /// This takes a mutable reference to `self` in order to bump the call counter and
    /// start refusing requests once the consumption policy has been exhausted.
    ///
    /// The cap is checked *before* the pattern: an exhausted expectation never gets to
    /// evaluate (and count) a request.
    pub(crate) fn try_match(
        &mut self,
        request: &Request,
        header_filter: &HeaderFilter,
    ) -> Result<ResolvedReply, Mismatch> {
        let policy = self.specification.policy;
        if !policy.permits_another(self.call_count) {
            return Err(Mismatch::Exhausted {
                policy,
                call_count: self.call_count,
            });
        }

        self.specification
            .pattern
            .evaluate(request, header_filter)?;

        self.call_count += 1;
        self.matched_requests.push(request.clone());
        Ok(self.reply.clone())
    }

    pub(crate) fn call_count(&self) -> u64 {
        self.call_count
    }

    /// Compare the number of calls received against the requirements of the consumption policy.
    pub(crate) fn verify(&self) -> VerificationReport {
        VerificationReport {
            expectation_name: self.specification.name.clone(),
            pattern: self.specification.pattern.to_string(),
            policy: self.specification.policy,
            call_count: self.call_count,
            position_in_set: self.position_in_set,
        }
    }

    /// A short, human-readable description, used in diagnostics.
    pub(crate) fn summary(&self) -> String {
        match &self.specification.name {
            Some(name) => format!(
                "Expectation #{} ({}): {}",
                self.position_in_set, name, self.specification.pattern
            ),
            None => format!(
                "Expectation #{}: {}",
                self.position_in_set, self.specification.pattern
            ),
        }
    }

    pub(crate) fn received_requests(&self) -> Vec<Request> {
        self.matched_requests.clone()
    }
}
