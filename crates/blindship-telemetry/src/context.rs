//! Per-request context for log correlation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation data for one inbound request.
///
/// The gateway creates one of these per HTTP request and runs the handler
/// inside [`RequestContext::span`], so the broker components' log lines carry
/// the request id, endpoint and calling carrier without threading them through
/// every function signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique request identifier (taken from `x-request-id` when valid).
    pub request_id: Uuid,
    /// When the request started.
    pub started_at: DateTime<Utc>,
    /// Component that created this context.
    pub source: String,
    /// Endpoint or operation being performed.
    pub operation: Option<String>,
    /// HTTP method, when the request came over HTTP.
    pub method: Option<String>,
    /// Carrier that made the call, when known.
    pub carrier: Option<String>,
}

impl RequestContext {
    /// Create a new request context.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            method: None,
            carrier: None,
        }
    }

    /// Reuse a caller-supplied request id.
    #[must_use]
    pub fn with_request_id(mut self, id: Uuid) -> Self {
        self.request_id = id;
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the calling carrier.
    #[must_use]
    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = Some(carrier.into());
        self
    }

    /// Elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed().num_milliseconds()
    }

    /// A tracing span carrying this context.
    ///
    /// `carrier` is declared even when unknown so handlers can fill it in
    /// later with `Span::record`.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        let span = tracing::info_span!(
            "request",
            request_id = %self.request_id,
            source = %self.source,
            method = self.method.as_deref(),
            operation = self.operation.as_deref(),
            carrier = tracing::field::Empty,
        );
        if let Some(carrier) = &self.carrier {
            span.record("carrier", carrier.as_str());
        }
        span
    }

    /// First 8 characters of the request id.
    #[must_use]
    pub fn short_id(&self) -> String {
        let mut id = self.request_id.simple().to_string();
        id.truncate(8);
        id
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_creation() {
        let ctx = RequestContext::new("gateway");
        assert_eq!(ctx.source, "gateway");
        assert!(ctx.operation.is_none());
        assert!(ctx.carrier.is_none());
    }

    #[test]
    fn test_request_context_builder() {
        let id = Uuid::new_v4();
        let ctx = RequestContext::new("gateway")
            .with_request_id(id)
            .with_method("POST")
            .with_operation("/resolve")
            .with_carrier("usps");

        assert_eq!(ctx.request_id, id);
        assert_eq!(ctx.method.as_deref(), Some("POST"));
        assert_eq!(ctx.operation.as_deref(), Some("/resolve"));
        assert_eq!(ctx.carrier.as_deref(), Some("usps"));
    }

    #[test]
    fn test_elapsed() {
        let ctx = RequestContext::new("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed_ms() >= 10);
    }

    #[test]
    fn test_short_id() {
        let ctx = RequestContext::new("test");
        assert_eq!(ctx.short_id().len(), 8);
    }

    #[test]
    fn test_span_without_subscriber() {
        // Spans are inert without a subscriber but must still be constructible.
        let ctx = RequestContext::new("test").with_carrier("dhl");
        let span = ctx.span();
        let _entered = span.enter();
    }
}
