//! Response formatting.
//!
//! # Responsibilities
//! - Render handler results and pipeline failures as HTTP responses
//! - Wrap payloads in the `{code, message, data, trace_id}` envelope
//! - Echo the trace ID in `X-Trace-ID`
//!
//! # Design Decisions
//! - Formatting sits behind [`Responder`] so services can swap the envelope
//! - Safe mode hides details of unexposed server errors from clients

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::http::error::{HttpError, CODE_OK};

/// Response header carrying the request's trace ID.
pub static X_TRACE_ID: HeaderName = HeaderName::from_static("x-trace-id");

/// Request data available to responders and error hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub trace_id: Option<String>,
}

/// The standard response envelope.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Turns pipeline outcomes into responses.
pub trait Responder: Send + Sync {
    fn success(&self, ctx: &RequestContext, value: Value) -> Response;

    fn failure(&self, ctx: &RequestContext, error: &HttpError) -> Response;
}

/// Default JSON envelope responder.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeResponder {
    no_envelope: bool,
    safe_mode: bool,
}

impl EnvelopeResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write success payloads bare instead of enveloped.
    pub fn no_envelope(mut self) -> Self {
        self.no_envelope = true;
        self
    }

    /// Hide messages of unexposed 5xx errors.
    pub fn safe_mode(mut self, enabled: bool) -> Self {
        self.safe_mode = enabled;
        self
    }
}

impl Responder for EnvelopeResponder {
    fn success(&self, ctx: &RequestContext, value: Value) -> Response {
        let response = if self.no_envelope {
            (StatusCode::OK, Json(value)).into_response()
        } else {
            let envelope = Envelope {
                code: CODE_OK.to_string(),
                message: "success".to_string(),
                data: Some(value).filter(|v| !v.is_null()),
                trace_id: ctx.trace_id.clone(),
            };
            (StatusCode::OK, Json(envelope)).into_response()
        };
        with_trace_id(response, ctx)
    }

    fn failure(&self, ctx: &RequestContext, error: &HttpError) -> Response {
        let envelope: Envelope<Value> = Envelope {
            code: error.code().to_string(),
            message: error.public_message(self.safe_mode).to_string(),
            data: None,
            trace_id: ctx.trace_id.clone(),
        };
        with_trace_id((error.status(), Json(envelope)).into_response(), ctx)
    }
}

/// Set `X-Trace-ID` unless a layer already did.
pub fn with_trace_id(mut response: Response, ctx: &RequestContext) -> Response {
    let Some(trace_id) = ctx.trace_id.as_deref() else {
        return response;
    };
    if response.headers().contains_key(&X_TRACE_ID) {
        return response;
    }
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(X_TRACE_ID.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    fn ctx(trace_id: Option<&str>) -> RequestContext {
        RequestContext {
            method: Method::GET,
            path: "/items/1".into(),
            trace_id: trace_id.map(String::from),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = EnvelopeResponder::new().success(&ctx(Some("abc")), json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&X_TRACE_ID], "abc");
        assert_eq!(
            body_json(response).await,
            json!({"code": "OK", "message": "success", "data": {"id": 1}, "trace_id": "abc"})
        );
    }

    #[tokio::test]
    async fn test_no_envelope() {
        let response = EnvelopeResponder::new().no_envelope().success(&ctx(None), json!([1, 2]));
        assert!(response.headers().get(&X_TRACE_ID).is_none());
        assert_eq!(body_json(response).await, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_failure_envelope() {
        let error = HttpError::not_found("no such item");
        let response = EnvelopeResponder::new().failure(&ctx(Some("t-1")), &error);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"code": "NOT_FOUND", "message": "no such item", "trace_id": "t-1"})
        );
    }

    #[tokio::test]
    async fn test_safe_mode_failure() {
        let error = HttpError::internal("connection refused: 10.0.0.7");
        let response = EnvelopeResponder::new().safe_mode(true).failure(&ctx(None), &error);
        assert_eq!(body_json(response).await["message"], "Internal Server Error");
    }
}
