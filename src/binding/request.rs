//! The request view handed to binders.
//!
//! # Responsibilities
//! - Expose head data (method, URI, headers) without consuming the body
//! - Carry path parameters resolved by the router
//! - Read the body at most once, under the installed byte ceiling
//!
//! # Design Decisions
//! - A declared `Content-Length` above the ceiling fails before any read
//! - Crossing the ceiling mid-stream is remembered, so binders that see the
//!   failure wrapped by a decoder can still report it as size-exceeded

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::RawPathParams;
use axum::http::{header, request::Parts, HeaderMap, Method, Request, Uri};
use futures_util::{Stream, TryStreamExt};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::binding::error::{BindError, BindResult};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Path parameters captured by the route match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&RawPathParams> for PathParams {
    fn from(raw: &RawPathParams) -> Self {
        raw.iter().collect()
    }
}

/// An already-routed request being bound.
pub struct BindRequest {
    parts: Parts,
    body: Option<Body>,
    path_params: PathParams,
    body_limit: Option<usize>,
    limit_hit: Arc<AtomicBool>,
}

impl BindRequest {
    pub fn new(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body)
    }

    pub fn from_parts(parts: Parts, body: Body) -> Self {
        Self {
            parts,
            body: Some(body),
            path_params: PathParams::default(),
            body_limit: None,
            limit_hit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_path_params(mut self, path_params: PathParams) -> Self {
        self.path_params = path_params;
        self
    }

    /// Install a ceiling on the number of body bytes that may be read.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Value of a path parameter; empty when the route did not capture it.
    pub fn path_value(&self, name: &str) -> &str {
        self.path_params.get(name).unwrap_or("")
    }

    /// Raw query string, if the URL carries a non-empty one.
    pub fn query(&self) -> Option<&str> {
        self.parts.uri.query().filter(|query| !query.is_empty())
    }

    /// Lower-cased media type essence of `Content-Type` (parameters dropped).
    pub fn media_type(&self) -> Option<String> {
        let raw = self.parts.headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let essence = raw.split(';').next().unwrap_or_default().trim();
        if essence.is_empty() {
            None
        } else {
            Some(essence.to_ascii_lowercase())
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.parts.headers.get(header::CONTENT_TYPE)?.to_str().ok()
    }

    pub fn body_limit(&self) -> Option<usize> {
        self.body_limit
    }

    pub fn body_consumed(&self) -> bool {
        self.body.is_none()
    }

    /// Size-exceeded error if the ceiling was crossed during a read.
    pub fn payload_too_large(&self) -> Option<BindError> {
        if self.limit_hit.load(Ordering::Relaxed) {
            Some(BindError::PayloadTooLarge {
                limit: self.body_limit.unwrap_or(usize::MAX),
            })
        } else {
            None
        }
    }

    fn take_body(&mut self) -> BindResult<Option<Limited<Body>>> {
        let Some(body) = self.body.take() else {
            return Ok(None);
        };

        if let Some(limit) = self.body_limit {
            let declared = self
                .parts
                .headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            if declared.is_some_and(|len| len > limit as u64) {
                self.limit_hit.store(true, Ordering::Relaxed);
                return Err(BindError::PayloadTooLarge { limit });
            }
        }

        Ok(Some(Limited::new(body, self.body_limit.unwrap_or(usize::MAX))))
    }

    fn read_error(&self, err: BoxError) -> BindError {
        if err.is::<LengthLimitError>() {
            self.limit_hit.store(true, Ordering::Relaxed);
            return BindError::PayloadTooLarge {
                limit: self.body_limit.unwrap_or(usize::MAX),
            };
        }
        BindError::Body(err.to_string())
    }

    /// Read the whole body. A consumed body reads as empty.
    pub async fn read_body(&mut self) -> BindResult<Bytes> {
        let Some(body) = self.take_body()? else {
            return Ok(Bytes::new());
        };
        match body.collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) => Err(self.read_error(err)),
        }
    }

    /// Take the body as a stream of chunks, still subject to the ceiling.
    pub fn body_stream(
        &mut self,
    ) -> BindResult<impl Stream<Item = Result<Bytes, BoxError>> + Send + 'static> {
        let body = self
            .take_body()?
            .unwrap_or_else(|| Limited::new(Body::empty(), usize::MAX));
        let limit_hit = Arc::clone(&self.limit_hit);

        Ok(body.into_data_stream().map_err(move |err: BoxError| {
            if err.is::<LengthLimitError>() {
                limit_hit.store(true, Ordering::Relaxed);
            }
            err
        }))
    }
}

impl std::fmt::Debug for BindRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindRequest")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("path_params", &self.path_params)
            .field("body_limit", &self.body_limit)
            .field("body_consumed", &self.body.is_none())
            .finish()
    }
}
