//! The request pipeline.
//!
//! # Responsibilities
//! - Install the body ceiling before anything reads the body
//! - Bind a fresh record, validate it, then call the business function
//! - Route every failure through one funnel (metrics, error hook, responder)
//! - Advertise the record's query keys in `No-Vary-Search`
//!
//! # Data Flow
//! ```text
//! Request
//!     → body ceiling
//!     → BinderChain::bind (413 when too large, 400 otherwise)
//!     → self_validate | Validator (400 VALIDATION_FAILED)
//!     → handler(record)
//!     → Responder::success (handler) | IntoResponse (raw_handler) | fail()
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, RawPathParams};
use axum::handler::Handler;
use axum::http::{request::Parts, HeaderName, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::binding::{BindRequest, Binder, BinderChain, FormBinder, JsonBinder, PathParams};
use crate::config::BindingConfig;
use crate::descriptor::{self, Bindable};
use crate::http::error::HttpError;
use crate::http::request::request_id_from_parts;
use crate::http::response::{with_trace_id, EnvelopeResponder, RequestContext, Responder};
use crate::http::validate::{self, DerivedValidator, PermissiveValidator, Validator};
use crate::observability::metrics;

/// Default body ceiling (2 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 << 20;

pub static NO_VARY_SEARCH: HeaderName = HeaderName::from_static("no-vary-search");

/// Called for every failure before the response is written.
pub type ErrorHook = Arc<dyn Fn(&RequestContext, &HttpError) + Send + Sync>;

/// Extracts the trace ID from the request head.
pub type TraceIdSource = Arc<dyn Fn(&Parts) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NoVarySearch {
    /// Keys of the record type.
    Derived,
    Keys(Vec<String>),
    Disabled,
}

/// Pipeline configuration shared by every handler built from it.
#[derive(Clone)]
pub struct Pipeline {
    chain: BinderChain,
    max_body_size: usize,
    validator: Arc<dyn Validator>,
    responder: Arc<dyn Responder>,
    error_hook: ErrorHook,
    trace_id: TraceIdSource,
    no_vary_search: NoVarySearch,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            chain: BinderChain::default(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            validator: Arc::new(PermissiveValidator),
            responder: Arc::new(EnvelopeResponder::default()),
            error_hook: Arc::new(log_failure),
            trace_id: Arc::new(request_id_from_parts),
            no_vary_search: NoVarySearch::Derived,
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline honoring the `[binding]` configuration section.
    pub fn from_config(config: &BindingConfig) -> Self {
        Self::new()
            .max_body_size(config.max_body_size)
            .json_strictness(config.deny_unknown_fields, config.deny_trailing_data)
            .multipart_memory(config.multipart_memory)
    }

    /// Replace the binder chain.
    pub fn binders(mut self, chain: BinderChain) -> Self {
        self.chain = chain;
        self
    }

    /// Run `binders` ahead of the current chain.
    pub fn prepend_binders(mut self, binders: impl IntoIterator<Item = Arc<dyn Binder>>) -> Self {
        self.chain = self.chain.prepend(binders);
        self
    }

    /// Body ceiling in bytes; 0 disables it.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Replace the form binder with one holding `bytes` in memory.
    ///
    /// An enabled body ceiling below `bytes` is raised to it.
    pub fn multipart_memory(mut self, bytes: usize) -> Self {
        let form = FormBinder::new(bytes);
        self.chain = self.chain.replace("form", Arc::new(form));
        if self.max_body_size != 0 && self.max_body_size < form.max_memory() {
            self.max_body_size = form.max_memory();
        }
        self
    }

    pub fn json_strictness(mut self, deny_unknown_fields: bool, deny_trailing_data: bool) -> Self {
        let json = JsonBinder::new(deny_unknown_fields, deny_trailing_data);
        self.chain = self.chain.replace("json", Arc::new(json));
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Fall back to the derived `validator` rules of `T`.
    pub fn validate_derived<T: validator::Validate + 'static>(self) -> Self {
        self.validator(DerivedValidator::<T>::new())
    }

    pub fn responder(mut self, responder: impl Responder + 'static) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    pub fn error_hook(mut self, hook: impl Fn(&RequestContext, &HttpError) + Send + Sync + 'static) -> Self {
        self.error_hook = Arc::new(hook);
        self
    }

    pub fn trace_id(mut self, source: impl Fn(&Parts) -> Option<String> + Send + Sync + 'static) -> Self {
        self.trace_id = Arc::new(source);
        self
    }

    /// Advertise exactly `keys` in `No-Vary-Search`; empty means every
    /// parameter may be ignored.
    pub fn no_vary_search<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.no_vary_search = NoVarySearch::Keys(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn disable_no_vary_search(mut self) -> Self {
        self.no_vary_search = NoVarySearch::Disabled;
        self
    }

    pub fn chain(&self) -> &BinderChain {
        &self.chain
    }

    pub fn body_limit(&self) -> usize {
        self.max_body_size
    }

    /// Wrap a business function into an axum handler.
    ///
    /// Results are serialized and handed to the responder.
    pub fn handler<Req, Res, F, Fut>(&self, handler: F) -> BindHandler<Req, F>
    where
        Req: Bindable,
        Res: Serialize + Send,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, HttpError>> + Send,
    {
        self.wrap(handler)
    }

    /// Like [`Pipeline::handler`], but results are written as their own
    /// response (redirects, raw bytes, files, empty bodies).
    ///
    /// Failures still go through the responder.
    pub fn raw_handler<Req, Res, F, Fut>(&self, handler: F) -> BindHandler<Req, F, Raw>
    where
        Req: Bindable,
        Res: IntoResponse + Send,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, HttpError>> + Send,
    {
        self.wrap(handler)
    }

    fn wrap<Req: Bindable, F, M>(&self, handler: F) -> BindHandler<Req, F, M> {
        let no_vary_search = match &self.no_vary_search {
            NoVarySearch::Derived => Some(descriptor::describe::<Req>().all_keys().to_vec()),
            NoVarySearch::Keys(keys) => Some(keys.clone()),
            NoVarySearch::Disabled => None,
        }
        .and_then(|keys| HeaderValue::from_str(&format_no_vary_search(&keys)).ok());

        BindHandler {
            pipeline: Arc::new(self.clone()),
            handler: Arc::new(handler),
            no_vary_search,
            _marker: PhantomData,
        }
    }

    /// The single failure exit.
    fn fail(&self, ctx: &RequestContext, stage: &'static str, error: &HttpError) -> Response {
        metrics::record_failure(stage);
        (self.error_hook)(ctx, error);
        self.responder.failure(ctx, error)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("chain", &self.chain)
            .field("max_body_size", &self.max_body_size)
            .field("no_vary_search", &self.no_vary_search)
            .finish()
    }
}

/// `params` alone, or `params, except=("a" "b")`.
pub fn format_no_vary_search(keys: &[String]) -> String {
    if keys.is_empty() {
        return "params".to_string();
    }
    let quoted: Vec<String> = keys.iter().map(|key| format!("{key:?}")).collect();
    format!("params, except=({})", quoted.join(" "))
}

fn log_failure(ctx: &RequestContext, error: &HttpError) {
    let trace_id = ctx.trace_id.as_deref().unwrap_or("-");
    if error.status().is_server_error() {
        tracing::error!(trace_id, method = %ctx.method, path = %ctx.path, status = error.status().as_u16(), error = %error, "Request failed");
    } else {
        tracing::warn!(trace_id, method = %ctx.method, path = %ctx.path, status = error.status().as_u16(), error = %error, "Request rejected");
    }
}

/// Result rendering of envelope handlers.
#[derive(Debug, Clone, Copy)]
pub struct Enveloped;

/// Result rendering of raw handlers.
#[derive(Debug, Clone, Copy)]
pub struct Raw;

/// How a handler's successful result becomes a response.
pub trait Render<Res>: Send + Sync + 'static {
    fn render(pipeline: &Pipeline, ctx: &RequestContext, result: Res) -> Result<Response, (&'static str, HttpError)>;
}

impl<Res: Serialize> Render<Res> for Enveloped {
    fn render(pipeline: &Pipeline, ctx: &RequestContext, result: Res) -> Result<Response, (&'static str, HttpError)> {
        let value = serde_json::to_value(result)
            .map_err(|err| ("encode", HttpError::internal(format!("encode response: {err}"))))?;
        Ok(pipeline.responder.success(ctx, value))
    }
}

impl<Res: IntoResponse> Render<Res> for Raw {
    fn render(_pipeline: &Pipeline, ctx: &RequestContext, result: Res) -> Result<Response, (&'static str, HttpError)> {
        Ok(with_trace_id(result.into_response(), ctx))
    }
}

/// A business function bound to a [`Pipeline`].
pub struct BindHandler<Req, F, M = Enveloped> {
    pipeline: Arc<Pipeline>,
    handler: Arc<F>,
    no_vary_search: Option<HeaderValue>,
    _marker: PhantomData<fn() -> (Req, M)>,
}

impl<Req, F, M> Clone for BindHandler<Req, F, M> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            handler: Arc::clone(&self.handler),
            no_vary_search: self.no_vary_search.clone(),
            _marker: PhantomData,
        }
    }
}

impl<Req, Res, F, Fut, M> BindHandler<Req, F, M>
where
    Req: Bindable,
    Res: Send,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, HttpError>> + Send,
    M: Render<Res>,
{
    /// Run the pipeline for an already-routed request.
    pub async fn handle(&self, request: Request<Body>, path_params: PathParams) -> Response {
        let (parts, body) = request.into_parts();
        let ctx = RequestContext {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            trace_id: (self.pipeline.trace_id)(&parts),
        };

        let outcome = self
            .run(parts, body, path_params)
            .await
            .and_then(|result| M::render(&self.pipeline, &ctx, result));
        let mut response = match outcome {
            Ok(response) => response,
            Err((stage, error)) => self.pipeline.fail(&ctx, stage, &error),
        };

        if let Some(value) = &self.no_vary_search {
            response.headers_mut().insert(NO_VARY_SEARCH.clone(), value.clone());
        }
        response
    }

    async fn run(&self, parts: Parts, body: Body, path_params: PathParams) -> Result<Res, (&'static str, HttpError)> {
        let mut request = BindRequest::from_parts(parts, body).with_path_params(path_params);
        if self.pipeline.max_body_size > 0 {
            request = request.with_body_limit(self.pipeline.max_body_size);
        }

        let mut record = Req::default();
        self.pipeline
            .chain
            .bind(&mut request, &mut record)
            .await
            .map_err(|err| ("bind", HttpError::from(err)))?;

        validate::validate(&record, &self.pipeline.validator).map_err(|err| ("validate", HttpError::from(err)))?;

        (self.handler)(record).await.map_err(|err| ("handler", err))
    }
}

/// Marker selecting the [`Handler`] impl of [`BindHandler`].
#[derive(Debug, Clone, Copy)]
pub struct BindMarker;

impl<Req, Res, F, Fut, M, S> Handler<BindMarker, S> for BindHandler<Req, F, M>
where
    Req: Bindable,
    Res: Send + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, HttpError>> + Send + 'static,
    M: Render<Res>,
    S: Send + Sync + 'static,
{
    type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

    fn call(self, request: Request<Body>, _state: S) -> Self::Future {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let path_params = match RawPathParams::from_request_parts(&mut parts, &()).await {
                Ok(raw) => PathParams::from(&raw),
                Err(_) => PathParams::default(),
            };
            self.handle(Request::from_parts(parts, body), path_params).await
        })
    }
}
