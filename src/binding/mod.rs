//! Request binders and the binder chain.
//!
//! # Responsibilities
//! - Define the [`Binder`] capability and its two kinds
//! - Run an ordered chain of binders against one request and one record
//! - Provide the built-in Path, Query, JSON, Form and client-credential binders
//!
//! # Design Decisions
//! - At most one body binder runs per request; metadata binders all run
//! - The first binder error aborts the chain
//! - Later binders overwrite earlier ones on shared keys, so with the default
//!   order a body value beats a query value, which beats a path value
//!
//! # Data Flow
//! ```text
//! BindRequest ──▶ Path ──▶ Query ──▶ JSON | Form ──▶ record
//!                                   (one body binder)
//! ```

pub mod client;
pub mod decode;
pub mod error;
pub mod form;
pub mod json;
pub mod path;
pub mod query;
pub mod request;
pub mod target;
pub mod upload;

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::descriptor::Bindable;
use crate::observability::metrics;

pub use client::ClientAuthBinder;
pub use decode::FormValues;
pub use error::{BindError, BindResult};
pub use form::{FormBinder, DEFAULT_MULTIPART_MEMORY};
pub use json::JsonBinder;
pub use path::PathBinder;
pub use query::QueryBinder;
pub use request::{BindRequest, PathParams};
pub use target::Target;
pub use upload::UploadedFile;

static DEFAULT_CHAIN: Lazy<BinderChain> = Lazy::new(BinderChain::default);

/// Which part of the request a binder reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderKind {
    /// Path, query or headers; any number may run.
    Metadata,
    /// The body; at most one runs per request.
    Body,
}

/// An extractor copying one request source into a record.
///
/// Binders are shared across concurrent requests and keep no per-call state.
#[async_trait]
pub trait Binder: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> BinderKind;

    /// Cheap predicate. Must not consume the body.
    fn matches(&self, request: &BindRequest) -> bool;

    async fn bind(&self, request: &mut BindRequest, target: &mut Target<'_>) -> BindResult;
}

/// Ordered list of binders.
#[derive(Clone)]
pub struct BinderChain {
    binders: Vec<Arc<dyn Binder>>,
}

impl Default for BinderChain {
    /// Path, Query, strict JSON, then Form with the default memory ceiling.
    fn default() -> Self {
        Self::new(vec![
            Arc::new(PathBinder),
            Arc::new(QueryBinder),
            Arc::new(JsonBinder::default()),
            Arc::new(FormBinder::default()),
        ])
    }
}

impl BinderChain {
    pub fn new(binders: Vec<Arc<dyn Binder>>) -> Self {
        Self { binders }
    }

    /// Insert binders ahead of the current chain, keeping their order.
    pub fn prepend(mut self, binders: impl IntoIterator<Item = Arc<dyn Binder>>) -> Self {
        let mut chain: Vec<Arc<dyn Binder>> = binders.into_iter().collect();
        chain.append(&mut self.binders);
        self.binders = chain;
        self
    }

    pub fn push(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binders.push(binder);
        self
    }

    /// Replace the binder named `name`, or append `binder` if none is.
    pub fn replace(mut self, name: &str, binder: Arc<dyn Binder>) -> Self {
        match self.binders.iter().position(|b| b.name() == name) {
            Some(index) => self.binders[index] = binder,
            None => self.binders.push(binder),
        }
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.binders.iter().map(|b| b.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.binders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty()
    }

    /// Bind `request` into `record`.
    pub async fn bind<T: Bindable>(&self, request: &mut BindRequest, record: &mut T) -> BindResult {
        let mut target = Target::new(record);
        let mut body_bound = false;

        for binder in &self.binders {
            let is_body = binder.kind() == BinderKind::Body;
            if is_body && body_bound {
                continue;
            }
            if !binder.matches(request) {
                continue;
            }

            if let Err(err) = binder.bind(request, &mut target).await {
                tracing::warn!(binder = binder.name(), record = target.descriptor().type_name(), error = %err, "Bind failed");
                metrics::record_bind(binder.name(), "error");
                return Err(err);
            }
            tracing::debug!(binder = binder.name(), record = target.descriptor().type_name(), "Binder ran");
            metrics::record_bind(binder.name(), "ok");

            if is_body {
                body_bound = true;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for BinderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Bind with the default chain.
pub async fn bind<T: Bindable>(request: &mut BindRequest, record: &mut T) -> BindResult {
    DEFAULT_CHAIN.bind(request, record).await
}
