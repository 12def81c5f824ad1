//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware layers)
//!     → request.rs (add request ID, used as the trace ID)
//!     → pipeline.rs (bind record, validate, call handler)
//!     → response.rs (envelope, X-Trace-ID)
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;
pub mod validate;

pub use error::HttpError;
pub use pipeline::{BindHandler, Enveloped, ErrorHook, Pipeline, Raw, Render, DEFAULT_MAX_BODY_SIZE, NO_VARY_SEARCH};
pub use request::X_REQUEST_ID;
pub use response::{Envelope, EnvelopeResponder, RequestContext, Responder, X_TRACE_ID};
pub use server::HttpServer;
pub use validate::{DerivedValidator, PermissiveValidator, ValidationError, Validator};
