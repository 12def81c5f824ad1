//! Declarative HTTP request binding for axum services.

pub mod binding;
pub mod config;
pub mod descriptor;
pub mod http;
pub mod observability;

pub use binding::{bind, BindError, BindRequest, Binder, BinderChain, UploadedFile};
pub use config::AppConfig;
pub use descriptor::{Bindable, FieldDef};
pub use http::{HttpError, HttpServer, Pipeline};
