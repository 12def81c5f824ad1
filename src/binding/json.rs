//! JSON body binder.

use async_trait::async_trait;
use serde_json::Value;

use crate::binding::error::{BindError, BindResult};
use crate::binding::request::BindRequest;
use crate::binding::target::Target;
use crate::binding::{Binder, BinderKind};

/// Whether a media type essence is JSON (`application/json` or `+json`).
pub fn is_json_media_type(media_type: &str) -> bool {
    media_type == "application/json"
        || media_type
            .strip_prefix("application/")
            .is_some_and(|subtype| subtype.ends_with("+json"))
}

/// Decodes a JSON body into the record.
///
/// The body is read completely before any field is written.
#[derive(Debug, Clone, Copy)]
pub struct JsonBinder {
    deny_unknown_fields: bool,
    deny_trailing_data: bool,
}

impl Default for JsonBinder {
    fn default() -> Self {
        Self {
            deny_unknown_fields: true,
            deny_trailing_data: true,
        }
    }
}

impl JsonBinder {
    pub fn new(deny_unknown_fields: bool, deny_trailing_data: bool) -> Self {
        Self {
            deny_unknown_fields,
            deny_trailing_data,
        }
    }

    /// Accept unknown keys and trailing data.
    pub fn permissive() -> Self {
        Self::new(false, false)
    }

    pub fn deny_unknown_fields(&self) -> bool {
        self.deny_unknown_fields
    }

    pub fn deny_trailing_data(&self) -> bool {
        self.deny_trailing_data
    }

    fn parse(&self, body: &[u8]) -> BindResult<Value> {
        if self.deny_trailing_data {
            return serde_json::from_slice(body).map_err(|e| BindError::decode(format!("json: {e}")));
        }
        match serde_json::Deserializer::from_slice(body).into_iter::<Value>().next() {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(BindError::decode(format!("json: {e}"))),
            None => Err(BindError::decode("json: no value in body")),
        }
    }
}

#[async_trait]
impl Binder for JsonBinder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn kind(&self) -> BinderKind {
        BinderKind::Body
    }

    fn matches(&self, request: &BindRequest) -> bool {
        request.media_type().is_some_and(|media| is_json_media_type(&media))
    }

    async fn bind(&self, request: &mut BindRequest, target: &mut Target<'_>) -> BindResult {
        let body = request.read_body().await?;
        if body.is_empty() {
            return Ok(());
        }
        let document = self.parse(&body)?;
        target.decode_json(document, self.deny_unknown_fields)
    }
}
