//! The destination record as seen by binders.
//!
//! # Responsibilities
//! - Pair a record with its cached descriptor
//! - Apply decoded values, JSON objects, files and credentials to fields
//!
//! # Design Decisions
//! - The record is type-erased so the binder chain stays object-safe
//! - Value decoding collects every field failure before reporting

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::binding::decode::FormValues;
use crate::binding::error::{BindError, BindResult};
use crate::binding::upload::UploadedFile;
use crate::descriptor::{self, Bindable, Shape, TypeDescriptor};

/// A record being bound, with the descriptor of its type.
pub struct Target<'a> {
    record: &'a mut (dyn Any + Send),
    descriptor: Arc<TypeDescriptor>,
}

impl<'a> Target<'a> {
    pub fn new<T: Bindable>(record: &'a mut T) -> Self {
        Self {
            descriptor: descriptor::describe::<T>(),
            record,
        }
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Apply every value whose key the descriptor recognizes.
    ///
    /// Unknown keys are ignored. Fields absent from `values` are untouched.
    pub fn decode_values(&mut self, values: &FormValues) -> BindResult {
        let mut failures = Vec::new();

        for field in self.descriptor.fields() {
            let Shape::Value { text, .. } = &field.shape else {
                continue;
            };
            let Some(raw) = values.get(field.key()) else {
                continue;
            };
            if let Err(reason) = text(&mut *self.record, raw) {
                failures.push(format!("invalid value for {:?}: {reason}", field.key()));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BindError::Decode(failures.join("; ")))
        }
    }

    /// Apply a decoded JSON document.
    ///
    /// `null` binds nothing. Keys match a field's JSON key exactly, else
    /// ASCII case-insensitively; an exact match is applied last so it wins.
    /// With `deny_unknown`, a key matching no field fails before any field is
    /// written.
    pub fn decode_json(&mut self, document: Value, deny_unknown: bool) -> BindResult {
        let object = match document {
            Value::Null => return Ok(()),
            Value::Object(object) => object,
            other => {
                return Err(BindError::decode(format!(
                    "json: cannot bind {} into {}",
                    json_kind(&other),
                    self.descriptor.type_name()
                )))
            }
        };

        let mut folded = Vec::new();
        let mut exact = Vec::new();
        for (key, value) in object {
            match self.json_field(&key) {
                Some((index, true)) => exact.push((index, key, value)),
                Some((index, false)) => folded.push((index, key, value)),
                None if deny_unknown => {
                    return Err(BindError::decode(format!("json: unknown field {key:?}")));
                }
                None => {}
            }
        }

        for (index, key, value) in folded.into_iter().chain(exact) {
            if let Shape::Value { json, .. } = &self.descriptor.fields()[index].shape {
                json(&mut *self.record, value)
                    .map_err(|reason| BindError::decode(format!("json: field {key:?}: {reason}")))?;
            }
        }
        Ok(())
    }

    /// Index of the value field bound to JSON `key`, and whether the match
    /// was exact.
    fn json_field(&self, key: &str) -> Option<(usize, bool)> {
        let mut folded = None;
        for (index, field) in self.descriptor.fields().iter().enumerate() {
            let (Some(json_key), Shape::Value { .. }) = (field.json_key(), &field.shape) else {
                continue;
            };
            if json_key == key {
                return Some((index, true));
            }
            if folded.is_none() && json_key.eq_ignore_ascii_case(key) {
                folded = Some((index, false));
            }
        }
        folded
    }

    /// Assign uploaded files to file fields by form key.
    pub fn assign_files(&mut self, files: &HashMap<String, Vec<UploadedFile>>) {
        for file_field in self.descriptor.file_fields() {
            let Some(uploaded) = files.get(&file_field.form_key) else {
                continue;
            };
            if let Shape::File { assign, .. } = &self.descriptor.fields()[file_field.field].shape {
                assign(&mut *self.record, uploaded);
            }
        }
    }

    /// Fill the credential fields that are still empty.
    ///
    /// Empty credentials are never written.
    pub fn fill_credentials(&mut self, client_id: &str, client_secret: &str) {
        let Some(credentials) = self.descriptor.credential_fields() else {
            return;
        };
        let slots = [(credentials.client_id, client_id), (credentials.client_secret, client_secret)];

        for (slot, value) in slots {
            let (Some(index), false) = (slot, value.is_empty()) else {
                continue;
            };
            if let Shape::Value { fill: Some(fill), .. } = &self.descriptor.fields()[index].shape {
                fill(&mut *self.record, value);
            }
        }
    }
}

impl std::fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target").field("record", &self.descriptor.type_name()).finish()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
