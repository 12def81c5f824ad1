//! Field declarations for bindable records.
//!
//! A record lists its fields once through [`Bindable::fields`]. Each
//! [`FieldDef`] pairs the raw annotations with a typed accessor; the accessor
//! is erased here so that descriptors can be cached without knowing the
//! record type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::binding::upload::UploadedFile;
use crate::http::validate::ValidationError;

/// A destination record that binders can populate.
///
/// Implementations list the record's fields in declaration order:
///
/// ```
/// use httpbind::{Bindable, FieldDef};
///
/// #[derive(Default)]
/// struct GetItem {
///     id: u64,
///     verbose: bool,
/// }
///
/// impl Bindable for GetItem {
///     fn fields() -> Vec<FieldDef> {
///         vec![
///             FieldDef::value("id", |r: &mut Self| &mut r.id).path("id"),
///             FieldDef::value("verbose", |r: &mut Self| &mut r.verbose).form("v"),
///         ]
///     }
/// }
/// ```
pub trait Bindable: Default + Send + 'static {
    /// Declared fields, in declaration order.
    fn fields() -> Vec<FieldDef>;

    /// Record-implemented validation.
    ///
    /// `None` means the record does not validate itself and the configured
    /// validator is consulted instead.
    fn self_validate(&self) -> Option<Result<(), ValidationError>> {
        None
    }
}

impl Bindable for () {
    fn fields() -> Vec<FieldDef> {
        Vec::new()
    }
}

/// Conversion from a single source string.
pub trait FormValue: Sized {
    /// Whether the type holds free text (empty strings are meaningful).
    const TEXT: bool = false;

    fn parse_form(raw: &str) -> Result<Self, String>;

    /// Mutable view of the text, for text types only.
    fn as_text(&mut self) -> Option<&mut String> {
        None
    }
}

impl FormValue for String {
    const TEXT: bool = true;

    fn parse_form(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }

    fn as_text(&mut self) -> Option<&mut String> {
        Some(self)
    }
}

impl FormValue for bool {
    fn parse_form(raw: &str) -> Result<Self, String> {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "on" => Ok(true),
            "0" | "f" | "false" | "off" => Ok(false),
            _ => Err(format!("invalid boolean {raw:?}")),
        }
    }
}

impl FormValue for char {
    fn parse_form(raw: &str) -> Result<Self, String> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(format!("expected a single character, got {raw:?}")),
        }
    }
}

macro_rules! parsed_form_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FormValue for $ty {
                fn parse_form(raw: &str) -> Result<Self, String> {
                    raw.parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )*
    };
}

parsed_form_value!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

pub(crate) type TextSetter = Arc<dyn Fn(&mut dyn Any, &[String]) -> Result<(), String> + Send + Sync>;
pub(crate) type JsonSetter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<(), String> + Send + Sync>;
pub(crate) type FileSetter = Arc<dyn Fn(&mut dyn Any, &[UploadedFile]) + Send + Sync>;
/// Sets the text if it is currently empty; reports whether it did.
pub(crate) type FillSetter = Arc<dyn Fn(&mut dyn Any, &str) -> bool + Send + Sync>;

/// How many uploaded files a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Many,
}

#[derive(Clone)]
pub(crate) enum Shape {
    Value {
        text: TextSetter,
        json: JsonSetter,
        fill: Option<FillSetter>,
    },
    File {
        multiplicity: Multiplicity,
        assign: FileSetter,
    },
}

/// One declared field of a [`Bindable`] record.
#[derive(Clone)]
pub struct FieldDef {
    pub(crate) name: &'static str,
    pub(crate) form: Option<String>,
    pub(crate) json: Option<String>,
    pub(crate) path: Option<String>,
    pub(crate) shape: Shape,
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match &self.shape {
            Shape::Value { .. } => "value",
            Shape::File { multiplicity: Multiplicity::Single, .. } => "file",
            Shape::File { multiplicity: Multiplicity::Many, .. } => "files",
        };
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("form", &self.form)
            .field("json", &self.json)
            .field("path", &self.path)
            .field("shape", &shape)
            .finish()
    }
}

impl FieldDef {
    fn with_shape(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            form: None,
            json: None,
            path: None,
            shape,
        }
    }

    /// A scalar field. Repeated source keys keep the last value.
    pub fn value<T, F>(name: &'static str, access: fn(&mut T) -> &mut F) -> Self
    where
        T: 'static,
        F: FormValue + DeserializeOwned + 'static,
    {
        let text: TextSetter = Arc::new(move |record: &mut dyn Any, values: &[String]| {
            let Some(record) = record.downcast_mut::<T>() else {
                return Ok(());
            };
            match values.last() {
                Some(raw) if F::TEXT || !raw.is_empty() => {
                    *access(record) = F::parse_form(raw)?;
                    Ok(())
                }
                _ => Ok(()),
            }
        });

        let fill: Option<FillSetter> = if F::TEXT {
            Some(Arc::new(move |record: &mut dyn Any, value: &str| {
                let Some(record) = record.downcast_mut::<T>() else {
                    return false;
                };
                match access(record).as_text() {
                    Some(text) if text.is_empty() => {
                        text.push_str(value);
                        true
                    }
                    _ => false,
                }
            }))
        } else {
            None
        };

        Self::with_shape(
            name,
            Shape::Value {
                text,
                json: json_setter(access),
                fill,
            },
        )
    }

    /// An optional scalar field.
    pub fn optional<T, F>(name: &'static str, access: fn(&mut T) -> &mut Option<F>) -> Self
    where
        T: 'static,
        F: FormValue + DeserializeOwned + 'static,
    {
        let text: TextSetter = Arc::new(move |record: &mut dyn Any, values: &[String]| {
            let Some(record) = record.downcast_mut::<T>() else {
                return Ok(());
            };
            match values.last() {
                Some(raw) if F::TEXT || !raw.is_empty() => {
                    *access(record) = Some(F::parse_form(raw)?);
                    Ok(())
                }
                _ => Ok(()),
            }
        });

        Self::with_shape(
            name,
            Shape::Value {
                text,
                json: json_setter(access),
                fill: None,
            },
        )
    }

    /// A multi-valued field receiving every value of its key, in order.
    pub fn list<T, F>(name: &'static str, access: fn(&mut T) -> &mut Vec<F>) -> Self
    where
        T: 'static,
        F: FormValue + DeserializeOwned + 'static,
    {
        let text: TextSetter = Arc::new(move |record: &mut dyn Any, values: &[String]| {
            let Some(record) = record.downcast_mut::<T>() else {
                return Ok(());
            };
            let parsed = values
                .iter()
                .filter(|raw| F::TEXT || !raw.is_empty())
                .map(|raw| F::parse_form(raw))
                .collect::<Result<Vec<F>, String>>()?;
            if !parsed.is_empty() {
                *access(record) = parsed;
            }
            Ok(())
        });

        Self::with_shape(
            name,
            Shape::Value {
                text,
                json: json_setter(access),
                fill: None,
            },
        )
    }

    /// A field bound from JSON only, of any deserializable type.
    ///
    /// Nested structs, maps and lists of structs go here. Query, form and
    /// path values never reach it.
    pub fn json_value<T, V>(name: &'static str, access: fn(&mut T) -> &mut V) -> Self
    where
        T: 'static,
        V: DeserializeOwned + 'static,
    {
        let text: TextSetter = Arc::new(|_: &mut dyn Any, _: &[String]| Ok(()));

        Self::with_shape(
            name,
            Shape::Value {
                text,
                json: json_setter(access),
                fill: None,
            },
        )
    }

    /// A single uploaded file. Duplicates under the same key are discarded.
    pub fn file<T>(name: &'static str, access: fn(&mut T) -> &mut Option<UploadedFile>) -> Self
    where
        T: 'static,
    {
        let assign: FileSetter = Arc::new(move |record: &mut dyn Any, files: &[UploadedFile]| {
            if let (Some(record), Some(first)) = (record.downcast_mut::<T>(), files.first()) {
                *access(record) = Some(first.clone());
            }
        });

        Self::with_shape(
            name,
            Shape::File {
                multiplicity: Multiplicity::Single,
                assign,
            },
        )
    }

    /// Every uploaded file under the field's key, in submission order.
    pub fn files<T>(name: &'static str, access: fn(&mut T) -> &mut Vec<UploadedFile>) -> Self
    where
        T: 'static,
    {
        let assign: FileSetter = Arc::new(move |record: &mut dyn Any, files: &[UploadedFile]| {
            if let Some(record) = record.downcast_mut::<T>() {
                *access(record) = files.to_vec();
            }
        });

        Self::with_shape(
            name,
            Shape::File {
                multiplicity: Multiplicity::Many,
                assign,
            },
        )
    }

    /// Binding-specific annotation (query, form and path staging key).
    pub fn form(mut self, annotation: impl Into<String>) -> Self {
        self.form = Some(annotation.into());
        self
    }

    /// Generic payload annotation, also the JSON key.
    pub fn json(mut self, annotation: impl Into<String>) -> Self {
        self.json = Some(annotation.into());
        self
    }

    /// Name of the path parameter feeding this field.
    pub fn path(mut self, annotation: impl Into<String>) -> Self {
        self.path = Some(annotation.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn json_setter<T, V>(access: fn(&mut T) -> &mut V) -> JsonSetter
where
    T: 'static,
    V: DeserializeOwned + 'static,
{
    Arc::new(move |record: &mut dyn Any, value: Value| {
        let Some(record) = record.downcast_mut::<T>() else {
            return Ok(());
        };
        // null clears an Option and leaves every other type untouched
        if value.is_null() {
            if let Ok(cleared) = serde_json::from_value(Value::Null) {
                *access(record) = cleared;
            }
            return Ok(());
        }
        *access(record) = serde_json::from_value(value).map_err(|e| e.to_string())?;
        Ok(())
    })
}
