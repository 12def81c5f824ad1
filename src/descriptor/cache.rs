//! Type descriptors and the process-wide descriptor cache.

use std::any::{type_name, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::descriptor::annotation::{self, DeclaredKey, IGNORE};
use crate::descriptor::field::{Bindable, FieldDef, Multiplicity, Shape};
use crate::observability::metrics;

/// Reserved key feeding the client-credential binder's user.
pub const CLIENT_ID_KEY: &str = "client_id";
/// Reserved key feeding the client-credential binder's password.
pub const CLIENT_SECRET_KEY: &str = "client_secret";

static GLOBAL: Lazy<DescriptorCache> = Lazy::new(DescriptorCache::new);

/// Descriptor of `T` from the process-wide cache.
pub fn describe<T: Bindable>() -> Arc<TypeDescriptor> {
    GLOBAL.get::<T>()
}

/// A field that survived key resolution.
#[derive(Clone)]
pub struct ResolvedField {
    pub(crate) name: &'static str,
    pub(crate) key: String,
    pub(crate) json_key: Option<String>,
    pub(crate) shape: Shape,
}

impl ResolvedField {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn json_key(&self) -> Option<&str> {
        self.json_key.as_deref()
    }
}

impl std::fmt::Debug for ResolvedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedField")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("json_key", &self.json_key)
            .finish()
    }
}

impl PartialEq for ResolvedField {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.key == other.key && self.json_key == other.json_key
    }
}

/// A field fed from a path parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathField {
    /// Index into [`TypeDescriptor::fields`].
    pub field: usize,
    /// Path parameter name.
    pub source_key: String,
    /// Key the value is staged under for decoding.
    pub dest_key: String,
}

/// A field holding uploaded files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileField {
    pub field: usize,
    pub form_key: String,
    pub multiplicity: Multiplicity,
}

/// Fields receiving Basic-Auth client credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialFields {
    pub client_id: Option<usize>,
    pub client_secret: Option<usize>,
}

/// Precomputed binding metadata for one record type.
///
/// Derived only from the type's declared fields, never from request data.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    type_name: &'static str,
    fields: Vec<ResolvedField>,
    path_fields: Vec<PathField>,
    file_fields: Vec<FileField>,
    credential_fields: Option<CredentialFields>,
    all_keys: Vec<String>,
}

impl TypeDescriptor {
    /// Build the descriptor of `T` from its declared fields.
    pub fn build<T: Bindable>() -> Self {
        Self::from_defs(type_name::<T>(), T::fields())
    }

    pub(crate) fn from_defs(type_name: &'static str, defs: Vec<FieldDef>) -> Self {
        let mut descriptor = Self {
            type_name,
            fields: Vec::with_capacity(defs.len()),
            path_fields: Vec::new(),
            file_fields: Vec::new(),
            credential_fields: None,
            all_keys: Vec::new(),
        };
        let mut credentials = CredentialFields::default();
        let mut seen = HashSet::new();

        for def in defs {
            let key = match annotation::resolve(def.name, def.form.as_deref(), def.json.as_deref()) {
                DeclaredKey::Key(key) => key,
                DeclaredKey::Ignored => continue,
            };
            let index = descriptor.fields.len();

            if seen.insert(key.clone()) {
                descriptor.all_keys.push(key.clone());
            }

            let json_key = match (&def.shape, def.json.as_deref().map(annotation::key_of)) {
                (Shape::File { .. }, _) => None,
                (_, Some(IGNORE)) => None,
                (_, Some(json)) if !json.is_empty() => Some(json.to_string()),
                _ => Some(def.name.to_string()),
            };

            match &def.shape {
                Shape::Value { fill, .. } => {
                    if let Some(path) = def.path.as_deref().map(annotation::key_of) {
                        if !path.is_empty() && path != IGNORE {
                            descriptor.path_fields.push(PathField {
                                field: index,
                                source_key: path.to_string(),
                                dest_key: key.clone(),
                            });
                        }
                    }
                    if fill.is_some() {
                        if key == CLIENT_ID_KEY && credentials.client_id.is_none() {
                            credentials.client_id = Some(index);
                        }
                        if key == CLIENT_SECRET_KEY && credentials.client_secret.is_none() {
                            credentials.client_secret = Some(index);
                        }
                    }
                }
                Shape::File { multiplicity, .. } => {
                    descriptor.file_fields.push(FileField {
                        field: index,
                        form_key: key.clone(),
                        multiplicity: *multiplicity,
                    });
                }
            }

            descriptor.fields.push(ResolvedField {
                name: def.name,
                key,
                json_key,
                shape: def.shape,
            });
        }

        if credentials != CredentialFields::default() {
            descriptor.credential_fields = Some(credentials);
        }
        descriptor
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    pub fn path_fields(&self) -> &[PathField] {
        &self.path_fields
    }

    pub fn file_fields(&self) -> &[FileField] {
        &self.file_fields
    }

    pub fn credential_fields(&self) -> Option<&CredentialFields> {
        self.credential_fields.as_ref()
    }

    /// Every recognized source key, de-duplicated, in declaration order.
    pub fn all_keys(&self) -> &[String] {
        &self.all_keys
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Lazily populated map from record type to its descriptor.
///
/// Entries live for the whole process. Concurrent first uses of a type may
/// each build a descriptor; only the store is synchronized and the first
/// stored descriptor is the one every caller receives.
#[derive(Default)]
pub struct DescriptorCache {
    entries: DashMap<TypeId, Arc<TypeDescriptor>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by all binders in the process.
    pub fn global() -> &'static DescriptorCache {
        &GLOBAL
    }

    /// Load the descriptor of `T`, building and storing it on first use.
    pub fn get<T: Bindable>(&self) -> Arc<TypeDescriptor> {
        let id = TypeId::of::<T>();
        if let Some(found) = self.entries.get(&id) {
            return Arc::clone(found.value());
        }

        let built = Arc::new(TypeDescriptor::build::<T>());
        let stored = Arc::clone(self.entries.entry(id).or_insert(built).value());

        tracing::debug!(record = stored.type_name(), fields = stored.fields().len(), "Descriptor cached");
        metrics::record_descriptor_cache_size(self.entries.len());
        stored
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
