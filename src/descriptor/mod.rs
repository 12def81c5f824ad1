//! Record descriptors.
//!
//! # Responsibilities
//! - Declare record fields and their annotations ([`Bindable`], [`FieldDef`])
//! - Resolve source keys, path parameters, file fields and credential fields
//! - Cache one descriptor per record type for the life of the process
//!
//! # Data Flow
//! ```text
//! Bindable::fields() ──▶ TypeDescriptor::build ──▶ DescriptorCache ──▶ binders
//! ```

pub mod annotation;
pub mod cache;
pub mod field;

pub use cache::{
    describe, CredentialFields, DescriptorCache, FileField, PathField, ResolvedField, TypeDescriptor,
    CLIENT_ID_KEY, CLIENT_SECRET_KEY,
};
pub use field::{Bindable, FieldDef, FormValue, Multiplicity};
pub(crate) use field::Shape;
