//! Validation collaborator.
//!
//! Records may validate themselves through [`Bindable::self_validate`]; when
//! they do not, the pipeline's [`Validator`] is consulted.
//!
//! Declarative rules come from `#[derive(validator::Validate)]`: forward to
//! them from `self_validate` with [`derived`], or install a
//! [`DerivedValidator`] on the pipeline.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::descriptor::Bindable;

/// A well-formed record that is semantically invalid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Record-agnostic validator used when a record does not validate itself.
pub trait Validator: Send + Sync {
    fn validate(&self, record: &dyn Any) -> Result<(), ValidationError>;
}

/// Accepts every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveValidator;

impl Validator for PermissiveValidator {
    fn validate(&self, _record: &dyn Any) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl<F> Validator for F
where
    F: Fn(&dyn Any) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, record: &dyn Any) -> Result<(), ValidationError> {
        self(record)
    }
}

impl From<ValidationErrors> for ValidationError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| match &error.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: {}", error.code),
                })
            })
            .collect();
        if messages.is_empty() {
            return Self::new(errors.to_string());
        }
        messages.sort();
        Self::new(messages.join("; "))
    }
}

/// Run a record's derived `validator` rules.
pub fn derived<T: Validate>(record: &T) -> Result<(), ValidationError> {
    Validate::validate(record).map_err(ValidationError::from)
}

/// Validator applying the derived rules of `T`; other records pass.
pub struct DerivedValidator<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T> DerivedValidator<T> {
    pub fn new() -> Self {
        Self { _record: PhantomData }
    }
}

impl<T> Default for DerivedValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DerivedValidator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedValidator")
            .field("record", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Validate + 'static> Validator for DerivedValidator<T> {
    fn validate(&self, record: &dyn Any) -> Result<(), ValidationError> {
        match record.downcast_ref::<T>() {
            Some(record) => derived(record),
            None => Ok(()),
        }
    }
}

/// Self-validation first, then `fallback`.
pub fn validate<T: Bindable>(record: &T, fallback: &Arc<dyn Validator>) -> Result<(), ValidationError> {
    match record.self_validate() {
        Some(result) => result,
        None => fallback.validate(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldDef;

    #[derive(Default)]
    struct Named {
        name: String,
    }

    impl Bindable for Named {
        fn fields() -> Vec<FieldDef> {
            vec![FieldDef::value("name", |r: &mut Self| &mut r.name)]
        }

        fn self_validate(&self) -> Option<Result<(), ValidationError>> {
            Some(if self.name.is_empty() {
                Err(ValidationError::new("name is required"))
            } else {
                Ok(())
            })
        }
    }

    #[derive(Default)]
    struct Plain;

    impl Bindable for Plain {
        fn fields() -> Vec<FieldDef> {
            Vec::new()
        }
    }

    fn rejecting() -> Arc<dyn Validator> {
        Arc::new(|_: &dyn std::any::Any| Err(ValidationError::new("rejected")))
    }

    #[test]
    fn test_self_validation_takes_precedence() {
        assert!(validate(&Named { name: "a".into() }, &rejecting()).is_ok());
        assert_eq!(
            validate(&Named::default(), &rejecting()).unwrap_err().message(),
            "name is required"
        );
    }

    #[derive(Default, Validate)]
    struct Signup {
        #[validate(length(min = 3, message = "too short"))]
        username: String,
        #[validate(email)]
        email: String,
    }

    impl Bindable for Signup {
        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::value("username", |r: &mut Self| &mut r.username),
                FieldDef::value("email", |r: &mut Self| &mut r.email),
            ]
        }
    }

    #[test]
    fn test_derived_rules_messages() {
        let err = derived(&Signup {
            username: "al".into(),
            email: "nope".into(),
        })
        .unwrap_err();
        assert_eq!(err.message(), "email: email; username: too short");

        assert!(derived(&Signup {
            username: "alice".into(),
            email: "alice@example.com".into(),
        })
        .is_ok());
    }

    #[test]
    fn test_derived_validator_checks_only_its_record() {
        let fallback: Arc<dyn Validator> = Arc::new(DerivedValidator::<Signup>::new());
        assert!(validate(&Signup::default(), &fallback).is_err());
        assert!(validate(&Plain, &fallback).is_ok());
    }

    #[test]
    fn test_fallback_validator() {
        assert_eq!(validate(&Plain, &rejecting()).unwrap_err().message(), "rejected");
        let permissive: Arc<dyn Validator> = Arc::new(PermissiveValidator);
        assert!(validate(&Plain, &permissive).is_ok());
    }
}
