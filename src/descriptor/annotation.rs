//! Declared-key annotations.
//!
//! An annotation is written as `key[,modifier...]`. The first segment before a
//! comma is the key; a bare `-` suppresses the field entirely.

/// Marker that excludes a field from every source.
pub const IGNORE: &str = "-";

/// Result of resolving a field's declared key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredKey {
    /// Field binds under this key.
    Key(String),
    /// Field carries the ignore marker.
    Ignored,
}

impl DeclaredKey {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            DeclaredKey::Key(key) => Some(key),
            DeclaredKey::Ignored => None,
        }
    }
}

/// Key segment of an annotation (everything before the first comma).
pub fn key_of(annotation: &str) -> &str {
    match annotation.find(',') {
        Some(idx) => &annotation[..idx],
        None => annotation,
    }
}

/// Modifiers following the key, empty segments dropped.
pub fn modifiers_of(annotation: &str) -> impl Iterator<Item = &str> {
    annotation
        .split(',')
        .skip(1)
        .filter(|segment| !segment.is_empty())
}

/// Resolve the key a field binds under.
///
/// Precedence: binding-specific annotation, then the generic payload
/// annotation, then the field's declared name. An empty key segment falls
/// through to the next source.
pub fn resolve(name: &str, binding: Option<&str>, payload: Option<&str>) -> DeclaredKey {
    let key = [binding, payload]
        .into_iter()
        .flatten()
        .map(key_of)
        .find(|key| !key.is_empty())
        .unwrap_or(name);

    if key == IGNORE {
        DeclaredKey::Ignored
    } else {
        DeclaredKey::Key(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_strips_modifiers() {
        assert_eq!(key_of("name,omitempty"), "name");
        assert_eq!(key_of("name"), "name");
        assert_eq!(key_of(",omitempty"), "");
        assert_eq!(modifiers_of("name,omitempty,,string").collect::<Vec<_>>(), vec!["omitempty", "string"]);
    }

    #[test]
    fn test_resolution_precedence() {
        assert_eq!(resolve("Name", Some("n"), Some("name")), DeclaredKey::Key("n".into()));
        assert_eq!(resolve("Name", None, Some("name,omitempty")), DeclaredKey::Key("name".into()));
        assert_eq!(resolve("Name", Some(",omitempty"), Some("name")), DeclaredKey::Key("name".into()));
        assert_eq!(resolve("Name", None, None), DeclaredKey::Key("Name".into()));
    }

    #[test]
    fn test_ignore_marker() {
        assert_eq!(resolve("Secret", Some("-"), Some("secret")), DeclaredKey::Ignored);
        assert_eq!(resolve("Secret", None, Some("-")), DeclaredKey::Ignored);
        // "-," is the key "-" with an empty modifier list
        assert_eq!(resolve("Secret", Some("-,"), None), DeclaredKey::Ignored);
    }

    proptest! {
        #[test]
        fn prop_key_never_contains_comma(annotation in ".*") {
            prop_assert!(!key_of(&annotation).contains(','));
        }

        #[test]
        fn prop_modifiers_do_not_change_key(key in "[a-z_]{1,12}", modifier in "[a-z]{0,8}") {
            let annotated = format!("{key},{modifier}");
            prop_assert_eq!(resolve("Field", Some(&annotated), None), DeclaredKey::Key(key));
        }
    }
}
