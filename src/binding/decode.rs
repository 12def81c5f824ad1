//! Multi-valued key/value maps decoded from query strings and form bodies.

use std::collections::HashMap;

use crate::binding::error::{BindError, BindResult};

/// Ordered multimap of source key to values.
///
/// Keys keep their first-seen order and values keep submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    order: Vec<String>,
    values: HashMap<String, Vec<String>>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `application/x-www-form-urlencoded` data.
    pub fn parse(input: &[u8]) -> BindResult<Self> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_bytes(input).map_err(|e| BindError::decode(format!("parse form: {e}")))?;
        Ok(pairs.into_iter().collect())
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.values.get_mut(&key) {
            Some(existing) => existing.push(value.into()),
            None => {
                self.order.push(key.clone());
                self.values.insert(key, vec![value.into()]);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = FormValues::new();
        for (key, value) in iter {
            values.append(key, value);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_keys() {
        let values = FormValues::parse(b"tag=a&name=bob%20smith&tag=b+c").unwrap();
        assert_eq!(values.get("tag").unwrap(), ["a", "b c"]);
        assert_eq!(values.get("name").unwrap(), ["bob smith"]);
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["tag", "name"]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(FormValues::parse(b"").unwrap().is_empty());
    }

    #[test]
    fn test_key_without_value() {
        let values = FormValues::parse(b"flag&x=").unwrap();
        assert_eq!(values.get("flag").unwrap(), [""]);
        assert_eq!(values.get("x").unwrap(), [""]);
    }
}
