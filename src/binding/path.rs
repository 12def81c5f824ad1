//! Path parameter binder.

use async_trait::async_trait;

use crate::binding::decode::FormValues;
use crate::binding::error::BindResult;
use crate::binding::request::BindRequest;
use crate::binding::target::Target;
use crate::binding::{Binder, BinderKind};

/// Binds route parameters into fields declared with a path annotation.
///
/// Always matches. Absent or empty parameters are skipped; if none produced
/// a value the binder is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathBinder;

#[async_trait]
impl Binder for PathBinder {
    fn name(&self) -> &'static str {
        "path"
    }

    fn kind(&self) -> BinderKind {
        BinderKind::Metadata
    }

    fn matches(&self, _request: &BindRequest) -> bool {
        true
    }

    async fn bind(&self, request: &mut BindRequest, target: &mut Target<'_>) -> BindResult {
        let mut staged = FormValues::new();
        for field in target.descriptor().path_fields() {
            let value = request.path_value(&field.source_key);
            if !value.is_empty() {
                staged.append(field.dest_key.as_str(), value);
            }
        }

        if staged.is_empty() {
            return Ok(());
        }
        target.decode_values(&staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindError, PathParams};
    use crate::descriptor::{Bindable, FieldDef};
    use axum::body::Body;
    use axum::http::Request;

    #[derive(Debug, Default)]
    struct GetItem {
        id: i64,
        slug: String,
    }

    impl Bindable for GetItem {
        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::value("ID", |r: &mut Self| &mut r.id).path("id").form("id"),
                FieldDef::value("Slug", |r: &mut Self| &mut r.slug).path("slug"),
            ]
        }
    }

    async fn bind_path(params: &[(&str, &str)]) -> (GetItem, BindResult) {
        let request = Request::builder().uri("/items").body(Body::empty()).unwrap();
        let mut request = BindRequest::new(request).with_path_params(params.iter().copied().collect::<PathParams>());
        let mut item = GetItem::default();
        let result = PathBinder.bind(&mut request, &mut Target::new(&mut item)).await;
        (item, result)
    }

    #[tokio::test]
    async fn test_numeric_path_value() {
        let (item, result) = bind_path(&[("id", "42"), ("slug", "blue-mug")]).await;
        result.unwrap();
        assert_eq!(item.id, 42);
        assert_eq!(item.slug, "blue-mug");
    }

    #[tokio::test]
    async fn test_non_numeric_path_value() {
        let (_, result) = bind_path(&[("id", "abc")]).await;
        assert!(matches!(result, Err(BindError::Decode(_))));
    }

    #[tokio::test]
    async fn test_absent_parameters_are_noop() {
        let (item, result) = bind_path(&[("other", "1")]).await;
        result.unwrap();
        assert_eq!(item.id, 0);
        assert!(item.slug.is_empty());
    }
}
