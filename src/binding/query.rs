//! Query string binder.

use async_trait::async_trait;

use crate::binding::decode::FormValues;
use crate::binding::error::BindResult;
use crate::binding::request::BindRequest;
use crate::binding::target::Target;
use crate::binding::{Binder, BinderKind};

/// Binds the URL query parameters by declared key. Unknown keys are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBinder;

#[async_trait]
impl Binder for QueryBinder {
    fn name(&self) -> &'static str {
        "query"
    }

    fn kind(&self) -> BinderKind {
        BinderKind::Metadata
    }

    fn matches(&self, request: &BindRequest) -> bool {
        request.query().is_some()
    }

    async fn bind(&self, request: &mut BindRequest, target: &mut Target<'_>) -> BindResult {
        let values = FormValues::parse(request.query().unwrap_or_default().as_bytes())?;
        target.decode_values(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Bindable, FieldDef};
    use axum::body::Body;
    use axum::http::Request;

    #[derive(Debug, Default)]
    struct Search {
        term: String,
        page: u32,
        tags: Vec<String>,
        active: Option<bool>,
    }

    impl Bindable for Search {
        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::value("Term", |r: &mut Self| &mut r.term).form("q"),
                FieldDef::value("Page", |r: &mut Self| &mut r.page).json("page,omitempty"),
                FieldDef::list("Tags", |r: &mut Self| &mut r.tags).form("tag"),
                FieldDef::optional("Active", |r: &mut Self| &mut r.active).form("active"),
            ]
        }
    }

    fn request(uri: &str) -> BindRequest {
        BindRequest::new(Request::builder().uri(uri).body(Body::empty()).unwrap())
    }

    #[tokio::test]
    async fn test_query_by_declared_key() {
        let mut req = request("/search?q=mug&page=3&tag=a&tag=b&active=on&junk=1");
        assert!(QueryBinder.matches(&req));

        let mut search = Search::default();
        QueryBinder.bind(&mut req, &mut Target::new(&mut search)).await.unwrap();
        assert_eq!(search.term, "mug");
        assert_eq!(search.page, 3);
        assert_eq!(search.tags, vec!["a", "b"]);
        assert_eq!(search.active, Some(true));
    }

    #[tokio::test]
    async fn test_bad_number_is_decode_failure() {
        let mut req = request("/search?page=two");
        let mut search = Search::default();
        assert!(QueryBinder.bind(&mut req, &mut Target::new(&mut search)).await.is_err());
    }

    #[test]
    fn test_matches_only_with_query() {
        assert!(!QueryBinder.matches(&request("/search")));
        assert!(!QueryBinder.matches(&request("/search?")));
    }
}
