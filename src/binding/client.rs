//! HTTP Basic client-credential binder.

use async_trait::async_trait;
use axum::http::header;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::binding::error::BindResult;
use crate::binding::request::BindRequest;
use crate::binding::target::Target;
use crate::binding::{Binder, BinderKind};

const BASIC_PREFIX: &str = "basic ";

/// Copies Basic-Auth credentials into `client_id` / `client_secret` fields.
///
/// Only empty fields are filled, so credentials sent in the query or body
/// win. Malformed headers bind nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientAuthBinder;

impl ClientAuthBinder {
    /// Decode `Basic base64(user:password)`.
    pub fn credentials(request: &BindRequest) -> Option<(String, String)> {
        let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
        let encoded = value.get(..BASIC_PREFIX.len()).filter(|prefix| prefix.eq_ignore_ascii_case(BASIC_PREFIX))?;
        let decoded = STANDARD.decode(value[encoded.len()..].trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }
}

#[async_trait]
impl Binder for ClientAuthBinder {
    fn name(&self) -> &'static str {
        "client_auth"
    }

    fn kind(&self) -> BinderKind {
        BinderKind::Metadata
    }

    fn matches(&self, request: &BindRequest) -> bool {
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.get(..BASIC_PREFIX.len()))
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BASIC_PREFIX))
    }

    async fn bind(&self, request: &mut BindRequest, target: &mut Target<'_>) -> BindResult {
        if let Some((client_id, client_secret)) = Self::credentials(request) {
            target.fill_credentials(&client_id, &client_secret);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Bindable, FieldDef};
    use axum::body::Body;
    use axum::http::Request;

    #[derive(Debug, Default)]
    struct TokenRequest {
        client_id: String,
        client_secret: String,
    }

    impl Bindable for TokenRequest {
        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::value("ClientID", |r: &mut Self| &mut r.client_id).form("client_id"),
                FieldDef::value("ClientSecret", |r: &mut Self| &mut r.client_secret).json("client_secret,omitempty"),
            ]
        }
    }

    fn request(authorization: &str) -> BindRequest {
        let request = Request::builder()
            .header(header::AUTHORIZATION, authorization)
            .body(Body::empty())
            .unwrap();
        BindRequest::new(request)
    }

    fn basic(user_pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(user_pass))
    }

    #[tokio::test]
    async fn test_fills_empty_credentials() {
        let mut req = request(&basic("app:s3cret"));
        assert!(ClientAuthBinder.matches(&req));

        let mut token = TokenRequest::default();
        ClientAuthBinder.bind(&mut req, &mut Target::new(&mut token)).await.unwrap();
        assert_eq!(token.client_id, "app");
        assert_eq!(token.client_secret, "s3cret");
    }

    #[tokio::test]
    async fn test_never_overwrites() {
        let mut req = request(&basic("header-app:header-secret"));
        let mut token = TokenRequest {
            client_id: "body-app".into(),
            ..Default::default()
        };
        ClientAuthBinder.bind(&mut req, &mut Target::new(&mut token)).await.unwrap();
        assert_eq!(token.client_id, "body-app");
        assert_eq!(token.client_secret, "header-secret");
    }

    #[test]
    fn test_matching_and_decoding() {
        assert!(ClientAuthBinder.matches(&request("bAsIc abc")));
        assert!(!ClientAuthBinder.matches(&request("Bearer token")));
        assert!(ClientAuthBinder::credentials(&request("Basic !!!")).is_none());
        assert!(ClientAuthBinder::credentials(&request(&basic("no-colon"))).is_none());
        assert_eq!(
            ClientAuthBinder::credentials(&request(&basic("id:pa:ss"))),
            Some(("id".to_string(), "pa:ss".to_string()))
        );
    }

    #[tokio::test]
    async fn test_malformed_header_binds_nothing() {
        let mut req = request("Basic %%%");
        let mut token = TokenRequest::default();
        ClientAuthBinder.bind(&mut req, &mut Target::new(&mut token)).await.unwrap();
        assert!(token.client_id.is_empty());
    }
}
