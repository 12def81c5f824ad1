//! Sample records and business functions served by the binary.

use axum::http::StatusCode;
use serde::Serialize;
use validator::Validate;

use crate::binding::UploadedFile;
use crate::descriptor::{Bindable, FieldDef};
use crate::http::error::HttpError;
use crate::http::validate::{self, ValidationError};

/// `GET /items/{id}?verbose=true`
#[derive(Debug, Default)]
pub struct GetItem {
    pub id: u64,
    pub verbose: bool,
}

impl Bindable for GetItem {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::value("ID", |r: &mut Self| &mut r.id).path("id").json("id"),
            FieldDef::value("Verbose", |r: &mut Self| &mut r.verbose).form("verbose"),
        ]
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Item {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub async fn get_item(req: GetItem) -> Result<Item, HttpError> {
    if req.id == 0 {
        return Err(HttpError::not_found("item 0 does not exist"));
    }
    Ok(Item {
        id: req.id,
        name: format!("item-{}", req.id),
        description: req.verbose.then(|| format!("Item number {}", req.id)),
    })
}

/// `DELETE /items/{id}`, answered with a bare status.
pub async fn delete_item(req: GetItem) -> Result<StatusCode, HttpError> {
    if req.id == 0 {
        return Err(HttpError::not_found("item 0 does not exist"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /items` with a JSON or form body.
#[derive(Debug, Default, Validate)]
pub struct CreateItem {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,
    pub tags: Vec<String>,
    pub draft: Option<bool>,
}

impl Bindable for CreateItem {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::value("Name", |r: &mut Self| &mut r.name).json("name"),
            FieldDef::value("Price", |r: &mut Self| &mut r.price).json("price"),
            FieldDef::list("Tags", |r: &mut Self| &mut r.tags).json("tags,omitempty").form("tag"),
            FieldDef::optional("Draft", |r: &mut Self| &mut r.draft).json("draft,omitempty"),
        ]
    }

    fn self_validate(&self) -> Option<Result<(), ValidationError>> {
        Some(validate::derived(self))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreatedItem {
    pub name: String,
    pub price: f64,
    pub tags: Vec<String>,
    pub draft: bool,
}

pub async fn create_item(req: CreateItem) -> Result<CreatedItem, HttpError> {
    Ok(CreatedItem {
        name: req.name,
        price: req.price,
        tags: req.tags,
        draft: req.draft.unwrap_or(false),
    })
}

/// `POST /upload` as `multipart/form-data`.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub title: String,
    pub file: Option<UploadedFile>,
    pub attachments: Vec<UploadedFile>,
}

impl Bindable for UploadForm {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::value("Title", |r: &mut Self| &mut r.title).form("title"),
            FieldDef::file("File", |r: &mut Self| &mut r.file).form("file"),
            FieldDef::files("Attachments", |r: &mut Self| &mut r.attachments).form("attachments"),
        ]
    }

    fn self_validate(&self) -> Option<Result<(), ValidationError>> {
        Some(match self.file {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("file is required")),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileSummary {
    pub file_name: String,
    pub size: u64,
    pub in_memory: bool,
}

impl From<&UploadedFile> for FileSummary {
    fn from(file: &UploadedFile) -> Self {
        Self {
            file_name: file.file_name().to_string(),
            size: file.size(),
            in_memory: file.is_in_memory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadReceipt {
    pub title: String,
    pub file: Option<FileSummary>,
    pub attachments: Vec<FileSummary>,
}

pub async fn upload(req: UploadForm) -> Result<UploadReceipt, HttpError> {
    Ok(UploadReceipt {
        title: req.title,
        file: req.file.as_ref().map(FileSummary::from),
        attachments: req.attachments.iter().map(FileSummary::from).collect(),
    })
}

/// `POST /token`, OAuth2-style client credentials from the body or Basic auth.
#[derive(Debug, Default)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

impl Bindable for TokenRequest {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::value("GrantType", |r: &mut Self| &mut r.grant_type).form("grant_type"),
            FieldDef::value("ClientID", |r: &mut Self| &mut r.client_id).form("client_id"),
            FieldDef::value("ClientSecret", |r: &mut Self| &mut r.client_secret).form("client_secret"),
            FieldDef::optional("Scope", |r: &mut Self| &mut r.scope).form("scope"),
        ]
    }

    fn self_validate(&self) -> Option<Result<(), ValidationError>> {
        Some(if self.grant_type == "client_credentials" {
            Ok(())
        } else {
            Err(ValidationError::new("unsupported grant_type"))
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

pub async fn issue_token(req: TokenRequest) -> Result<TokenResponse, HttpError> {
    if req.client_id.is_empty() || req.client_secret.is_empty() {
        return Err(HttpError::unauthorized("client credentials required"));
    }
    Ok(TokenResponse {
        access_token: uuid::Uuid::new_v4().simple().to_string(),
        token_type: "Bearer",
        client_id: req.client_id,
        scope: req.scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_item() {
        let item = get_item(GetItem { id: 7, verbose: true }).await.unwrap();
        assert_eq!(item.name, "item-7");
        assert!(item.description.is_some());
        assert_eq!(get_item(GetItem::default()).await.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_item() {
        assert_eq!(delete_item(GetItem { id: 3, verbose: false }).await.unwrap(), StatusCode::NO_CONTENT);
        assert!(delete_item(GetItem::default()).await.is_err());
    }

    #[test]
    fn test_create_item_validation() {
        let invalid = CreateItem {
            price: -1.0,
            ..Default::default()
        };
        let err = invalid.self_validate().unwrap().unwrap_err();
        assert_eq!(err.message(), "name: name is required; price: price must not be negative");

        let valid = CreateItem {
            name: "mug".into(),
            price: 4.5,
            ..Default::default()
        };
        assert!(matches!(valid.self_validate(), Some(Ok(()))));
    }

    #[tokio::test]
    async fn test_token_requires_credentials() {
        let req = TokenRequest {
            grant_type: "client_credentials".into(),
            client_id: "app".into(),
            ..Default::default()
        };
        let err = issue_token(req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
