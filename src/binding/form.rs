//! URL-encoded and multipart form binder.
//!
//! # Responsibilities
//! - Decode ordinary form fields with the same key-based decoder as the query
//! - Receive uploaded files and assign them to file fields by form key
//!
//! # Design Decisions
//! - Uploads are held in memory up to a shared ceiling; beyond it they spill
//!   to temporary files instead of failing
//! - Fields are written only after the whole form has been read, so a body
//!   cut short by the size ceiling leaves the record untouched

use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Bytes;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::binding::decode::FormValues;
use crate::binding::error::{BindError, BindResult};
use crate::binding::request::BindRequest;
use crate::binding::target::Target;
use crate::binding::upload::UploadedFile;
use crate::binding::{Binder, BinderKind};

/// In-memory ceiling for multipart forms (8 MiB).
pub const DEFAULT_MULTIPART_MEMORY: usize = 8 << 20;

const URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Binds `application/x-www-form-urlencoded` and `multipart/form-data` bodies.
#[derive(Debug, Clone, Copy)]
pub struct FormBinder {
    max_memory: usize,
}

impl Default for FormBinder {
    fn default() -> Self {
        Self::new(DEFAULT_MULTIPART_MEMORY)
    }
}

impl FormBinder {
    /// A zero ceiling falls back to [`DEFAULT_MULTIPART_MEMORY`].
    pub fn new(max_memory: usize) -> Self {
        let max_memory = if max_memory == 0 { DEFAULT_MULTIPART_MEMORY } else { max_memory };
        Self { max_memory }
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    async fn bind_urlencoded(&self, request: &mut BindRequest, target: &mut Target<'_>) -> BindResult {
        let body = request.read_body().await?;
        let values = FormValues::parse(&body)?;
        target.decode_values(&values)
    }

    async fn bind_multipart(&self, request: &mut BindRequest, target: &mut Target<'_>) -> BindResult {
        let content_type = request.content_type().unwrap_or_default().to_string();
        let boundary = multer::parse_boundary(&content_type).map_err(form_error)?;
        let mut multipart = multer::Multipart::new(request.body_stream()?, boundary);

        let mut values = FormValues::new();
        let mut files: HashMap<String, Vec<UploadedFile>> = HashMap::new();
        let mut remaining = self.max_memory;

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(err) => return Err(request.payload_too_large().unwrap_or_else(|| form_error(err))),
            };
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                None => {
                    let text = match field.text().await {
                        Ok(text) => text,
                        Err(err) => return Err(request.payload_too_large().unwrap_or_else(|| form_error(err))),
                    };
                    remaining = remaining.saturating_sub(text.len());
                    values.append(name, text);
                }
                Some(file_name) => {
                    let upload = match receive_file(field, file_name, &mut remaining).await {
                        Ok(upload) => upload,
                        Err(err) => return Err(request.payload_too_large().unwrap_or(err)),
                    };
                    tracing::trace!(field = %name, size = upload.size(), in_memory = upload.is_in_memory(), "Received upload");
                    files.entry(name).or_default().push(upload);
                }
            }
        }

        target.decode_values(&values)?;
        target.assign_files(&files);
        Ok(())
    }
}

#[async_trait]
impl Binder for FormBinder {
    fn name(&self) -> &'static str {
        "form"
    }

    fn kind(&self) -> BinderKind {
        BinderKind::Body
    }

    fn matches(&self, request: &BindRequest) -> bool {
        matches!(request.media_type().as_deref(), Some(URLENCODED) | Some(MULTIPART))
    }

    async fn bind(&self, request: &mut BindRequest, target: &mut Target<'_>) -> BindResult {
        if request.media_type().as_deref() == Some(MULTIPART) {
            self.bind_multipart(request, target).await
        } else {
            self.bind_urlencoded(request, target).await
        }
    }
}

fn form_error(err: impl std::fmt::Display) -> BindError {
    BindError::decode(format!("parse form: {err}"))
}

/// Read one file part, spilling to a temporary file once `remaining` is spent.
async fn receive_file(
    mut field: multer::Field<'static>,
    file_name: String,
    remaining: &mut usize,
) -> BindResult<UploadedFile> {
    let content_type = field.content_type().map(|mime| mime.to_string());
    let mut buffer: Vec<u8> = Vec::new();
    let mut spilled: Option<(NamedTempFile, tokio::fs::File)> = None;
    let mut size = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(form_error)? {
        size += chunk.len() as u64;
        match spilled.as_mut() {
            Some((_, file)) => file.write_all(&chunk).await.map_err(spill_error)?,
            None if buffer.len() + chunk.len() <= *remaining => buffer.extend_from_slice(&chunk),
            None => {
                let temp = NamedTempFile::new().map_err(spill_error)?;
                let mut file = tokio::fs::File::from_std(temp.reopen().map_err(spill_error)?);
                file.write_all(&buffer).await.map_err(spill_error)?;
                file.write_all(&chunk).await.map_err(spill_error)?;
                buffer = Vec::new();
                spilled = Some((temp, file));
            }
        }
    }

    match spilled {
        Some((temp, mut file)) => {
            file.flush().await.map_err(spill_error)?;
            Ok(UploadedFile::on_disk(file_name, content_type, size, temp))
        }
        None => {
            *remaining -= buffer.len();
            Ok(UploadedFile::in_memory(file_name, content_type, Bytes::from(buffer)))
        }
    }
}

fn spill_error(err: std::io::Error) -> BindError {
    BindError::Body(format!("spill upload: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Bindable, FieldDef};
    use axum::body::Body;
    use axum::http::{header, Request};

    const BOUNDARY: &str = "X-BOUNDARY";

    #[derive(Debug, Default)]
    struct Upload {
        title: String,
        count: u32,
        file: Option<UploadedFile>,
        files: Vec<UploadedFile>,
    }

    impl Bindable for Upload {
        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::value("Title", |r: &mut Self| &mut r.title).form("title"),
                FieldDef::value("Count", |r: &mut Self| &mut r.count).form("count"),
                FieldDef::file("File", |r: &mut Self| &mut r.file).form("file"),
                FieldDef::files("Files", |r: &mut Self| &mut r.files).form("files"),
            ]
        }
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n"
                )),
                None => body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn request(content_type: &str, body: String) -> BindRequest {
        let request = Request::builder()
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        BindRequest::new(request)
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> BindRequest {
        request(&format!("multipart/form-data; boundary={BOUNDARY}"), multipart_body(parts))
    }

    #[tokio::test]
    async fn test_urlencoded() {
        let mut req = request(URLENCODED, "title=mug&count=2&other=x".into());
        assert!(FormBinder::default().matches(&req));

        let mut upload = Upload::default();
        FormBinder::default().bind(&mut req, &mut Target::new(&mut upload)).await.unwrap();
        assert_eq!(upload.title, "mug");
        assert_eq!(upload.count, 2);
    }

    #[tokio::test]
    async fn test_multipart_single_and_many_files() {
        let mut req = multipart_request(&[
            ("title", None, "photos"),
            ("file", Some("first.txt"), "one"),
            ("file", Some("second.txt"), "two"),
            ("files", Some("a.txt"), "a"),
            ("files", Some("b.txt"), "b"),
        ]);
        let mut upload = Upload::default();
        FormBinder::default().bind(&mut req, &mut Target::new(&mut upload)).await.unwrap();

        assert_eq!(upload.title, "photos");
        let file = upload.file.unwrap();
        assert_eq!(file.file_name(), "first.txt");
        assert_eq!(file.bytes().await.unwrap(), Bytes::from_static(b"one"));
        let names: Vec<&str> = upload.files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_upload_spills_past_memory_ceiling() {
        let mut req = multipart_request(&[("file", Some("big.bin"), "0123456789abcdef")]);
        let mut upload = Upload::default();
        FormBinder::new(4).bind(&mut req, &mut Target::new(&mut upload)).await.unwrap();

        let file = upload.file.unwrap();
        assert!(!file.is_in_memory());
        assert_eq!(file.size(), 16);
        assert_eq!(file.bytes().await.unwrap(), Bytes::from_static(b"0123456789abcdef"));
    }

    #[tokio::test]
    async fn test_truncated_multipart_leaves_record_untouched() {
        let body = multipart_body(&[("title", None, "photos"), ("file", Some("a.txt"), &"x".repeat(256))]);
        let raw = Request::builder()
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        let mut req = BindRequest::new(raw).with_body_limit(64);

        let mut upload = Upload::default();
        let err = FormBinder::default().bind(&mut req, &mut Target::new(&mut upload)).await.unwrap_err();
        assert!(err.is_payload_too_large());
        assert!(upload.title.is_empty());
    }

    #[tokio::test]
    async fn test_missing_boundary() {
        let mut req = request(MULTIPART, String::new());
        let mut upload = Upload::default();
        let err = FormBinder::default().bind(&mut req, &mut Target::new(&mut upload)).await.unwrap_err();
        assert!(matches!(err, BindError::Decode(_)));
    }
}
