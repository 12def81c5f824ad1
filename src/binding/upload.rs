//! Uploaded multipart files.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use tempfile::NamedTempFile;

#[derive(Clone)]
enum Storage {
    Memory(Bytes),
    /// Spilled past the in-memory ceiling; removed when the last handle drops.
    Disk(Arc<NamedTempFile>),
}

/// Handle to one uploaded file part.
///
/// Cheap to clone; clones share the same content.
#[derive(Clone)]
pub struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    size: u64,
    storage: Storage,
}

impl UploadedFile {
    pub fn in_memory(file_name: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            size: data.len() as u64,
            storage: Storage::Memory(data),
        }
    }

    pub(crate) fn on_disk(file_name: String, content_type: Option<String>, size: u64, file: NamedTempFile) -> Self {
        Self {
            file_name,
            content_type,
            size,
            storage: Storage::Disk(Arc::new(file)),
        }
    }

    /// File name announced by the client.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.storage, Storage::Memory(_))
    }

    /// Temporary file backing a spilled upload.
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Memory(_) => None,
            Storage::Disk(file) => Some(file.path()),
        }
    }

    /// Read the whole content.
    pub async fn bytes(&self) -> io::Result<Bytes> {
        match &self.storage {
            Storage::Memory(data) => Ok(data.clone()),
            Storage::Disk(file) => tokio::fs::read(file.path()).await.map(Bytes::from),
        }
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("in_memory", &self.is_in_memory())
            .finish()
    }
}
