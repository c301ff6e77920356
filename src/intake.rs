// src/intake.rs

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// How the file reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeSource {
    Drop,
    Picker,
}

/// Preview strategy chosen for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Pdf,
    Other,
}

/// A file as offered by a drop or a picker, before classification.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    /// Read a file from disk, declaring its media type from the extension.
    pub async fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            media_type: declared_media_type(&name).map(str::to_string),
            name,
            bytes,
        })
    }
}

/// The currently active file. Cloning shares the bytes.
#[derive(Debug, Clone)]
pub struct FileHandle {
    name: String,
    media_type: Option<String>,
    kind: FileKind,
    bytes: Arc<[u8]>,
}

impl FileHandle {
    pub fn new(file: SelectedFile) -> Self {
        let kind = classify(file.media_type.as_deref(), &file.name);
        Self {
            name: file.name,
            media_type: file.media_type,
            kind,
            bytes: file.bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

/// Classify by declared media type first, then by the `.pdf` suffix.
pub fn classify(media_type: Option<&str>, name: &str) -> FileKind {
    let media_type = media_type.unwrap_or_default();
    if media_type.starts_with("image/") {
        FileKind::Image
    } else if media_type == "application/pdf" || name.to_ascii_lowercase().ends_with(".pdf") {
        FileKind::Pdf
    } else {
        FileKind::Other
    }
}

/// Take the first offered file; anything after it is dropped.
pub fn select(files: Vec<SelectedFile>, source: IntakeSource) -> Option<FileHandle> {
    let mut files = files.into_iter();
    let first = files.next()?;

    let discarded = files.count();
    if discarded > 0 {
        debug!(discarded, ?source, "Only the first file is used");
    }

    let handle = FileHandle::new(first);
    info!(
        file = %handle.name(),
        media_type = ?handle.media_type(),
        kind = ?handle.kind(),
        bytes = handle.bytes().len(),
        ?source,
        "File selected"
    );
    Some(handle)
}

/// Media type a file picker would declare for a local file.
fn declared_media_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "svg" => Some("image/svg+xml"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}
