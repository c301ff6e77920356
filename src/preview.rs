// src/preview.rs

use crate::intake::{FileHandle, FileKind};
use lopdf::Document;
use std::fmt;
use tracing::{info, warn};

/// Shown in place of a preview the viewer cannot produce.
pub const FALLBACK_GLYPH: &str = "📄";

/// What the preview area currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Preview {
    /// Placeholder before a file is chosen and after a reset.
    #[default]
    Empty,
    /// A decoded image.
    Image {
        file_name: String,
        width: u32,
        height: u32,
    },
    /// A document the embedded viewer could open.
    Document { file_name: String, pages: usize },
    /// Glyph plus file name.
    Fallback { file_name: String },
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preview::Empty => write!(f, "Drop an invoice here or open one (image or PDF)."),
            Preview::Image {
                file_name,
                width,
                height,
            } => write!(f, "[image] {file_name} ({width}x{height})"),
            Preview::Document { file_name, pages } => {
                let unit = if *pages == 1 { "page" } else { "pages" };
                write!(f, "[pdf] {file_name} ({pages} {unit})")
            }
            Preview::Fallback { file_name } => write!(f, "{FALLBACK_GLYPH} {file_name}"),
        }
    }
}

/// Holds the visible preview.
#[derive(Debug, Default)]
pub struct PreviewRenderer {
    current: Preview,
}

impl PreviewRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Preview {
        &self.current
    }

    /// Decode a file into a preview. Runs on the blocking pool; the caller
    /// awaits it and then calls [`PreviewRenderer::present`].
    pub async fn decode(handle: &FileHandle) -> Preview {
        let file_name = handle.name().to_string();
        let kind = handle.kind();
        if kind == FileKind::Other {
            return Preview::Fallback { file_name };
        }

        let bytes = handle.shared_bytes();
        let name = file_name.clone();
        let decoded = tokio::task::spawn_blocking(move || match kind {
            FileKind::Image => decode_image(&name, &bytes),
            FileKind::Pdf => open_document(&name, &bytes),
            FileKind::Other => Preview::Fallback { file_name: name },
        })
        .await;

        match decoded {
            Ok(preview) => preview,
            Err(e) => {
                warn!(error = %e, file = %file_name, "Preview task failed");
                Preview::Fallback { file_name }
            }
        }
    }

    /// Render an already decoded file.
    pub fn present(&mut self, preview: Preview) {
        info!(preview = %preview, "Preview rendered");
        self.current = preview;
    }

    /// Back to the placeholder. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.current = Preview::Empty;
    }
}

fn decode_image(file_name: &str, bytes: &[u8]) -> Preview {
    match image::load_from_memory(bytes) {
        Ok(img) => Preview::Image {
            file_name: file_name.to_string(),
            width: img.width(),
            height: img.height(),
        },
        Err(e) => {
            warn!(error = %e, file = %file_name, "Image decode failed, showing fallback");
            Preview::Fallback {
                file_name: file_name.to_string(),
            }
        }
    }
}

fn open_document(file_name: &str, bytes: &[u8]) -> Preview {
    match Document::load_mem(bytes) {
        Ok(doc) => {
            let pages = doc.get_pages().len();
            // A PDF with no pages parses fine but has nothing to show
            if pages == 0 {
                Preview::Fallback {
                    file_name: file_name.to_string(),
                }
            } else {
                Preview::Document {
                    file_name: file_name.to_string(),
                    pages,
                }
            }
        }
        Err(e) => {
            warn!(error = %e, file = %file_name, "PDF viewer could not open file, showing fallback");
            Preview::Fallback {
                file_name: file_name.to_string(),
            }
        }
    }
}
