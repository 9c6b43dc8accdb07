//! Contract between the session and the PDF engine.
//!
//! The session never talks to a PDF library directly. A [`DocumentProvider`]
//! opens files and hands out an exclusively owned [`DocumentBackend`]; every
//! page-level operation goes through a [`PageHandle`] obtained from
//! [`DocumentBackend::load_page`].
//!
//! Saving invalidates page handles: backends bump their generation on every
//! [`DocumentBackend::save_incremental`] and reject older handles with
//! [`Error::StalePage`](crate::Error::StalePage). Callers reload instead of
//! patching state in memory.

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::geometry::Rect;

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0d9a4c-52b7-5e21-8c6a-0b1f4d7e2a90").expect("valid namespace UUID")
});

/// Stable identifier for a document path, used to correlate log lines across
/// reloads of the same file.
pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Vec<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: usize,
    pub metadata: DocumentMetadata,
}

/// Reference to a loaded page, valid until the next save of its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    index: usize,
    generation: u64,
}

impl PageHandle {
    pub fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }

    /// Zero-based page index.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page: PageHandle,
    pub zoom: f32,
    /// Clockwise degrees, already reduced to `0..360`.
    pub rotation: i32,
}

/// RGBA8 bitmap of a rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub rect: Rect,
    pub baseline_y: f32,
    pub text: String,
}

impl Word {
    pub fn new(rect: Rect, text: impl Into<String>) -> Self {
        Self {
            rect,
            baseline_y: rect.y1,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkTarget {
    /// One-based page number.
    GoToPage(usize),
    ExternalUri(String),
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkTarget::GoToPage(page) => write!(f, "Go to page {page}"),
            LinkTarget::ExternalUri(uri) => f.write_str(uri),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub source_rect: Rect,
    pub target: LinkTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Text,
    Highlight,
    Rectangle,
    FreeText,
    /// Engine-reported kind this viewer cannot create, kept as its name.
    Other(String),
}

impl AnnotationKind {
    pub const CREATABLE: [AnnotationKind; 4] = [
        AnnotationKind::Text,
        AnnotationKind::Highlight,
        AnnotationKind::Rectangle,
        AnnotationKind::FreeText,
    ];

    pub fn is_creatable(&self) -> bool {
        !matches!(self, AnnotationKind::Other(_))
    }

    /// Kinds placed with a single click.
    pub fn is_point(&self) -> bool {
        matches!(self, AnnotationKind::Text)
    }

    pub fn label(&self) -> &str {
        match self {
            AnnotationKind::Text => "Text",
            AnnotationKind::Highlight => "Highlight",
            AnnotationKind::Rectangle => "Rectangle",
            AnnotationKind::FreeText => "FreeText",
            AnnotationKind::Other(name) => name,
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationInfo {
    pub content: String,
    pub name: String,
    pub title: String,
    pub creation_date: String,
    pub mod_date: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub kind: AnnotationKind,
    pub info: AnnotationInfo,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedFile {
    pub name: String,
    pub filename: String,
    pub length: usize,
}

/// One outline entry; `depth` starts at 1 and is a nesting level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub depth: usize,
    pub title: String,
    /// One-based page number.
    pub target_page: usize,
}

pub trait DocumentProvider {
    /// Opens `path`. Encrypted documents open successfully but stay locked
    /// until [`DocumentBackend::authenticate`] succeeds.
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>>;
}

pub trait DocumentBackend {
    fn info(&self) -> &DocumentInfo;

    fn is_encrypted(&self) -> bool;

    fn authenticate(&mut self, password: &str) -> Result<()>;

    fn page_count(&self) -> usize;

    fn outline(&self) -> Result<Vec<OutlineEntry>>;

    /// `index` is zero-based.
    fn load_page(&self, index: usize) -> Result<PageHandle>;

    fn render(&self, request: RenderRequest) -> Result<Raster>;

    /// Words in engine order; callers sort.
    fn extract_words(&self, page: PageHandle) -> Result<Vec<Word>>;

    fn extract_links(&self, page: PageHandle) -> Result<Vec<LinkRecord>>;

    fn search(&self, page: PageHandle, query: &str) -> Result<Vec<Rect>>;

    fn annotations(&self, page: PageHandle) -> Result<Vec<AnnotationRecord>>;

    fn add_annotation(
        &mut self,
        page: PageHandle,
        kind: &AnnotationKind,
        rect: Rect,
        info: &AnnotationInfo,
    ) -> Result<()>;

    fn delete_annotation(&mut self, page: PageHandle, index: usize) -> Result<()>;

    /// Persists pending changes to `path` and invalidates every page handle.
    fn save_incremental(&mut self, path: &Path) -> Result<()>;

    fn embedded_files(&self) -> Result<Vec<EmbeddedFile>>;

    fn embedded_file(&self, name: &str) -> Result<Vec<u8>>;
}
