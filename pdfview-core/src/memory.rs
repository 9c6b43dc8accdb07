//! In-memory document engine.
//!
//! Documents live on a shared in-memory "disk" keyed by path. Opening copies
//! the stored document into a working copy; mutations only reach the disk
//! through [`DocumentBackend::save_incremental`], so a reload observes exactly
//! what was persisted, like a real file-backed engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{
    document_id_for_path, AnnotationInfo, AnnotationKind, AnnotationRecord, DocumentBackend,
    DocumentInfo, DocumentMetadata, DocumentProvider, EmbeddedFile, LinkRecord, OutlineEntry,
    PageHandle, Raster, RenderRequest, Word,
};
use crate::error::{Error, Result};
use crate::geometry::Rect;

#[derive(Debug, Clone)]
pub struct MemoryPage {
    pub width: f32,
    pub height: f32,
    pub words: Vec<Word>,
    pub links: Vec<LinkRecord>,
    pub annotations: Vec<AnnotationRecord>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            words: Vec::new(),
            links: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPdf {
    pub pages: Vec<MemoryPage>,
    pub outline: Vec<OutlineEntry>,
    pub metadata: DocumentMetadata,
    pub password: Option<String>,
    pub attachments: Vec<(String, Vec<u8>)>,
}

impl MemoryPdf {
    pub fn with_pages(count: usize) -> Self {
        Self {
            pages: vec![MemoryPage::default(); count],
            ..Self::default()
        }
    }

    pub fn encrypted(mut self, password: &str) -> Self {
        self.password = Some(password.to_owned());
        self
    }

    pub fn page_mut(&mut self, page: usize) -> &mut MemoryPage {
        &mut self.pages[page - 1]
    }
}

#[derive(Debug, Default)]
struct Disk {
    files: HashMap<PathBuf, MemoryPdf>,
    live_handles: HashMap<PathBuf, usize>,
    failing_saves: usize,
    failing_opens: usize,
    opens: usize,
}

/// Cloning shares the same disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    disk: Arc<Mutex<Disk>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, pdf: MemoryPdf) {
        self.disk.lock().files.insert(path.into(), pdf);
    }

    /// Persisted state of `path`.
    pub fn stored(&self, path: &Path) -> Option<MemoryPdf> {
        self.disk.lock().files.get(path).cloned()
    }

    /// Makes the next `count` saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.disk.lock().failing_saves = count;
    }

    /// Makes the next `count` opens fail, whatever the path.
    pub fn fail_next_opens(&self, count: usize) {
        self.disk.lock().failing_opens = count;
    }

    pub fn live_handles(&self, path: &Path) -> usize {
        self.disk
            .lock()
            .live_handles
            .get(path)
            .copied()
            .unwrap_or_default()
    }

    pub fn open_count(&self) -> usize {
        self.disk.lock().opens
    }
}

impl DocumentProvider for MemoryProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>> {
        let mut disk = self.disk.lock();
        if disk.failing_opens > 0 {
            disk.failing_opens -= 1;
            return Err(Error::Open {
                path: path.to_path_buf(),
                reason: "simulated read failure".into(),
            });
        }
        let pdf = disk.files.get(path).cloned().ok_or_else(|| Error::Open {
            path: path.to_path_buf(),
            reason: "no such file".into(),
        })?;
        disk.opens += 1;
        *disk.live_handles.entry(path.to_path_buf()).or_default() += 1;

        let info = DocumentInfo {
            id: document_id_for_path(path),
            path: path.to_path_buf(),
            page_count: pdf.pages.len(),
            metadata: pdf.metadata.clone(),
        };
        Ok(Box::new(MemoryDocument {
            disk: Arc::clone(&self.disk),
            info,
            locked: pdf.password.is_some(),
            pdf,
            generation: 0,
        }))
    }
}

struct MemoryDocument {
    disk: Arc<Mutex<Disk>>,
    info: DocumentInfo,
    pdf: MemoryPdf,
    locked: bool,
    generation: u64,
}

impl MemoryDocument {
    fn unlocked(&self) -> Result<()> {
        if self.locked {
            return Err(Error::Auth {
                path: self.info.path.clone(),
            });
        }
        Ok(())
    }

    fn page(&self, handle: PageHandle) -> Result<&MemoryPage> {
        self.check(handle)?;
        Ok(&self.pdf.pages[handle.index()])
    }

    fn page_mut(&mut self, handle: PageHandle) -> Result<&mut MemoryPage> {
        self.check(handle)?;
        Ok(&mut self.pdf.pages[handle.index()])
    }

    fn check(&self, handle: PageHandle) -> Result<()> {
        self.unlocked()?;
        if handle.generation() != self.generation {
            return Err(Error::StalePage {
                index: handle.index(),
            });
        }
        if handle.index() >= self.pdf.pages.len() {
            return Err(Error::PageIndex {
                index: handle.index(),
                page_count: self.pdf.pages.len(),
            });
        }
        Ok(())
    }
}

impl Drop for MemoryDocument {
    fn drop(&mut self) {
        let mut disk = self.disk.lock();
        if let Some(count) = disk.live_handles.get_mut(&self.info.path) {
            *count = count.saturating_sub(1);
        }
    }
}

impl DocumentBackend for MemoryDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn is_encrypted(&self) -> bool {
        self.pdf.password.is_some()
    }

    fn authenticate(&mut self, password: &str) -> Result<()> {
        match &self.pdf.password {
            Some(expected) if expected == password => {
                self.locked = false;
                Ok(())
            }
            Some(_) => Err(Error::Auth {
                path: self.info.path.clone(),
            }),
            None => Ok(()),
        }
    }

    fn page_count(&self) -> usize {
        self.pdf.pages.len()
    }

    fn outline(&self) -> Result<Vec<OutlineEntry>> {
        self.unlocked()?;
        Ok(self.pdf.outline.clone())
    }

    fn load_page(&self, index: usize) -> Result<PageHandle> {
        let handle = PageHandle::new(index, self.generation);
        self.check(handle)?;
        Ok(handle)
    }

    fn render(&self, request: RenderRequest) -> Result<Raster> {
        let page = self.page(request.page)?;
        let mut width = (page.width * request.zoom).ceil().max(1.0) as u32;
        let mut height = (page.height * request.zoom).ceil().max(1.0) as u32;
        if request.rotation % 180 != 0 {
            std::mem::swap(&mut width, &mut height);
        }
        let shade = (request.page.index() as u32 * 31 + request.rotation as u32 / 90 * 7) as u8;
        let pixels = [shade, shade, shade, 255].repeat((width * height) as usize);
        Ok(Raster {
            width,
            height,
            pixels,
        })
    }

    fn extract_words(&self, page: PageHandle) -> Result<Vec<Word>> {
        Ok(self.page(page)?.words.clone())
    }

    fn extract_links(&self, page: PageHandle) -> Result<Vec<LinkRecord>> {
        Ok(self.page(page)?.links.clone())
    }

    fn search(&self, page: PageHandle, query: &str) -> Result<Vec<Rect>> {
        let needle = query.to_lowercase();
        if needle.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .page(page)?
            .words
            .iter()
            .filter(|word| word.text.to_lowercase().contains(&needle))
            .map(|word| word.rect)
            .collect())
    }

    fn annotations(&self, page: PageHandle) -> Result<Vec<AnnotationRecord>> {
        Ok(self.page(page)?.annotations.clone())
    }

    fn add_annotation(
        &mut self,
        page: PageHandle,
        kind: &AnnotationKind,
        rect: Rect,
        info: &AnnotationInfo,
    ) -> Result<()> {
        if !kind.is_creatable() {
            return Err(Error::Annotation(format!("cannot create {kind} annotations")));
        }
        if !rect.is_finite() || rect.is_empty() {
            return Err(Error::Annotation(format!("invalid rectangle {rect:?}")));
        }
        self.page_mut(page)?.annotations.push(AnnotationRecord {
            kind: kind.clone(),
            info: info.clone(),
            rect,
        });
        Ok(())
    }

    fn delete_annotation(&mut self, page: PageHandle, index: usize) -> Result<()> {
        let annotations = &mut self.page_mut(page)?.annotations;
        if index >= annotations.len() {
            return Err(Error::AnnotationNotFound { index });
        }
        annotations.remove(index);
        Ok(())
    }

    fn save_incremental(&mut self, path: &Path) -> Result<()> {
        self.unlocked()?;
        let mut disk = self.disk.lock();
        if disk.failing_saves > 0 {
            disk.failing_saves -= 1;
            return Err(Error::Save {
                path: path.to_path_buf(),
                reason: "simulated write failure".into(),
            });
        }
        disk.files.insert(path.to_path_buf(), self.pdf.clone());
        drop(disk);
        self.generation += 1;
        Ok(())
    }

    fn embedded_files(&self) -> Result<Vec<EmbeddedFile>> {
        self.unlocked()?;
        Ok(self
            .pdf
            .attachments
            .iter()
            .map(|(name, bytes)| EmbeddedFile {
                name: name.clone(),
                filename: name.clone(),
                length: bytes.len(),
            })
            .collect())
    }

    fn embedded_file(&self, name: &str) -> Result<Vec<u8>> {
        self.unlocked()?;
        self.pdf
            .attachments
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| Error::Attachment {
                name: name.to_owned(),
                reason: "no such embedded file".into(),
            })
    }
}
