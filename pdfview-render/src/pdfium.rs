use std::convert::TryFrom;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use pdfview_core::{
    document_id_for_path, AnnotationInfo, AnnotationKind, AnnotationRecord, DocumentBackend,
    DocumentInfo, DocumentMetadata, DocumentProvider, EmbeddedFile, Error, LinkRecord, LinkTarget,
    OutlineEntry, PageHandle, Raster, Rect, RenderRequest, Result, Word,
};
use tracing::{debug, instrument, warn};

use crate::{assemble_words, from_pdf_space, to_pdf_space};

type PdfiumResult<T> = std::result::Result<T, PdfiumError>;

pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
}

impl PdfiumProvider {
    /// Binds the library staged by the build script, then one next to the
    /// working directory, then the system library.
    pub fn new() -> anyhow::Result<Self> {
        let pdfium = match bind_pdfium_from_build_hint() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

impl DocumentProvider for PdfiumProvider {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>> {
        let absolute = path.canonicalize().map_err(|err| Error::Open {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let document = match load_document(&self.pdfium, &absolute, None) {
            Ok(document) => Some(document),
            Err(err) if is_password_error(&err) => {
                debug!("document is password protected");
                None
            }
            Err(err) => {
                return Err(Error::Open {
                    path: absolute,
                    reason: err.to_string(),
                })
            }
        };
        Ok(Box::new(PdfiumDocument::new(
            absolute,
            document,
            Arc::clone(&self.pdfium),
        )))
    }
}

fn load_document(
    pdfium: &Pdfium,
    path: &Path,
    password: Option<&str>,
) -> PdfiumResult<PdfDocument<'static>> {
    let document = pdfium.load_pdf_from_file(path, password)?;
    // SAFETY: the document borrows the bindings owned by the `Pdfium` behind
    // the `Arc` that PdfiumDocument also holds. The `document` field is
    // declared before `pdfium`, so it is dropped first and never outlives
    // the bindings.
    Ok(unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) })
}

fn is_password_error(err: &PdfiumError) -> bool {
    matches!(
        err,
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError)
    )
}

fn engine_error(err: PdfiumError) -> Error {
    Error::Engine(err.to_string())
}

struct RenderCacheEntry {
    request: RenderRequest,
    raster: Raster,
}

struct PdfiumDocument {
    info: DocumentInfo,
    encrypted: bool,
    generation: u64,
    render_cache: Mutex<Option<RenderCacheEntry>>,
    /// `None` until a password unlocks the file.
    document: Option<PdfDocument<'static>>,
    pdfium: Arc<Pdfium>,
}

impl PdfiumDocument {
    fn new(path: PathBuf, document: Option<PdfDocument<'static>>, pdfium: Arc<Pdfium>) -> Self {
        let info = match &document {
            Some(document) => describe_document(document, &path),
            None => DocumentInfo {
                id: document_id_for_path(&path),
                path,
                page_count: 0,
                metadata: DocumentMetadata::default(),
            },
        };
        Self {
            info,
            encrypted: document.is_none(),
            generation: 0,
            render_cache: Mutex::new(None),
            document,
            pdfium,
        }
    }

    fn document(&self) -> Result<&PdfDocument<'static>> {
        self.document.as_ref().ok_or_else(|| Error::Auth {
            path: self.info.path.clone(),
        })
    }

    fn page(&self, handle: PageHandle) -> Result<PdfPage<'static>> {
        let document = self.document()?;
        if handle.generation() != self.generation {
            return Err(Error::StalePage {
                index: handle.index(),
            });
        }
        let page_count = self.page_count();
        let out_of_range = || Error::PageIndex {
            index: handle.index(),
            page_count,
        };
        if handle.index() >= page_count {
            return Err(out_of_range());
        }
        let index = PdfPageIndex::try_from(handle.index()).map_err(|_| out_of_range())?;
        document.pages().get(index).map_err(engine_error)
    }

    fn link_target(link: &PdfLink<'_>) -> Option<LinkTarget> {
        if let Some(action) = link.action() {
            match action.action_type() {
                PdfActionType::GoToDestinationInSameDocument => {
                    let page = action
                        .as_local_destination_action()
                        .and_then(|local| local.destination().ok())
                        .and_then(|destination| destination.page_index().ok());
                    if let Some(page) = page {
                        return Some(LinkTarget::GoToPage(page as usize + 1));
                    }
                }
                PdfActionType::Uri => {
                    let uri = action
                        .as_uri_action()
                        .and_then(|uri_action| uri_action.uri().ok())
                        .filter(|uri| !uri.is_empty());
                    if let Some(uri) = uri {
                        return Some(LinkTarget::ExternalUri(uri));
                    }
                }
                _ => {}
            }
        }

        link.destination()
            .and_then(|destination| destination.page_index().ok())
            .map(|page| LinkTarget::GoToPage(page as usize + 1))
    }
}

/// Annotations the viewer exposes, with their position in the page's own
/// annotation list. Links, form widgets and popups are not user annotations.
fn visible_annotations(page: &PdfPage<'_>) -> Vec<(usize, AnnotationRecord)> {
    let height = page.height().value;
    let mut records = Vec::new();
    for (raw_index, annotation) in page.annotations().iter().enumerate() {
        let kind = match annotation.annotation_type() {
            PdfPageAnnotationType::Link
            | PdfPageAnnotationType::Widget
            | PdfPageAnnotationType::Popup => continue,
            PdfPageAnnotationType::Text => AnnotationKind::Text,
            PdfPageAnnotationType::Highlight => AnnotationKind::Highlight,
            PdfPageAnnotationType::Square => AnnotationKind::Rectangle,
            PdfPageAnnotationType::FreeText => AnnotationKind::FreeText,
            other => AnnotationKind::Other(format!("{other:?}")),
        };
        let bounds = match annotation.bounds() {
            Ok(bounds) => bounds,
            Err(err) => {
                warn!(?err, raw_index, "skipping annotation without bounds");
                continue;
            }
        };
        let info = AnnotationInfo {
            content: annotation.contents().unwrap_or_default(),
            name: annotation.name().unwrap_or_default(),
            title: annotation.creator().unwrap_or_default(),
            creation_date: annotation.creation_date().unwrap_or_default(),
            mod_date: annotation.modification_date().unwrap_or_default(),
            subject: String::new(),
        };
        records.push((
            raw_index,
            AnnotationRecord {
                kind,
                info,
                rect: pdf_rect_to_page(&bounds, height),
            },
        ));
    }
    records
}

fn pdf_rect_to_page(rect: &PdfRect, page_height: f32) -> Rect {
    from_pdf_space(
        rect.left().value,
        rect.bottom().value,
        rect.right().value,
        rect.top().value,
        page_height,
    )
}

fn page_rect_to_pdf(rect: Rect, page_height: f32) -> PdfRect {
    let (left, bottom, right, top) = to_pdf_space(rect, page_height);
    PdfRect::new_from_values(bottom, left, top, right)
}

fn write_common<A: PdfPageAnnotationCommon>(
    annotation: &mut A,
    bounds: PdfRect,
    info: &AnnotationInfo,
) -> PdfiumResult<()> {
    annotation.set_bounds(bounds)?;
    if !info.content.is_empty() {
        annotation.set_contents(&info.content)?;
    }
    if !info.title.is_empty() {
        annotation.set_creator(&info.title)?;
    }
    Ok(())
}

fn render_rotation(degrees: i32) -> PdfPageRenderRotation {
    match degrees.rem_euclid(360) {
        90 => PdfPageRenderRotation::Degrees90,
        180 => PdfPageRenderRotation::Degrees180,
        270 => PdfPageRenderRotation::Degrees270,
        _ => PdfPageRenderRotation::None,
    }
}

impl DocumentBackend for PdfiumDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn authenticate(&mut self, password: &str) -> Result<()> {
        if self.document.is_some() {
            return Ok(());
        }
        let path = self.info.path.clone();
        match load_document(&self.pdfium, &path, Some(password)) {
            Ok(document) => {
                self.info = describe_document(&document, &path);
                self.document = Some(document);
                Ok(())
            }
            Err(err) if is_password_error(&err) => Err(Error::Auth { path }),
            Err(err) => Err(Error::Open {
                path,
                reason: err.to_string(),
            }),
        }
    }

    fn page_count(&self) -> usize {
        self.document
            .as_ref()
            .map(|document| usize::try_from(document.pages().len()).unwrap_or_default())
            .unwrap_or_default()
    }

    fn outline(&self) -> Result<Vec<OutlineEntry>> {
        let document = self.document()?;
        let mut outline = Vec::new();
        if let Some(root) = document.bookmarks().root() {
            collect_outline(root, 1, &mut outline);
        }
        Ok(outline)
    }

    fn load_page(&self, index: usize) -> Result<PageHandle> {
        let handle = PageHandle::new(index, self.generation);
        self.page(handle)?;
        Ok(handle)
    }

    #[instrument(skip(self, request), fields(page = request.page.index() + 1))]
    fn render(&self, request: RenderRequest) -> Result<Raster> {
        if let Some(entry) = self.render_cache.lock().as_ref() {
            if entry.request == request {
                return Ok(entry.raster.clone());
            }
        }

        let page = self.page(request.page)?;
        let config = PdfRenderConfig::new()
            .scale_page_by_factor(request.zoom)
            .rotate(render_rotation(request.rotation), true);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|err| Error::Render {
                page: request.page.index() + 1,
                reason: err.to_string(),
            })?;
        let raster = Raster {
            width: u32::try_from(bitmap.width()).unwrap_or_default(),
            height: u32::try_from(bitmap.height()).unwrap_or_default(),
            pixels: bitmap.as_rgba_bytes(),
        };

        *self.render_cache.lock() = Some(RenderCacheEntry {
            request,
            raster: raster.clone(),
        });
        Ok(raster)
    }

    fn extract_words(&self, handle: PageHandle) -> Result<Vec<Word>> {
        let page = self.page(handle)?;
        let height = page.height().value;
        let text = page.text().map_err(engine_error)?;
        let chars = text.chars();
        let glyphs = chars.iter().filter_map(|glyph| {
            let ch = glyph.unicode_char()?;
            let bounds = glyph.loose_bounds().ok()?;
            Some((ch, pdf_rect_to_page(&bounds, height)))
        });
        Ok(assemble_words(glyphs))
    }

    fn extract_links(&self, handle: PageHandle) -> Result<Vec<LinkRecord>> {
        let page = self.page(handle)?;
        let height = page.height().value;
        let mut records = Vec::new();
        for link in page.links().iter() {
            let rect = match link.rect() {
                Ok(rect) => rect,
                Err(err) => {
                    warn!(?err, page = handle.index() + 1, "failed to resolve link rectangle");
                    continue;
                }
            };
            let Some(target) = Self::link_target(&link) else {
                continue;
            };
            records.push(LinkRecord {
                source_rect: pdf_rect_to_page(&rect, height),
                target,
            });
        }
        Ok(records)
    }

    fn search(&self, handle: PageHandle, query: &str) -> Result<Vec<Rect>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let page = self.page(handle)?;
        let height = page.height().value;
        let text = page.text().map_err(engine_error)?;
        let search = text
            .search(query, &PdfSearchOptions::new())
            .map_err(engine_error)?;

        let mut matches = Vec::new();
        while let Some(segments) = search.find_next() {
            for segment in segments.iter() {
                let rect = pdf_rect_to_page(&segment.bounds(), height);
                if !rect.is_empty() {
                    matches.push(rect);
                }
            }
        }
        Ok(matches)
    }

    fn annotations(&self, handle: PageHandle) -> Result<Vec<AnnotationRecord>> {
        let page = self.page(handle)?;
        Ok(visible_annotations(&page)
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    #[instrument(skip(self, handle, info), fields(page = handle.index() + 1))]
    fn add_annotation(
        &mut self,
        handle: PageHandle,
        kind: &AnnotationKind,
        rect: Rect,
        info: &AnnotationInfo,
    ) -> Result<()> {
        if !rect.is_finite() || rect.is_empty() {
            return Err(Error::Annotation(format!("invalid rectangle {rect:?}")));
        }
        let mut page = self.page(handle)?;
        let bounds = page_rect_to_pdf(rect, page.height().value);
        let annotations = page.annotations_mut();
        let created = match kind {
            AnnotationKind::Text => annotations
                .create_text_annotation(&info.content)
                .and_then(|mut annotation| write_common(&mut annotation, bounds, info)),
            AnnotationKind::FreeText => annotations
                .create_free_text_annotation(&info.content)
                .and_then(|mut annotation| write_common(&mut annotation, bounds, info)),
            AnnotationKind::Rectangle => annotations
                .create_square_annotation()
                .and_then(|mut annotation| write_common(&mut annotation, bounds, info)),
            AnnotationKind::Highlight => {
                annotations
                    .create_highlight_annotation()
                    .and_then(|mut annotation| {
                        annotation
                            .attachment_points_mut()
                            .create_attachment_point_at_end(PdfQuadPoints::from_rect(&bounds))?;
                        write_common(&mut annotation, bounds, info)
                    })
            }
            AnnotationKind::Other(name) => {
                return Err(Error::Annotation(format!("cannot create {name} annotations")))
            }
        };
        created.map_err(|err| Error::Annotation(err.to_string()))
    }

    fn delete_annotation(&mut self, handle: PageHandle, index: usize) -> Result<()> {
        let mut page = self.page(handle)?;
        let raw_index = visible_annotations(&page)
            .get(index)
            .map(|(raw_index, _)| *raw_index)
            .ok_or(Error::AnnotationNotFound { index })?;
        let annotation = page.annotations().get(raw_index).map_err(engine_error)?;
        page.annotations_mut()
            .delete_annotation(annotation)
            .map_err(engine_error)
    }

    /// Pdfium cannot append an incremental update, so the whole document is
    /// written next to `path` and moved over it.
    #[instrument(skip(self), fields(path = %path.display()))]
    fn save_incremental(&mut self, path: &Path) -> Result<()> {
        let save_error = |reason: String| Error::Save {
            path: path.to_path_buf(),
            reason,
        };
        let file_name = path
            .file_name()
            .ok_or_else(|| save_error("path has no file name".into()))?;
        let staging = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

        self.document()?
            .save_to_file(&staging)
            .map_err(|err| save_error(err.to_string()))?;
        if let Err(err) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(save_error(err.to_string()));
        }

        self.generation += 1;
        *self.render_cache.lock() = None;
        debug!(generation = self.generation, "document saved");
        Ok(())
    }

    fn embedded_files(&self) -> Result<Vec<EmbeddedFile>> {
        let document = self.document()?;
        Ok(document
            .attachments()
            .iter()
            .map(|attachment| {
                let name = attachment.name();
                EmbeddedFile {
                    filename: name.clone(),
                    length: attachment.len(),
                    name,
                }
            })
            .collect())
    }

    fn embedded_file(&self, name: &str) -> Result<Vec<u8>> {
        let document = self.document()?;
        let attachment = document
            .attachments()
            .iter()
            .find(|attachment| attachment.name() == name)
            .ok_or_else(|| Error::Attachment {
                name: name.to_owned(),
                reason: "no such embedded file".into(),
            })?;
        attachment.save_to_bytes().map_err(|err| Error::Attachment {
            name: name.to_owned(),
            reason: err.to_string(),
        })
    }
}

fn collect_outline(mut bookmark: PdfBookmark<'_>, depth: usize, out: &mut Vec<OutlineEntry>) {
    loop {
        let title = bookmark.title();
        let page = bookmark
            .destination()
            .and_then(|destination| destination.page_index().ok());
        if let (Some(title), Some(page)) = (title, page) {
            out.push(OutlineEntry {
                depth,
                title,
                target_page: page as usize + 1,
            });
        }

        if let Some(child) = bookmark.first_child() {
            collect_outline(child, depth + 1, out);
        }

        match bookmark.next_sibling() {
            Some(next) => bookmark = next,
            None => break,
        }
    }
}

fn describe_document(document: &PdfDocument<'_>, path: &Path) -> DocumentInfo {
    let metadata = document.metadata();
    let tag = |kind| metadata.get(kind).map(|tag| tag.value().to_owned());
    let keywords = tag(PdfDocumentMetadataTagType::Keywords)
        .map(|value| value.split(',').map(|s| s.trim().to_owned()).collect())
        .unwrap_or_default();

    DocumentInfo {
        id: document_id_for_path(path),
        path: path.to_path_buf(),
        page_count: usize::try_from(document.pages().len()).unwrap_or_default(),
        metadata: DocumentMetadata {
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            keywords,
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
        },
    }
}

fn bind_pdfium_from_build_hint() -> Option<Pdfium> {
    match option_env!("PDFVIEW_PDFIUM_LIBRARY_PATH") {
        Some(path) if !path.is_empty() => match Pdfium::bind_to_library(path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!("failed to load Pdfium from build-provided path {path}: {err}");
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> anyhow::Result<Pdfium> {
    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    let local_err = match Pdfium::bind_to_library(&local) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => format!("{}: {err}", local.display()),
    };
    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => Err(anyhow!(
            "failed to bind to a pdfium library; ensure it is installed ({local_err}, system: {err})"
        )),
    }
}
