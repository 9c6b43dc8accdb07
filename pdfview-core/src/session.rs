//! Document session: the open document, the view parameters and the
//! rendered page derived from them.
//!
//! Every transition that changes page, zoom or rotation produces a fresh
//! [`PageView`]. Views are built completely before they replace the previous
//! one, so a failed render leaves the last good raster (and page index) in
//! place.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::engine::{
    AnnotationRecord, DocumentBackend, DocumentInfo, DocumentProvider, EmbeddedFile, LinkRecord,
    OutlineEntry, PageHandle, Raster, RenderRequest,
};
use crate::error::{Error, Result};
use crate::geometry::{
    clamp_drag, is_upright, normalize_rotation, screen_rect_to_page, Point, Rect,
};
use crate::links::{search_overlays, LinkIndex, Overlay};
use crate::outline::{build_tree, OutlineNode};
use crate::selection::{hit_test, resolve_link_hover, resolve_text_selection};

pub const MIN_ZOOM: f32 = 0.5;
pub const ZOOM_STEP: f32 = 0.5;
pub const DEFAULT_ZOOM: f32 = 2.0;

/// The rendered current page and what is drawn on top of it.
#[derive(Debug, Clone)]
pub struct PageView {
    raster: Raster,
    overlays: Vec<Overlay>,
    links: LinkIndex,
}

impl PageView {
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Empty while the page is rotated.
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn links(&self) -> &LinkIndex {
        &self.links
    }
}

/// Annotation currently shown to the user after a click.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationPopup {
    pub index: usize,
    pub record: AnnotationRecord,
}

pub(crate) struct LoadedDocument {
    pub(crate) backend: Box<dyn DocumentBackend>,
    /// Kept to unlock the document again on reload.
    password: Option<String>,
    outline: Vec<OutlineEntry>,
    /// One-based; zero when the document has no pages.
    pub(crate) current_page: usize,
    page: Option<PageHandle>,
    annotations: Vec<AnnotationRecord>,
}

struct PreparedPage {
    page: Option<PageHandle>,
    annotations: Vec<AnnotationRecord>,
    view: Option<PageView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchDirection {
    Forward,
    Backward,
}

pub struct Session {
    provider: Arc<dyn DocumentProvider>,
    pub(crate) document: Option<LoadedDocument>,
    zoom: f32,
    rotation: i32,
    view: Option<PageView>,
    search_query: Option<String>,
    /// Position of the hovered link in the current view's link index.
    hovered_link: Option<usize>,
    active_popup: Option<AnnotationPopup>,
}

impl Session {
    pub fn new(provider: Arc<dyn DocumentProvider>) -> Self {
        Self::with_zoom(provider, DEFAULT_ZOOM)
    }

    pub fn with_zoom(provider: Arc<dyn DocumentProvider>, zoom: f32) -> Self {
        Self {
            provider,
            document: None,
            zoom: zoom.max(MIN_ZOOM),
            rotation: 0,
            view: None,
            search_query: None,
            hovered_link: None,
            active_popup: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn info(&self) -> Option<&DocumentInfo> {
        self.document.as_ref().map(|doc| doc.backend.info())
    }

    pub fn path(&self) -> Option<&Path> {
        self.info().map(|info| info.path.as_path())
    }

    pub fn page_count(&self) -> usize {
        self.document
            .as_ref()
            .map(|doc| doc.backend.page_count())
            .unwrap_or_default()
    }

    /// One-based; zero when nothing is loaded.
    pub fn current_page(&self) -> usize {
        self.document
            .as_ref()
            .map(|doc| doc.current_page)
            .unwrap_or_default()
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn is_upright(&self) -> bool {
        is_upright(self.rotation)
    }

    pub fn view(&self) -> Option<&PageView> {
        self.view.as_ref()
    }

    pub fn raster(&self) -> Option<&Raster> {
        self.view.as_ref().map(PageView::raster)
    }

    pub fn overlays(&self) -> &[Overlay] {
        self.view.as_ref().map(PageView::overlays).unwrap_or(&[])
    }

    pub fn outline(&self) -> &[OutlineEntry] {
        self.document
            .as_ref()
            .map(|doc| doc.outline.as_slice())
            .unwrap_or(&[])
    }

    pub fn outline_tree(&self) -> Vec<OutlineNode> {
        build_tree(self.outline())
    }

    /// Annotations of the current page as enumerated at the last load.
    pub fn annotations(&self) -> &[AnnotationRecord] {
        self.document
            .as_ref()
            .map(|doc| doc.annotations.as_slice())
            .unwrap_or(&[])
    }

    pub fn search_query(&self) -> Option<&str> {
        self.search_query.as_deref()
    }

    pub fn hovered_link(&self) -> Option<&LinkRecord> {
        let index = self.hovered_link?;
        self.view.as_ref()?.links.records().get(index)
    }

    pub fn hovered_link_index(&self) -> Option<usize> {
        self.hovered_link
    }

    pub fn active_popup(&self) -> Option<&AnnotationPopup> {
        self.active_popup.as_ref()
    }

    /// Opens `path`, replacing the current document only once the new one is
    /// unlocked and its first page rendered. On error the previous session is
    /// left untouched; it is up to the caller to treat a failure without a
    /// loaded document as fatal.
    #[instrument(skip(self, password), fields(path = %path.display()))]
    pub fn open(&mut self, path: &Path, password: Option<&str>) -> Result<()> {
        let (document, view) = self.load(path, password, 1, None)?;
        info!(
            id = %document.backend.info().id,
            pages = document.backend.page_count(),
            "document opened"
        );
        self.search_query = None;
        self.install(document, view);
        Ok(())
    }

    /// Reopens the current file from disk, keeping page, zoom, rotation and
    /// search. Annotations are enumerated afresh.
    #[instrument(skip(self))]
    pub fn reload(&mut self) -> Result<()> {
        let doc = self.document.as_ref().ok_or(Error::NoDocument)?;
        let path = doc.backend.info().path.clone();
        let password = doc.password.clone();
        let page = doc.current_page;
        let query = self.search_query.clone();

        let (document, view) = self.load(&path, password.as_deref(), page, query.as_deref())?;
        debug!(page = document.current_page, "document reloaded");
        self.install(document, view);
        Ok(())
    }

    fn load(
        &self,
        path: &Path,
        password: Option<&str>,
        page: usize,
        query: Option<&str>,
    ) -> Result<(LoadedDocument, Option<PageView>)> {
        let mut backend = self.provider.open(path)?;
        if backend.is_encrypted() {
            match password {
                Some(password) => backend.authenticate(password)?,
                None => {
                    return Err(Error::Auth {
                        path: path.to_path_buf(),
                    })
                }
            }
        }

        let page_count = backend.page_count();
        let page = if page_count == 0 {
            0
        } else {
            page.clamp(1, page_count)
        };
        let outline = backend.outline().unwrap_or_else(|err| {
            warn!(%err, "failed to read outline");
            Vec::new()
        });
        let prepared = self.prepare_page(backend.as_ref(), page, query)?;
        let document = LoadedDocument {
            backend,
            password: password.map(str::to_owned),
            outline,
            current_page: page,
            page: prepared.page,
            annotations: prepared.annotations,
        };
        Ok((document, prepared.view))
    }

    fn install(&mut self, document: LoadedDocument, view: Option<PageView>) {
        // The previous backend is dropped here, right after its replacement
        // was acquired.
        self.document = Some(document);
        self.view = view;
        self.hovered_link = None;
        self.active_popup = None;
    }

    fn prepare_page(
        &self,
        backend: &dyn DocumentBackend,
        page: usize,
        query: Option<&str>,
    ) -> Result<PreparedPage> {
        if page == 0 {
            return Ok(PreparedPage {
                page: None,
                annotations: Vec::new(),
                view: None,
            });
        }
        let handle = backend.load_page(page - 1)?;
        let annotations = backend.annotations(handle)?;
        let view = self.build_view(backend, handle, query)?;
        Ok(PreparedPage {
            page: Some(handle),
            annotations,
            view: Some(view),
        })
    }

    fn build_view(
        &self,
        backend: &dyn DocumentBackend,
        page: PageHandle,
        query: Option<&str>,
    ) -> Result<PageView> {
        let request = RenderRequest {
            page,
            zoom: self.zoom,
            rotation: normalize_rotation(self.rotation),
        };
        let raster = backend.render(request).map_err(|err| match err {
            Error::Render { .. } => err,
            other => Error::Render {
                page: page.index() + 1,
                reason: other.to_string(),
            },
        })?;

        if !is_upright(self.rotation) {
            return Ok(PageView {
                raster,
                overlays: Vec::new(),
                links: LinkIndex::default(),
            });
        }

        let links = LinkIndex::build(backend.extract_links(page)?, self.zoom);
        let mut overlays: Vec<Overlay> = links.overlays().collect();
        if let Some(query) = query {
            let matches = backend.search(page, query)?;
            overlays.extend(search_overlays(&matches, self.zoom, query));
        }
        Ok(PageView {
            raster,
            overlays,
            links,
        })
    }

    /// Rebuilds the view of the current page from scratch.
    pub fn render(&mut self) -> Result<()> {
        let Some(doc) = self.document.as_ref() else {
            self.view = None;
            return Ok(());
        };
        let Some(page) = doc.page else {
            self.view = None;
            return Ok(());
        };
        let view = self.build_view(doc.backend.as_ref(), page, self.search_query.as_deref())?;
        self.view = Some(view);
        if !self.is_upright() {
            self.hovered_link = None;
            self.active_popup = None;
        }
        Ok(())
    }

    /// Jumps to the one-based `page`. Out-of-range pages are ignored.
    #[instrument(skip(self))]
    pub fn goto_page(&mut self, page: usize) -> Result<bool> {
        let Some(doc) = self.document.as_ref() else {
            return Ok(false);
        };
        if page < 1 || page > doc.backend.page_count() {
            debug!(page, "ignoring navigation outside the document");
            return Ok(false);
        }
        let prepared =
            self.prepare_page(doc.backend.as_ref(), page, self.search_query.as_deref())?;
        self.show_page(page, prepared);
        Ok(true)
    }

    /// Re-derives the page handle, annotations and view of the current page
    /// from the open backend. Used when a reload failed after the backend
    /// invalidated its handles by saving.
    pub(crate) fn refresh_page(&mut self) -> Result<()> {
        let Some(doc) = self.document.as_ref() else {
            return Ok(());
        };
        let page = doc.current_page;
        let prepared =
            self.prepare_page(doc.backend.as_ref(), page, self.search_query.as_deref())?;
        self.show_page(page, prepared);
        Ok(())
    }

    fn show_page(&mut self, page: usize, prepared: PreparedPage) {
        if let Some(doc) = self.document.as_mut() {
            doc.current_page = page;
            doc.page = prepared.page;
            doc.annotations = prepared.annotations;
        }
        self.view = prepared.view;
        self.hovered_link = None;
        self.active_popup = None;
    }

    pub fn next_page(&mut self) -> Result<bool> {
        let current = self.current_page();
        if current == 0 || current >= self.page_count() {
            return Ok(false);
        }
        self.goto_page(current + 1)
    }

    pub fn prev_page(&mut self) -> Result<bool> {
        let current = self.current_page();
        if current <= 1 {
            return Ok(false);
        }
        self.goto_page(current - 1)
    }

    /// Adds `delta` to the zoom factor, never going below [`MIN_ZOOM`].
    pub fn set_zoom(&mut self, delta: f32) -> Result<bool> {
        let previous = self.zoom;
        let next = (previous + delta).max(MIN_ZOOM);
        if !next.is_finite() || (next - previous).abs() < f32::EPSILON {
            return Ok(false);
        }
        self.zoom = next;
        if let Err(err) = self.render() {
            self.zoom = previous;
            return Err(err);
        }
        debug!(zoom = self.zoom, "zoom changed");
        Ok(true)
    }

    pub fn zoom_in(&mut self) -> Result<bool> {
        self.set_zoom(ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> Result<bool> {
        self.set_zoom(-ZOOM_STEP)
    }

    /// Adds `delta` degrees (a multiple of 90) to the rotation accumulator.
    pub fn rotate(&mut self, delta: i32) -> Result<bool> {
        if delta % 90 != 0 {
            return Err(Error::InvalidRotation(delta));
        }
        if delta == 0 {
            return Ok(false);
        }
        let previous = self.rotation;
        self.rotation = previous.saturating_add(delta);
        if let Err(err) = self.render() {
            self.rotation = previous;
            return Err(err);
        }
        debug!(rotation = self.rotation, "rotation changed");
        Ok(true)
    }

    pub fn rotate_left(&mut self) -> Result<bool> {
        self.rotate(-90)
    }

    pub fn rotate_right(&mut self) -> Result<bool> {
        self.rotate(90)
    }

    /// Link under the screen `point`; never matches while rotated.
    pub fn link_at(&self, point: Point) -> Option<&LinkRecord> {
        self.link_hit(point).map(|(_, link)| link)
    }

    fn link_hit(&self, point: Point) -> Option<(usize, &LinkRecord)> {
        let view = self.view.as_ref()?;
        resolve_link_hover(point, view.links.records(), self.zoom, self.rotation)
    }

    /// Updates the hover state; returns whether it changed.
    pub fn hover_at(&mut self, point: Point) -> bool {
        let hovered = self.link_hit(point).map(|(index, _)| index);
        let changed = hovered != self.hovered_link;
        self.hovered_link = hovered;
        changed
    }

    /// First annotation, in enumeration order, under the screen `point`.
    pub fn annotation_at(&self, point: Point) -> Option<(usize, &AnnotationRecord)> {
        if !self.is_upright() {
            return None;
        }
        hit_test(point, self.annotations(), self.zoom)
    }

    pub fn open_annotation_popup(&mut self, point: Point) -> Option<&AnnotationPopup> {
        let popup = self
            .annotation_at(point)
            .map(|(index, record)| AnnotationPopup {
                index,
                record: record.clone(),
            })?;
        self.active_popup = Some(popup);
        self.active_popup.as_ref()
    }

    pub fn close_annotation_popup(&mut self) -> bool {
        self.active_popup.take().is_some()
    }

    /// Maps a drag between two canvas points to a page-space rectangle,
    /// clamped to the raster.
    pub fn drag_to_page_rect(&self, start: Point, end: Point) -> Option<Rect> {
        if !self.is_upright() {
            return None;
        }
        let raster = self.raster()?;
        let canvas = clamp_drag(start, end, raster.width, raster.height);
        Some(screen_rect_to_page(canvas, self.zoom))
    }

    /// Text of the words touched by the drag, or `None` when selection is
    /// unavailable (rotated or nothing rendered).
    pub fn select_text(&self, start: Point, end: Point) -> Result<Option<String>> {
        let Some(rect) = self.drag_to_page_rect(start, end) else {
            return Ok(None);
        };
        let Some((doc, page)) = self
            .document
            .as_ref()
            .and_then(|doc| doc.page.map(|page| (doc, page)))
        else {
            return Ok(None);
        };
        let words = doc.backend.extract_words(page)?;
        Ok(Some(resolve_text_selection(&rect, &words)))
    }

    /// Sets the search query and moves to the first page, starting at the
    /// current one, with a match. An empty query clears the search.
    pub fn search(&mut self, query: &str) -> Result<Option<usize>> {
        let query = query.trim();
        if query.is_empty() {
            self.search_query = None;
            self.render()?;
            return Ok(None);
        }
        self.search_query = Some(query.to_owned());
        self.jump_to_match(SearchDirection::Forward, true)
    }

    pub fn search_next(&mut self) -> Result<Option<usize>> {
        self.jump_to_match(SearchDirection::Forward, false)
    }

    pub fn search_prev(&mut self) -> Result<Option<usize>> {
        self.jump_to_match(SearchDirection::Backward, false)
    }

    fn jump_to_match(
        &mut self,
        direction: SearchDirection,
        include_current: bool,
    ) -> Result<Option<usize>> {
        let Some(query) = self.search_query.clone() else {
            return Ok(None);
        };
        let found = self.find_match_page(&query, direction, include_current)?;
        match found {
            Some(page) if page != self.current_page() => {
                self.goto_page(page)?;
            }
            _ => self.render()?,
        }
        Ok(found)
    }

    fn find_match_page(
        &self,
        query: &str,
        direction: SearchDirection,
        include_current: bool,
    ) -> Result<Option<usize>> {
        let Some(doc) = self.document.as_ref() else {
            return Ok(None);
        };
        let count = doc.backend.page_count();
        if count == 0 {
            return Ok(None);
        }
        let start = doc.current_page.max(1) as isize;
        let first = if include_current { 0 } else { 1 };
        for offset in first..=count as isize {
            let step = match direction {
                SearchDirection::Forward => offset,
                SearchDirection::Backward => -offset,
            };
            let page = (start - 1 + step).rem_euclid(count as isize) as usize + 1;
            let handle = doc.backend.load_page(page - 1)?;
            if !doc.backend.search(handle, query)?.is_empty() {
                return Ok(Some(page));
            }
        }
        Ok(None)
    }

    pub fn embedded_files(&self) -> Result<Vec<EmbeddedFile>> {
        let doc = self.document.as_ref().ok_or(Error::NoDocument)?;
        doc.backend.embedded_files()
    }

    /// Writes the embedded file `name` to `dest`, returning its size.
    #[instrument(skip(self), fields(dest = %dest.display()))]
    pub fn save_attachment(&self, name: &str, dest: &Path) -> Result<usize> {
        let doc = self.document.as_ref().ok_or(Error::NoDocument)?;
        let bytes = doc.backend.embedded_file(name)?;
        fs::write(dest, &bytes).map_err(|err| Error::Save {
            path: PathBuf::from(dest),
            reason: err.to_string(),
        })?;
        info!(bytes = bytes.len(), "attachment saved");
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{LinkTarget, Word};
    use crate::memory::{MemoryPdf, MemoryProvider};
    use crate::links::OverlayKind;

    const PATH: &str = "/docs/manual.pdf";

    fn fixture(pages: usize) -> (MemoryProvider, Session) {
        let provider = MemoryProvider::new();
        let mut pdf = MemoryPdf::with_pages(pages);
        if pages >= 1 {
            pdf.page_mut(1).links.push(LinkRecord {
                source_rect: Rect::new(10.0, 10.0, 20.0, 20.0),
                target: LinkTarget::GoToPage(3),
            });
        }
        provider.insert(PATH, pdf);
        let mut session = Session::new(Arc::new(provider.clone()));
        session.open(Path::new(PATH), None).unwrap();
        (provider, session)
    }

    #[test]
    fn open_starts_on_first_page() {
        let (_, session) = fixture(4);
        assert!(session.is_loaded());
        assert_eq!(session.current_page(), 1);
        assert_eq!(session.page_count(), 4);
        assert!(session.raster().is_some());
    }

    #[test]
    fn empty_document_has_no_page() {
        let (_, mut session) = fixture(0);
        assert_eq!(session.current_page(), 0);
        assert!(session.raster().is_none());
        assert!(!session.next_page().unwrap());
        assert!(!session.goto_page(1).unwrap());
    }

    #[test]
    fn failed_open_keeps_previous_document() {
        let (_, mut session) = fixture(4);
        session.goto_page(3).unwrap();
        let before = session.raster().cloned();

        let err = session.open(Path::new("/docs/missing.pdf"), None).unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
        assert_eq!(session.path(), Some(Path::new(PATH)));
        assert_eq!(session.current_page(), 3);
        assert_eq!(session.raster().cloned(), before);
    }

    #[test]
    fn opening_another_document_releases_the_previous_handle() {
        let (provider, mut session) = fixture(2);
        provider.insert("/docs/other.pdf", MemoryPdf::with_pages(1));
        session.open(Path::new("/docs/other.pdf"), None).unwrap();
        assert_eq!(provider.live_handles(Path::new(PATH)), 0);
        assert_eq!(provider.live_handles(Path::new("/docs/other.pdf")), 1);
    }

    #[test]
    fn encrypted_document_needs_the_right_password() {
        let provider = MemoryProvider::new();
        provider.insert("/docs/locked.pdf", MemoryPdf::with_pages(2).encrypted("pw"));
        let mut session = Session::new(Arc::new(provider));

        let path = Path::new("/docs/locked.pdf");
        assert!(session.open(path, None).unwrap_err().is_auth());
        assert!(session.open(path, Some("nope")).unwrap_err().is_auth());
        assert!(!session.is_loaded());
        session.open(path, Some("pw")).unwrap();
        assert!(session.is_loaded());
        session.reload().unwrap();
        assert_eq!(session.current_page(), 1);
    }

    #[test]
    fn navigation_is_clamped_to_the_document() {
        let (_, mut session) = fixture(3);
        assert!(!session.prev_page().unwrap());
        assert!(session.next_page().unwrap());
        assert!(session.next_page().unwrap());
        assert_eq!(session.current_page(), 3);

        let raster = session.raster().cloned();
        assert!(!session.next_page().unwrap());
        assert!(!session.goto_page(0).unwrap());
        assert!(!session.goto_page(4).unwrap());
        assert_eq!(session.current_page(), 3);
        assert_eq!(session.raster().cloned(), raster);
    }

    #[test]
    fn zoom_never_drops_below_floor() {
        let (_, mut session) = fixture(1);
        assert_eq!(session.zoom(), 2.0);
        for _ in 0..10 {
            session.zoom_out().unwrap();
            assert!(session.zoom() >= MIN_ZOOM);
        }
        assert_eq!(session.zoom(), MIN_ZOOM);
        assert!(!session.zoom_out().unwrap());
        assert!(!session.set_zoom(-3.0).unwrap());
    }

    #[test]
    fn zoom_in_and_out_are_inverse_above_the_floor() {
        let (_, mut session) = fixture(1);
        session.zoom_in().unwrap();
        let raster = session.raster().cloned();
        session.zoom_in().unwrap();
        session.zoom_out().unwrap();
        assert_eq!(session.zoom(), 2.5);
        assert_eq!(session.raster().cloned(), raster);
    }

    #[test]
    fn rotation_by_full_turns_renders_identically() {
        let (_, mut session) = fixture(1);
        session.rotate_right().unwrap();
        let quarter = session.raster().cloned();
        let quarter_overlays = session.overlays().to_vec();

        session.rotate(360).unwrap();
        assert_eq!(session.raster().cloned(), quarter);
        assert_eq!(session.overlays(), quarter_overlays.as_slice());

        session.rotate(-720).unwrap();
        assert_eq!(session.rotation(), -270);
        assert_eq!(session.raster().cloned(), quarter);
    }

    #[test]
    fn rotation_must_be_a_multiple_of_ninety() {
        let (_, mut session) = fixture(1);
        assert!(matches!(session.rotate(45), Err(Error::InvalidRotation(45))));
        assert_eq!(session.rotation(), 0);
    }

    #[test]
    fn overlays_disappear_while_rotated() {
        let (_, mut session) = fixture(1);
        assert_eq!(session.overlays().len(), 1);
        assert_eq!(session.overlays()[0].kind, OverlayKind::Link);

        session.rotate_left().unwrap();
        assert!(session.overlays().is_empty());
        session.rotate_right().unwrap();
        assert_eq!(session.overlays().len(), 1);
    }

    #[test]
    fn hovering_a_link_records_its_target_only_when_upright() {
        let (_, mut session) = fixture(1);
        // Link spans 10..20 in page space, 20..40 on screen at zoom 2.
        assert!(session.hover_at(Point::new(30.0, 30.0)));
        assert_eq!(
            session.hovered_link().map(|link| &link.target),
            Some(&LinkTarget::GoToPage(3))
        );
        assert_eq!(session.hovered_link_index(), Some(0));
        assert!(!session.hover_at(Point::new(30.0, 30.0)));

        // Rotating clears the hover and keeps links inert.
        session.rotate(180).unwrap();
        assert_eq!(session.hovered_link(), None);
        assert!(!session.hover_at(Point::new(30.0, 30.0)));
        assert_eq!(session.link_at(Point::new(30.0, 30.0)), None);
    }

    #[test]
    fn text_selection_maps_canvas_to_page_space() {
        let provider = MemoryProvider::new();
        let mut pdf = MemoryPdf::with_pages(1);
        pdf.page_mut(1).words = vec![
            Word::new(Rect::new(12.0, 0.0, 20.0, 10.0), "World"),
            Word::new(Rect::new(0.0, 0.0, 10.0, 10.0), "Hello"),
            Word::new(Rect::new(0.0, 30.0, 10.0, 40.0), "below"),
        ];
        provider.insert(PATH, pdf);
        let mut session = Session::new(Arc::new(provider));
        session.open(Path::new(PATH), None).unwrap();

        // Zoom 2: canvas (0,0)-(50,22) covers page (0,0)-(25,11).
        let text = session
            .select_text(Point::new(50.0, 22.0), Point::new(-5.0, -5.0))
            .unwrap();
        assert_eq!(text.as_deref(), Some("Hello World"));

        session.rotate_right().unwrap();
        assert_eq!(session.select_text(Point::new(0.0, 0.0), Point::new(50.0, 22.0)).unwrap(), None);
    }

    #[test]
    fn search_jumps_to_matching_page_and_highlights() {
        let provider = MemoryProvider::new();
        let mut pdf = MemoryPdf::with_pages(4);
        pdf.page_mut(3).words = vec![Word::new(Rect::new(5.0, 5.0, 25.0, 15.0), "needle")];
        pdf.page_mut(1).words = vec![Word::new(Rect::new(5.0, 5.0, 25.0, 15.0), "Needles")];
        provider.insert(PATH, pdf);
        let mut session = Session::new(Arc::new(provider));
        session.open(Path::new(PATH), None).unwrap();
        session.goto_page(2).unwrap();

        assert_eq!(session.search("needle").unwrap(), Some(3));
        assert_eq!(session.current_page(), 3);
        assert!(session
            .overlays()
            .iter()
            .any(|overlay| overlay.kind == OverlayKind::SearchMatch));

        assert_eq!(session.search_next().unwrap(), Some(1));
        assert_eq!(session.search_prev().unwrap(), Some(3));

        assert_eq!(session.search("").unwrap(), None);
        assert!(session.overlays().is_empty());
    }

    #[test]
    fn attachments_are_written_to_disk() {
        let provider = MemoryProvider::new();
        let mut pdf = MemoryPdf::with_pages(1);
        pdf.attachments.push(("notes.txt".into(), b"hello".to_vec()));
        provider.insert(PATH, pdf);
        let mut session = Session::new(Arc::new(provider));
        session.open(Path::new(PATH), None).unwrap();

        let files = session.embedded_files().unwrap();
        assert_eq!(files[0].length, 5);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("notes.txt");
        assert_eq!(session.save_attachment("notes.txt", &dest).unwrap(), 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert!(matches!(
            session.save_attachment("missing", &dest),
            Err(Error::Attachment { .. })
        ));
    }
}
