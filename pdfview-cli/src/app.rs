use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use arboard::Clipboard;
use crossterm::cursor;
use tracing::{debug, info, warn};
use url::Url;

use pdfview_core::{
    AnnotationInfo, Gesture, InputMode as ViewerMode, Outcome, Point, Rect, Session, Viewer,
    ViewerConfig,
};
use pdfview_tty::{
    compose, crop_padded, draw_annotation, draw_outline, write_status_line, CellPos, Decorations,
    EventMapper, InputMode, KittyRenderer, MetadataField, OutlineWindow, Palette, PromptKind,
    UiEvent, Viewport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    /// Only the status line changed.
    Status,
    Redraw,
    Quit,
}

enum OverlayState {
    None,
    Outline(OutlineWindow),
}

impl OverlayState {
    fn is_active(&self) -> bool {
        !matches!(self, OverlayState::None)
    }
}

/// Password prompt in progress for a document that refused to open.
struct PendingOpen {
    path: PathBuf,
    attempts: u32,
}

/// Metadata collected so far for a placed annotation.
struct MetadataForm {
    info: AnnotationInfo,
}

pub struct App {
    viewer: Viewer,
    mapper: EventMapper,
    viewport: Viewport,
    palette: Palette,
    max_password_attempts: u32,
    overlay: OverlayState,
    message: Option<String>,
    drag: Option<(Point, Point)>,
    metadata: Option<MetadataForm>,
    pending_open: Option<PendingOpen>,
    initial_page: Option<usize>,
    attachment_name: Option<String>,
    clipboard: Option<Clipboard>,
}

impl App {
    pub fn new(session: Session, config: &ViewerConfig, viewport: Viewport) -> Self {
        Self {
            viewer: Viewer::new(session, config),
            mapper: EventMapper::new(),
            viewport,
            palette: Palette::from_config(config),
            max_password_attempts: config.max_password_attempts,
            overlay: OverlayState::None,
            message: None,
            drag: None,
            metadata: None,
            pending_open: None,
            initial_page: None,
            attachment_name: None,
            clipboard: None,
        }
    }

    pub fn session(&self) -> &Session {
        self.viewer.session()
    }

    pub fn mapper_mut(&mut self) -> &mut EventMapper {
        &mut self.mapper
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Opens the document given on the command line; `page` is applied once
    /// it is loaded, which may be after a password prompt.
    pub fn open_initial(
        &mut self,
        path: PathBuf,
        password: Option<String>,
        page: Option<usize>,
    ) -> Result<LoopAction> {
        self.initial_page = page;
        self.open(path, password)
    }

    pub fn handle_event(&mut self, event: UiEvent) -> Result<LoopAction> {
        match event {
            UiEvent::Gesture(gesture) => self.dispatch(gesture),
            UiEvent::PageStep(step) => {
                let count = self.session().page_count();
                if count == 0 {
                    return Ok(LoopAction::Continue);
                }
                let current = self.session().current_page() as isize;
                let target = (current + step).clamp(1, count as isize) as usize;
                self.dispatch(Gesture::GotoPage(target))
            }
            UiEvent::GotoLastPage => {
                let count = self.session().page_count();
                self.dispatch(Gesture::GotoPage(count))
            }
            UiEvent::Pan { delta_x, delta_y } => {
                let moved = match self.viewer.session().raster() {
                    Some(raster) => self.viewport.pan(delta_x, delta_y, raster),
                    None => false,
                };
                Ok(if moved {
                    LoopAction::Redraw
                } else {
                    LoopAction::Continue
                })
            }
            UiEvent::Click(at) => self.pointer(at, Gesture::ClickAt),
            UiEvent::RightClick(at) => {
                self.drag = None;
                let point = self.canvas_point(at).unwrap_or_default();
                self.dispatch(Gesture::RightClickAt(point))
            }
            UiEvent::DeleteAt(at) => self.pointer(at, Gesture::DeleteAnnotationAt),
            UiEvent::Hover(at) => self.pointer(at, Gesture::HoverAt),
            UiEvent::DragMoved { from, to } => {
                if !self.session().is_upright() {
                    return Ok(LoopAction::Continue);
                }
                match (self.canvas_point(from), self.canvas_point(to)) {
                    (Some(start), Some(end)) => {
                        if self.drag.is_none() {
                            self.dispatch(Gesture::BeginDrag(start))?;
                        }
                        self.drag = Some((start, end));
                        Ok(LoopAction::Redraw)
                    }
                    _ => Ok(LoopAction::Continue),
                }
            }
            UiEvent::DragSelect { from, to } => {
                let last = self.drag.take();
                // Releasing outside the page ends the drag where it last was.
                let end = self.canvas_point(to).or(last.map(|(_, end)| end));
                let selecting = matches!(self.viewer.mode(), ViewerMode::Selecting { .. });
                match (self.canvas_point(from), end) {
                    (_, Some(end)) if selecting => self.dispatch(Gesture::EndDrag(end)),
                    (Some(start), Some(end)) => self.dispatch(Gesture::DragSelect { start, end }),
                    _ if last.is_some() => Ok(LoopAction::Redraw),
                    _ => Ok(LoopAction::Continue),
                }
            }
            UiEvent::OpenOutline => {
                if !self.session().is_loaded() {
                    return Ok(LoopAction::Continue);
                }
                let entries = self.session().outline().to_vec();
                let window = OutlineWindow::new(entries, self.session().current_page());
                self.overlay = OverlayState::Outline(window);
                self.mapper.set_mode(InputMode::Outline);
                Ok(LoopAction::Redraw)
            }
            UiEvent::CloseOverlay => Ok(self.close_overlay()),
            UiEvent::OutlineMoveSelection { delta } => match &mut self.overlay {
                OverlayState::Outline(window) => {
                    if window.move_selection(delta) {
                        Ok(LoopAction::Redraw)
                    } else {
                        Ok(LoopAction::Continue)
                    }
                }
                _ => Ok(LoopAction::Continue),
            },
            UiEvent::OutlineActivateSelection => {
                let target = match &self.overlay {
                    OverlayState::Outline(window) => {
                        window.selected_entry().map(|entry| entry.target_page)
                    }
                    OverlayState::None => None,
                };
                let Some(page) = target else {
                    return Ok(LoopAction::Continue);
                };
                self.close_overlay();
                self.dispatch(Gesture::JumpToOutlineEntry(page))?;
                Ok(LoopAction::Redraw)
            }
            UiEvent::BeginPrompt(_) | UiEvent::PromptChanged { .. } => Ok(LoopAction::Status),
            UiEvent::PromptSubmit { kind, text } => self.submit_prompt(kind, text),
            UiEvent::PromptCancel { kind } => self.cancel_prompt(kind),
            UiEvent::Resize => Ok(LoopAction::Redraw),
            UiEvent::Quit => Ok(LoopAction::Quit),
            UiEvent::None => Ok(LoopAction::Status),
        }
    }

    fn canvas_point(&mut self, at: CellPos) -> Option<Point> {
        if let Some(raster) = self.viewer.session().raster() {
            self.viewport.fit(raster);
        }
        self.viewport.cell_to_canvas(at.column, at.row)
    }

    fn pointer(&mut self, at: CellPos, gesture: fn(Point) -> Gesture) -> Result<LoopAction> {
        match self.canvas_point(at) {
            Some(point) => self.dispatch(gesture(point)),
            None => Ok(LoopAction::Continue),
        }
    }

    fn close_overlay(&mut self) -> LoopAction {
        if !self.overlay.is_active() {
            return LoopAction::Continue;
        }
        self.overlay = OverlayState::None;
        self.mapper.set_mode(InputMode::Normal);
        LoopAction::Redraw
    }

    /// Runs a gesture and turns the outcome into frontend effects. Errors of
    /// a loaded session are reported on the status line.
    fn dispatch(&mut self, gesture: Gesture) -> Result<LoopAction> {
        let page_before = self.session().current_page();
        let outcome = match self.viewer.dispatch(gesture) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, "gesture failed");
                self.message = Some(err.to_string());
                return Ok(LoopAction::Redraw);
            }
        };
        if self.session().current_page() != page_before {
            self.viewport.reset_scroll();
        }
        Ok(self.apply_outcome(outcome))
    }

    fn apply_outcome(&mut self, outcome: Outcome) -> LoopAction {
        match outcome {
            Outcome::Unchanged => LoopAction::Continue,
            Outcome::Redraw | Outcome::ShowAnnotation(_) => LoopAction::Redraw,
            Outcome::CopyText(text) => {
                self.message = Some(match self.copy_to_clipboard(&text) {
                    Ok(()) => format!("copied {} characters", text.chars().count()),
                    Err(err) => err.to_string(),
                });
                LoopAction::Redraw
            }
            Outcome::OpenUri(uri) => {
                self.message = Some(match open_uri(&uri) {
                    Ok(()) => format!("opened {uri}"),
                    Err(err) => err.to_string(),
                });
                LoopAction::Status
            }
            Outcome::PromptMetadata(draft) => {
                info!(kind = %draft.kind, page = draft.page, "collecting annotation metadata");
                self.metadata = Some(MetadataForm {
                    info: AnnotationInfo::default(),
                });
                self.message = Some(format!("new {} annotation on page {}", draft.kind, draft.page));
                self.mapper
                    .begin_prompt(PromptKind::AnnotationField(MetadataField::FIRST), "");
                LoopAction::Redraw
            }
            Outcome::AttachmentSaved { dest, bytes } => {
                self.message = Some(format!("saved {bytes} bytes to {}", dest.display()));
                LoopAction::Status
            }
            Outcome::NoMatches(query) => {
                self.message = Some(format!("no matches for {query:?}"));
                LoopAction::Redraw
            }
        }
    }

    fn submit_prompt(&mut self, kind: PromptKind, text: String) -> Result<LoopAction> {
        match kind {
            PromptKind::Search => self.dispatch(Gesture::Search(text)),
            PromptKind::OpenFile => {
                let path = text.trim();
                if path.is_empty() {
                    return Ok(LoopAction::Status);
                }
                self.open(PathBuf::from(path), None)
            }
            PromptKind::Password => {
                let Some(path) = self.pending_open.as_ref().map(|pending| pending.path.clone())
                else {
                    return Ok(LoopAction::Status);
                };
                self.open(path, Some(text))
            }
            PromptKind::GotoPage => match text.trim().parse::<usize>() {
                Ok(page) => self.dispatch(Gesture::GotoPage(page)),
                Err(_) => {
                    self.message = Some(format!("{text:?} is not a page number"));
                    Ok(LoopAction::Status)
                }
            },
            PromptKind::AnnotationField(field) => {
                let Some(form) = self.metadata.as_mut() else {
                    return Ok(LoopAction::Status);
                };
                field.apply(&mut form.info, text);
                if let Some(next) = field.next() {
                    self.mapper
                        .begin_prompt(PromptKind::AnnotationField(next), "");
                    return Ok(LoopAction::Status);
                }
                let info = self
                    .metadata
                    .take()
                    .map(|form| form.info)
                    .unwrap_or_default();
                self.message = None;
                self.dispatch(Gesture::SubmitMetadata(info))
            }
            PromptKind::AttachmentName => {
                let name = text.trim();
                if name.is_empty() {
                    self.message = Some(self.attachment_summary());
                    return Ok(LoopAction::Status);
                }
                self.attachment_name = Some(name.to_owned());
                let suggested = Path::new(name)
                    .file_name()
                    .map(|file| file.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.mapper
                    .begin_prompt(PromptKind::AttachmentDest, &suggested);
                Ok(LoopAction::Status)
            }
            PromptKind::AttachmentDest => {
                let Some(name) = self.attachment_name.take() else {
                    return Ok(LoopAction::Status);
                };
                let dest = text.trim();
                if dest.is_empty() {
                    return Ok(LoopAction::Status);
                }
                self.dispatch(Gesture::SaveAttachment {
                    name,
                    dest: PathBuf::from(dest),
                })
            }
        }
    }

    fn cancel_prompt(&mut self, kind: PromptKind) -> Result<LoopAction> {
        match kind {
            PromptKind::AnnotationField(_) => {
                self.metadata = None;
                self.message = None;
                self.dispatch(Gesture::CancelMetadata)
            }
            PromptKind::Password => {
                let pending = self.pending_open.take();
                if !self.session().is_loaded() {
                    let path = pending.map(|p| p.path).unwrap_or_default();
                    return Err(anyhow!("{} requires a password", path.display()));
                }
                Ok(LoopAction::Status)
            }
            PromptKind::AttachmentDest => {
                self.attachment_name = None;
                Ok(LoopAction::Status)
            }
            _ => Ok(LoopAction::Status),
        }
    }

    /// Opens `path`, prompting for a password while attempts remain. An
    /// error is fatal only when no document is loaded afterwards.
    fn open(&mut self, path: PathBuf, password: Option<String>) -> Result<LoopAction> {
        let attempted = password.is_some();
        let result = self.viewer.dispatch(Gesture::OpenFile {
            path: path.clone(),
            password,
        });
        match result {
            Ok(_) => {
                self.pending_open = None;
                self.overlay = OverlayState::None;
                self.drag = None;
                self.message = None;
                self.viewport.reset_scroll();
                if let Some(page) = self.initial_page.take() {
                    self.dispatch(Gesture::GotoPage(page))?;
                }
                Ok(LoopAction::Redraw)
            }
            Err(err) if err.is_auth() => {
                let previous = self
                    .pending_open
                    .take()
                    .filter(|pending| pending.path == path)
                    .map_or(0, |pending| pending.attempts);
                let attempts = previous + u32::from(attempted);
                if attempts >= self.max_password_attempts {
                    warn!(attempts, path = %path.display(), "giving up on password");
                    if !self.session().is_loaded() {
                        return Err(anyhow::Error::new(err));
                    }
                    self.message = Some(err.to_string());
                    return Ok(LoopAction::Redraw);
                }
                debug!(attempts, "asking for password");
                self.message = attempted.then(|| "wrong password".to_owned());
                self.pending_open = Some(PendingOpen { path, attempts });
                self.mapper.begin_prompt(PromptKind::Password, "");
                Ok(LoopAction::Redraw)
            }
            Err(err) if !self.session().is_loaded() => Err(anyhow::Error::new(err)),
            Err(err) => {
                warn!(%err, "open failed, keeping current document");
                self.message = Some(err.to_string());
                Ok(LoopAction::Redraw)
            }
        }
    }

    fn attachment_summary(&self) -> String {
        match self.session().embedded_files() {
            Ok(files) if files.is_empty() => "no attachments".to_owned(),
            Ok(files) => {
                let names: Vec<_> = files.iter().map(|file| file.name.as_str()).collect();
                format!("attachments: {}", names.join(", "))
            }
            Err(err) => err.to_string(),
        }
    }

    fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
        if self.clipboard.is_none() {
            self.clipboard =
                Some(Clipboard::new().map_err(|err| anyhow!("clipboard unavailable: {err}"))?);
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            clipboard
                .set_text(text.to_owned())
                .map_err(|err| anyhow!("copy failed: {err}"))?;
        }
        Ok(())
    }

    pub fn redraw<W: Write>(&mut self, renderer: &mut KittyRenderer<W>) -> Result<()> {
        renderer.begin_sync_update()?;
        renderer.clear_all()?;

        let session = self.viewer.session();
        match session.view() {
            Some(view) => {
                self.viewport.fit(view.raster());
                let anchor = match self.viewer.mode() {
                    ViewerMode::PlacingAnnotation(placement) => {
                        placement.anchor().map(|point| point.scale(session.zoom()))
                    }
                    _ => None,
                };
                let decorations = Decorations {
                    overlays: view.overlays(),
                    hovered: session.hovered_link_index(),
                    selection: self.drag.map(|(start, end)| Rect::from_corners(start, end)),
                    anchor,
                };
                let composed = compose(view.raster(), &decorations, &self.palette);
                let region = self.viewport.crop(&composed);
                let visible = crop_padded(&composed, &region);
                let writer = renderer.writer();
                crossterm::queue!(writer, cursor::MoveTo(self.viewport.origin_column(), 0))?;
                renderer.draw(&visible, region.params)?;
            }
            None => renderer.delete_image()?,
        }

        let columns = self.viewport.columns();
        let rows = self.viewport.image_rows();
        match &mut self.overlay {
            OverlayState::Outline(window) => {
                draw_outline(renderer.writer(), window, columns, rows)?;
            }
            OverlayState::None => {
                if let Some(popup) = session.active_popup() {
                    draw_annotation(renderer.writer(), &popup.record, columns, rows)?;
                }
            }
        }

        self.draw_status(renderer)?;
        renderer.end_sync_update()
    }

    pub fn draw_status<W: Write>(&self, renderer: &mut KittyRenderer<W>) -> Result<()> {
        let status = self.status_text();
        write_status_line(
            renderer.writer(),
            self.viewport.status_row(),
            self.viewport.columns(),
            &status,
        )?;
        Ok(())
    }

    pub fn status_text(&self) -> String {
        let session = self.session();
        let mut parts = Vec::new();
        if let Some(path) = session.path() {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("<unknown>");
            parts.push(name.to_owned());
            parts.push(format!(
                "page {}/{}",
                session.current_page(),
                session.page_count()
            ));
            parts.push(format!("{:.0}%", session.zoom() * 100.0));
            if session.rotation().rem_euclid(360) != 0 {
                parts.push(format!("{}°", session.rotation().rem_euclid(360)));
            }
            if let Some(query) = session.search_query() {
                parts.push(format!("/{query}"));
            }
        }
        match self.viewer.mode() {
            ViewerMode::PlacingAnnotation(placement) => {
                let step = if placement.kind().is_point() {
                    "click to place"
                } else if placement.anchor().is_some() {
                    "click the opposite corner"
                } else {
                    "click a corner or drag"
                };
                parts.push(format!("{}: {step}, right-click cancels", placement.kind()));
            }
            ViewerMode::Selecting { .. } => parts.push("selecting".to_owned()),
            ViewerMode::Idle | ViewerMode::AwaitingMetadata(_) => {}
        }
        if let Some(link) = session.hovered_link() {
            parts.push(link.target.to_string());
        }
        if let Some(message) = &self.message {
            parts.push(message.clone());
        }
        if let Some(pending) = self.mapper.pending_input() {
            parts.push(pending);
        }
        parts.join(" | ")
    }
}

/// Hands a link target to the platform opener after checking it parses as
/// a URL with a scheme browsers handle.
pub fn open_uri(uri: &str) -> Result<()> {
    let url = Url::parse(uri).map_err(|err| anyhow!("invalid link {uri:?}: {err}"))?;
    if !matches!(url.scheme(), "http" | "https" | "mailto" | "ftp") {
        return Err(anyhow!("refusing to open {} link", url.scheme()));
    }
    open::that(url.as_str()).map_err(|err| anyhow!("failed to open {url}: {err}"))?;
    Ok(())
}
