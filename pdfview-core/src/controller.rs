//! Gesture dispatch.
//!
//! The presentation layer turns keys and mouse events into [`Gesture`]s and
//! hands them to [`Viewer::dispatch`]; the returned [`Outcome`] tells it what
//! to redraw or which side effect (clipboard, browser, prompt) to perform.
//! All interaction state lives in the single [`InputMode`] value.

use std::mem;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::annotate::{AnnotationDraft, Placement, PlacementStep};
use crate::config::ViewerConfig;
use crate::engine::{AnnotationInfo, AnnotationKind, AnnotationRecord, LinkTarget};
use crate::error::Result;
use crate::geometry::{screen_to_page, Point};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    OpenFile {
        path: PathBuf,
        password: Option<String>,
    },
    NextPage,
    PrevPage,
    /// One-based page number.
    GotoPage(usize),
    ZoomIn,
    ZoomOut,
    RotateLeft,
    RotateRight,
    BeginDrag(Point),
    EndDrag(Point),
    DragSelect {
        start: Point,
        end: Point,
    },
    HoverAt(Point),
    ClickAt(Point),
    RightClickAt(Point),
    PlaceAnnotationPoint(Point),
    ChooseAnnotationKind(AnnotationKind),
    SubmitMetadata(AnnotationInfo),
    CancelMetadata,
    DeleteAnnotationAt(Point),
    CloseAnnotationPopup,
    SaveAttachment {
        name: String,
        dest: PathBuf,
    },
    /// Target page of the chosen outline entry.
    JumpToOutlineEntry(usize),
    Search(String),
    SearchNext,
    SearchPrev,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputMode {
    #[default]
    Idle,
    /// A drag is in progress. With a placement it defines the annotation
    /// rectangle, otherwise it selects text.
    Selecting {
        start: Point,
        placement: Option<Placement>,
    },
    PlacingAnnotation(Placement),
    AwaitingMetadata(AnnotationDraft),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Unchanged,
    Redraw,
    CopyText(String),
    OpenUri(String),
    ShowAnnotation(AnnotationRecord),
    PromptMetadata(AnnotationDraft),
    AttachmentSaved { dest: PathBuf, bytes: usize },
    NoMatches(String),
}

impl Outcome {
    fn redraw_if(changed: bool) -> Self {
        if changed {
            Outcome::Redraw
        } else {
            Outcome::Unchanged
        }
    }
}

pub struct Viewer {
    session: Session,
    mode: InputMode,
    text_icon_size: f32,
}

impl Viewer {
    pub fn new(session: Session, config: &ViewerConfig) -> Self {
        Self {
            session,
            mode: InputMode::Idle,
            text_icon_size: config.text_icon_size,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn mode(&self) -> &InputMode {
        &self.mode
    }

    pub fn dispatch(&mut self, gesture: Gesture) -> Result<Outcome> {
        let mode = mem::take(&mut self.mode);
        match (mode, gesture) {
            (InputMode::AwaitingMetadata(draft), Gesture::SubmitMetadata(info)) => {
                self.session.commit_annotation(&draft, info)?;
                Ok(Outcome::Redraw)
            }
            (InputMode::AwaitingMetadata(_), Gesture::CancelMetadata | Gesture::RightClickAt(_)) => {
                info!("annotation cancelled");
                Ok(Outcome::Redraw)
            }
            (InputMode::AwaitingMetadata(draft), gesture) => {
                debug!(?gesture, "ignored while waiting for annotation metadata");
                self.mode = InputMode::AwaitingMetadata(draft);
                Ok(Outcome::Unchanged)
            }
            (InputMode::PlacingAnnotation(_), Gesture::RightClickAt(_))
            | (InputMode::Selecting { .. }, Gesture::RightClickAt(_)) => {
                info!("placement cancelled");
                Ok(Outcome::Redraw)
            }
            (
                InputMode::PlacingAnnotation(placement),
                Gesture::ClickAt(point) | Gesture::PlaceAnnotationPoint(point),
            ) => self.place(placement, point),
            (InputMode::PlacingAnnotation(placement), Gesture::BeginDrag(start)) => {
                self.begin_drag(start, Some(placement))
            }
            (InputMode::PlacingAnnotation(placement), Gesture::DragSelect { start, end }) => {
                self.finish_drag(start, end, Some(placement))
            }
            (InputMode::Selecting { start, placement }, Gesture::EndDrag(end)) => {
                self.finish_drag(start, end, placement)
            }
            (mode, Gesture::HoverAt(point)) => {
                self.mode = mode;
                Ok(Outcome::redraw_if(self.session.hover_at(point)))
            }
            (_, gesture) => self.handle(gesture),
        }
    }

    fn handle(&mut self, gesture: Gesture) -> Result<Outcome> {
        let session = &mut self.session;
        let outcome = match gesture {
            Gesture::OpenFile { path, password } => {
                session.open(&path, password.as_deref())?;
                Outcome::Redraw
            }
            Gesture::NextPage => Outcome::redraw_if(session.next_page()?),
            Gesture::PrevPage => Outcome::redraw_if(session.prev_page()?),
            Gesture::GotoPage(page) | Gesture::JumpToOutlineEntry(page) => {
                Outcome::redraw_if(session.goto_page(page)?)
            }
            Gesture::ZoomIn => Outcome::redraw_if(session.zoom_in()?),
            Gesture::ZoomOut => Outcome::redraw_if(session.zoom_out()?),
            Gesture::RotateLeft => Outcome::redraw_if(session.rotate_left()?),
            Gesture::RotateRight => Outcome::redraw_if(session.rotate_right()?),
            Gesture::BeginDrag(start) => return self.begin_drag(start, None),
            Gesture::DragSelect { start, end } => return self.finish_drag(start, end, None),
            Gesture::ClickAt(point) => return self.click(point),
            Gesture::RightClickAt(_) | Gesture::CloseAnnotationPopup => {
                Outcome::redraw_if(session.close_annotation_popup())
            }
            Gesture::ChooseAnnotationKind(kind) => return self.choose_kind(kind),
            Gesture::DeleteAnnotationAt(point) => {
                Outcome::redraw_if(session.delete_annotation_at(point)?.is_some())
            }
            Gesture::SaveAttachment { name, dest } => {
                let bytes = session.save_attachment(&name, &dest)?;
                Outcome::AttachmentSaved { dest, bytes }
            }
            Gesture::Search(query) => match session.search(&query)? {
                Some(_) => Outcome::Redraw,
                None if query.trim().is_empty() => Outcome::Redraw,
                None => Outcome::NoMatches(query),
            },
            Gesture::SearchNext => Outcome::redraw_if(session.search_next()?.is_some()),
            Gesture::SearchPrev => Outcome::redraw_if(session.search_prev()?.is_some()),
            Gesture::EndDrag(_)
            | Gesture::HoverAt(_)
            | Gesture::PlaceAnnotationPoint(_)
            | Gesture::SubmitMetadata(_)
            | Gesture::CancelMetadata => Outcome::Unchanged,
        };
        Ok(outcome)
    }

    fn begin_drag(&mut self, start: Point, placement: Option<Placement>) -> Result<Outcome> {
        if self.session.is_upright() && self.session.raster().is_some() {
            self.mode = InputMode::Selecting { start, placement };
        }
        Ok(Outcome::Unchanged)
    }

    fn finish_drag(
        &mut self,
        start: Point,
        end: Point,
        placement: Option<Placement>,
    ) -> Result<Outcome> {
        match placement {
            Some(placement) => {
                let Some(rect) = self.session.drag_to_page_rect(start, end) else {
                    return Ok(Outcome::Redraw);
                };
                if rect.is_empty() {
                    self.mode = InputMode::PlacingAnnotation(placement);
                    return Ok(Outcome::Unchanged);
                }
                let draft = placement.complete_with_rect(rect);
                self.mode = InputMode::AwaitingMetadata(draft.clone());
                Ok(Outcome::PromptMetadata(draft))
            }
            None => match self.session.select_text(start, end)? {
                Some(text) if !text.is_empty() => Ok(Outcome::CopyText(text)),
                _ => Ok(Outcome::Unchanged),
            },
        }
    }

    fn place(&mut self, mut placement: Placement, point: Point) -> Result<Outcome> {
        if !self.session.is_upright() {
            warn!("annotation placement abandoned on a rotated page");
            return Ok(Outcome::Redraw);
        }
        let page_point = screen_to_page(point, self.session.zoom());
        match placement.add_point(page_point) {
            PlacementStep::NeedsAnotherPoint => {
                self.mode = InputMode::PlacingAnnotation(placement);
                Ok(Outcome::Redraw)
            }
            PlacementStep::Complete(draft) => {
                self.mode = InputMode::AwaitingMetadata(draft.clone());
                Ok(Outcome::PromptMetadata(draft))
            }
        }
    }

    fn choose_kind(&mut self, kind: AnnotationKind) -> Result<Outcome> {
        let page = self.session.current_page();
        if page == 0 || !self.session.is_upright() {
            debug!(%kind, "annotation placement unavailable");
            return Ok(Outcome::Unchanged);
        }
        let placement = Placement::begin(kind, page, self.text_icon_size)?;
        self.mode = InputMode::PlacingAnnotation(placement);
        Ok(Outcome::Redraw)
    }

    /// Links win over annotations; a click on empty space closes any popup.
    fn click(&mut self, point: Point) -> Result<Outcome> {
        let target = self.session.link_at(point).map(|link| link.target.clone());
        match target {
            Some(LinkTarget::GoToPage(page)) => {
                info!(page, "following internal link");
                Ok(Outcome::redraw_if(self.session.goto_page(page)?))
            }
            Some(LinkTarget::ExternalUri(uri)) => Ok(Outcome::OpenUri(uri)),
            None => match self.session.open_annotation_popup(point) {
                Some(popup) => Ok(Outcome::ShowAnnotation(popup.record.clone())),
                None => Ok(Outcome::redraw_if(self.session.close_annotation_popup())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::engine::{LinkRecord, Word};
    use crate::geometry::Rect;
    use crate::memory::{MemoryPdf, MemoryProvider};

    const PATH: &str = "/docs/guide.pdf";

    fn viewer(pdf: MemoryPdf) -> (MemoryProvider, Viewer) {
        let provider = MemoryProvider::new();
        provider.insert(PATH, pdf);
        let mut session = Session::new(Arc::new(provider.clone()));
        session.open(Path::new(PATH), None).unwrap();
        (provider, Viewer::new(session, &ViewerConfig::default()))
    }

    fn linked_pdf() -> MemoryPdf {
        let mut pdf = MemoryPdf::with_pages(3);
        pdf.page_mut(1).links = vec![
            LinkRecord {
                source_rect: Rect::new(10.0, 10.0, 20.0, 20.0),
                target: LinkTarget::GoToPage(3),
            },
            LinkRecord {
                source_rect: Rect::new(100.0, 10.0, 150.0, 20.0),
                target: LinkTarget::ExternalUri("https://example.org".into()),
            },
        ];
        pdf
    }

    #[test]
    fn clicking_links_navigates_or_opens_uri() {
        let (_, mut viewer) = viewer(linked_pdf());
        let outcome = viewer.dispatch(Gesture::ClickAt(Point::new(250.0, 30.0))).unwrap();
        assert_eq!(outcome, Outcome::OpenUri("https://example.org".into()));

        let outcome = viewer.dispatch(Gesture::ClickAt(Point::new(30.0, 30.0))).unwrap();
        assert_eq!(outcome, Outcome::Redraw);
        assert_eq!(viewer.session().current_page(), 3);
    }

    #[test]
    fn drag_copies_selected_text() {
        let mut pdf = MemoryPdf::with_pages(1);
        pdf.page_mut(1).words = vec![
            Word::new(Rect::new(0.0, 0.0, 10.0, 10.0), "Hello"),
            Word::new(Rect::new(12.0, 0.0, 20.0, 10.0), "World"),
        ];
        let (_, mut viewer) = viewer(pdf);

        viewer.dispatch(Gesture::BeginDrag(Point::new(0.0, 0.0))).unwrap();
        assert!(matches!(viewer.mode(), InputMode::Selecting { placement: None, .. }));
        let outcome = viewer.dispatch(Gesture::EndDrag(Point::new(50.0, 22.0))).unwrap();
        assert_eq!(outcome, Outcome::CopyText("Hello World".into()));
        assert_eq!(viewer.mode(), &InputMode::Idle);
    }

    #[test]
    fn rectangle_annotation_takes_two_clicks_then_metadata() {
        let (provider, mut viewer) = viewer(MemoryPdf::with_pages(1));
        viewer
            .dispatch(Gesture::ChooseAnnotationKind(AnnotationKind::Rectangle))
            .unwrap();
        viewer.dispatch(Gesture::ClickAt(Point::new(100.0, 80.0))).unwrap();
        let outcome = viewer.dispatch(Gesture::ClickAt(Point::new(20.0, 20.0))).unwrap();

        let expected = AnnotationDraft {
            page: 1,
            kind: AnnotationKind::Rectangle,
            rect: Rect::new(10.0, 10.0, 50.0, 40.0),
        };
        assert_eq!(outcome, Outcome::PromptMetadata(expected.clone()));
        assert_eq!(viewer.mode(), &InputMode::AwaitingMetadata(expected));

        // Navigation is ignored while the prompt is open.
        assert_eq!(viewer.dispatch(Gesture::NextPage).unwrap(), Outcome::Unchanged);

        let info = AnnotationInfo {
            content: "box".into(),
            ..AnnotationInfo::default()
        };
        viewer.dispatch(Gesture::SubmitMetadata(info)).unwrap();
        assert_eq!(viewer.mode(), &InputMode::Idle);
        assert_eq!(viewer.session().annotations().len(), 1);
        assert_eq!(
            provider.stored(Path::new(PATH)).unwrap().pages[0].annotations[0].info.content,
            "box"
        );
    }

    #[test]
    fn highlight_can_be_dragged() {
        let (_, mut viewer) = viewer(MemoryPdf::with_pages(1));
        viewer
            .dispatch(Gesture::ChooseAnnotationKind(AnnotationKind::Highlight))
            .unwrap();
        let outcome = viewer
            .dispatch(Gesture::DragSelect {
                start: Point::new(40.0, 40.0),
                end: Point::new(0.0, 20.0),
            })
            .unwrap();
        let Outcome::PromptMetadata(draft) = outcome else {
            panic!("expected a metadata prompt");
        };
        assert_eq!(draft.kind, AnnotationKind::Highlight);
        assert_eq!(draft.rect, Rect::new(0.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn right_click_cancels_placement_without_side_effects() {
        let (provider, mut viewer) = viewer(MemoryPdf::with_pages(1));
        let opens = provider.open_count();
        viewer
            .dispatch(Gesture::ChooseAnnotationKind(AnnotationKind::Rectangle))
            .unwrap();
        viewer.dispatch(Gesture::ClickAt(Point::new(10.0, 10.0))).unwrap();
        viewer.dispatch(Gesture::RightClickAt(Point::new(10.0, 10.0))).unwrap();

        assert_eq!(viewer.mode(), &InputMode::Idle);
        assert_eq!(provider.open_count(), opens);
        assert!(viewer.session().annotations().is_empty());
    }

    #[test]
    fn cancelling_metadata_discards_the_draft() {
        let (provider, mut viewer) = viewer(MemoryPdf::with_pages(1));
        viewer
            .dispatch(Gesture::ChooseAnnotationKind(AnnotationKind::Text))
            .unwrap();
        let outcome = viewer.dispatch(Gesture::ClickAt(Point::new(10.0, 10.0))).unwrap();
        assert!(matches!(outcome, Outcome::PromptMetadata(_)));

        viewer.dispatch(Gesture::CancelMetadata).unwrap();
        assert_eq!(viewer.mode(), &InputMode::Idle);
        assert!(provider.stored(Path::new(PATH)).unwrap().pages[0]
            .annotations
            .is_empty());
    }

    #[test]
    fn clicking_an_annotation_shows_it_until_closed() {
        let mut pdf = MemoryPdf::with_pages(1);
        pdf.page_mut(1).annotations = vec![AnnotationRecord {
            kind: AnnotationKind::Text,
            info: AnnotationInfo {
                content: "remember".into(),
                ..AnnotationInfo::default()
            },
            rect: Rect::new(50.0, 50.0, 70.0, 70.0),
        }];
        let (_, mut viewer) = viewer(pdf);

        let outcome = viewer.dispatch(Gesture::ClickAt(Point::new(120.0, 120.0))).unwrap();
        let Outcome::ShowAnnotation(record) = outcome else {
            panic!("expected the annotation popup");
        };
        assert_eq!(record.info.content, "remember");
        assert!(viewer.session().active_popup().is_some());

        viewer.dispatch(Gesture::CloseAnnotationPopup).unwrap();
        assert!(viewer.session().active_popup().is_none());
    }

    #[test]
    fn placement_is_unavailable_while_rotated() {
        let (_, mut viewer) = viewer(MemoryPdf::with_pages(1));
        viewer.dispatch(Gesture::RotateRight).unwrap();
        let outcome = viewer
            .dispatch(Gesture::ChooseAnnotationKind(AnnotationKind::Rectangle))
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(viewer.mode(), &InputMode::Idle);
    }

    #[test]
    fn search_without_matches_reports_the_query() {
        let (_, mut viewer) = viewer(MemoryPdf::with_pages(2));
        let outcome = viewer.dispatch(Gesture::Search("absent".into())).unwrap();
        assert_eq!(outcome, Outcome::NoMatches("absent".into()));
    }
}
