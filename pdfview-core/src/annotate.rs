//! Annotation placement and the mutate, save, reload protocol.
//!
//! A change is applied to the engine, persisted with an incremental save, and
//! the document is then reloaded from disk unconditionally. The in-memory
//! annotation list is never patched; it only ever reflects what a fresh load
//! enumerates, even when the save itself failed.

use tracing::{info, instrument, warn};

use crate::engine::{AnnotationInfo, AnnotationKind, AnnotationRecord, DocumentBackend, PageHandle};
use crate::error::{Error, Result};
use crate::geometry::{Point, Rect};
use crate::session::Session;

/// A fully placed annotation waiting for its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDraft {
    /// One-based page the annotation belongs to.
    pub page: usize,
    pub kind: AnnotationKind,
    /// Page space, normalized.
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementStep {
    NeedsAnotherPoint,
    Complete(AnnotationDraft),
}

/// Collects the page-space points that define a new annotation. Text
/// annotations take one point; the other kinds take two opposite corners.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    page: usize,
    kind: AnnotationKind,
    anchor: Option<Point>,
    icon_size: f32,
}

impl Placement {
    pub fn begin(kind: AnnotationKind, page: usize, icon_size: f32) -> Result<Self> {
        if !kind.is_creatable() {
            return Err(Error::Annotation(format!("cannot create {kind} annotations")));
        }
        Ok(Self {
            page,
            kind,
            anchor: None,
            icon_size,
        })
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    pub fn add_point(&mut self, point: Point) -> PlacementStep {
        if self.kind.is_point() {
            let rect = Rect::new(
                point.x,
                point.y,
                point.x + self.icon_size,
                point.y + self.icon_size,
            );
            return PlacementStep::Complete(self.draft(rect));
        }
        match self.anchor.take() {
            None => {
                self.anchor = Some(point);
                PlacementStep::NeedsAnotherPoint
            }
            Some(anchor) => PlacementStep::Complete(self.draft(Rect::from_corners(anchor, point))),
        }
    }

    /// Completes the placement from a dragged rectangle.
    pub fn complete_with_rect(&self, rect: Rect) -> AnnotationDraft {
        self.draft(rect.normalized())
    }

    fn draft(&self, rect: Rect) -> AnnotationDraft {
        AnnotationDraft {
            page: self.page,
            kind: self.kind.clone(),
            rect,
        }
    }
}

/// Position of `expected` among the live annotations. Prefers the recorded
/// position and falls back to the first equal record.
fn locate(live: &[AnnotationRecord], index: usize, expected: &AnnotationRecord) -> Result<usize> {
    if live.get(index) == Some(expected) {
        return Ok(index);
    }
    live.iter()
        .position(|record| record == expected)
        .ok_or(Error::AnnotationNotFound { index })
}

impl Session {
    /// Adds the drafted annotation, saves and reloads.
    #[instrument(skip(self, info), fields(kind = %draft.kind, page = draft.page))]
    pub fn commit_annotation(&mut self, draft: &AnnotationDraft, info: AnnotationInfo) -> Result<()> {
        let persisted = self.persist(draft.page, |backend, page| {
            backend.add_annotation(page, &draft.kind, draft.rect, &info)
        });
        self.finish_mutation(persisted)?;
        info!("annotation added");
        Ok(())
    }

    /// Deletes the first annotation under the screen `point` on the current
    /// page. Returns the removed record, or `None` when nothing was hit.
    #[instrument(skip(self))]
    pub fn delete_annotation_at(&mut self, point: Point) -> Result<Option<AnnotationRecord>> {
        let Some((index, record)) = self
            .annotation_at(point)
            .map(|(index, record)| (index, record.clone()))
        else {
            return Ok(None);
        };
        let page = self.current_page();
        let persisted = self.persist(page, |backend, handle| {
            let live = backend.annotations(handle)?;
            let position = locate(&live, index, &record)?;
            backend.delete_annotation(handle, position)
        });
        self.finish_mutation(persisted)?;
        info!(index, kind = %record.kind, "annotation deleted");
        Ok(Some(record))
    }

    fn persist<F>(&mut self, page: usize, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut dyn DocumentBackend, PageHandle) -> Result<()>,
    {
        let doc = self.document.as_mut().ok_or(Error::NoDocument)?;
        let path = doc.backend.info().path.clone();
        let handle = doc.backend.load_page(page.saturating_sub(1))?;
        mutate(&mut *doc.backend, handle)?;
        doc.backend.save_incremental(&path)
    }

    fn finish_mutation(&mut self, persisted: Result<()>) -> Result<()> {
        if let Err(err) = &persisted {
            warn!(%err, "annotation change failed, reloading from disk");
        }
        let reloaded = self.reload();
        if let Err(reload_err) = &reloaded {
            warn!(%reload_err, "reload failed, refreshing from the open document");
            if let Err(refresh_err) = self.refresh_page() {
                warn!(%refresh_err, "current page could not be refreshed");
            }
        }
        match (persisted, reloaded) {
            (Err(err), Err(reload_err)) => {
                warn!(%reload_err, "reload after failed annotation change also failed");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), reloaded) => reloaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::memory::{MemoryPdf, MemoryProvider};

    const PATH: &str = "/docs/notes.pdf";

    fn session_with(pdf: MemoryPdf) -> (MemoryProvider, Session) {
        let provider = MemoryProvider::new();
        provider.insert(PATH, pdf);
        let mut session = Session::new(Arc::new(provider.clone()));
        session.open(Path::new(PATH), None).unwrap();
        (provider, session)
    }

    fn record(kind: AnnotationKind, rect: Rect, name: &str) -> AnnotationRecord {
        AnnotationRecord {
            kind,
            info: AnnotationInfo {
                name: name.into(),
                ..AnnotationInfo::default()
            },
            rect,
        }
    }

    #[test]
    fn rectangle_corners_are_normalized() {
        let mut placement = Placement::begin(AnnotationKind::Rectangle, 1, 20.0).unwrap();
        assert_eq!(
            placement.add_point(Point::new(50.0, 40.0)),
            PlacementStep::NeedsAnotherPoint
        );
        assert_eq!(placement.anchor(), Some(Point::new(50.0, 40.0)));
        let PlacementStep::Complete(draft) = placement.add_point(Point::new(10.0, 5.0)) else {
            panic!("expected a complete draft");
        };
        assert_eq!(draft.rect, Rect::new(10.0, 5.0, 50.0, 40.0));
    }

    #[test]
    fn text_annotation_uses_icon_rectangle_at_click() {
        let mut placement = Placement::begin(AnnotationKind::Text, 2, 20.0).unwrap();
        let PlacementStep::Complete(draft) = placement.add_point(Point::new(30.0, 40.0)) else {
            panic!("text annotations take one point");
        };
        assert_eq!(draft.page, 2);
        assert_eq!(draft.rect, Rect::new(30.0, 40.0, 50.0, 60.0));
    }

    #[test]
    fn uncreatable_kinds_are_rejected() {
        let err = Placement::begin(AnnotationKind::Other("Ink".into()), 1, 20.0).unwrap_err();
        assert!(matches!(err, Error::Annotation(_)));
    }

    #[test]
    fn commit_persists_then_reloads() {
        let (provider, mut session) = session_with(MemoryPdf::with_pages(2));
        session.goto_page(2).unwrap();
        let draft = AnnotationDraft {
            page: 2,
            kind: AnnotationKind::Rectangle,
            rect: Rect::new(10.0, 10.0, 60.0, 40.0),
        };
        let info = AnnotationInfo {
            content: "check this".into(),
            ..AnnotationInfo::default()
        };
        session.commit_annotation(&draft, info).unwrap();

        assert_eq!(session.current_page(), 2);
        assert_eq!(session.annotations().len(), 1);
        assert_eq!(session.annotations()[0].info.content, "check this");
        let stored = provider.stored(Path::new(PATH)).unwrap();
        assert_eq!(stored.pages[1].annotations, session.annotations());
    }

    #[test]
    fn delete_removes_exactly_the_hit_annotation() {
        let mut pdf = MemoryPdf::with_pages(1);
        pdf.page_mut(1).annotations = vec![
            record(AnnotationKind::Rectangle, Rect::new(0.0, 0.0, 50.0, 50.0), "first"),
            record(AnnotationKind::Highlight, Rect::new(10.0, 10.0, 20.0, 20.0), "second"),
            record(AnnotationKind::Text, Rect::new(100.0, 100.0, 120.0, 120.0), "third"),
        ];
        let (provider, mut session) = session_with(pdf);
        let before = session.annotations().to_vec();

        // Zoom 2: screen (30, 30) is page (15, 15), inside "first" and "second".
        let removed = session.delete_annotation_at(Point::new(30.0, 30.0)).unwrap();
        assert_eq!(removed.unwrap().info.name, "first");

        let expected = vec![before[1].clone(), before[2].clone()];
        assert_eq!(session.annotations(), expected.as_slice());
        assert_eq!(
            provider.stored(Path::new(PATH)).unwrap().pages[0].annotations,
            expected
        );
    }

    #[test]
    fn delete_on_empty_space_is_a_no_op() {
        let (provider, mut session) = session_with(MemoryPdf::with_pages(1));
        let opens = provider.open_count();
        assert_eq!(session.delete_annotation_at(Point::new(5.0, 5.0)).unwrap(), None);
        assert_eq!(provider.open_count(), opens);
    }

    #[test]
    fn delete_is_disabled_while_rotated() {
        let mut pdf = MemoryPdf::with_pages(1);
        pdf.page_mut(1).annotations =
            vec![record(AnnotationKind::Rectangle, Rect::new(0.0, 0.0, 50.0, 50.0), "a")];
        let (_, mut session) = session_with(pdf);
        session.rotate_right().unwrap();
        assert_eq!(session.delete_annotation_at(Point::new(30.0, 30.0)).unwrap(), None);
        assert_eq!(session.annotations().len(), 1);
    }

    #[test]
    fn failed_save_still_reloads_from_disk() {
        let (provider, mut session) = session_with(MemoryPdf::with_pages(1));
        provider.fail_next_saves(1);
        let opens = provider.open_count();
        let draft = AnnotationDraft {
            page: 1,
            kind: AnnotationKind::FreeText,
            rect: Rect::new(10.0, 10.0, 60.0, 40.0),
        };

        let err = session
            .commit_annotation(&draft, AnnotationInfo::default())
            .unwrap_err();
        assert!(matches!(err, Error::Save { .. }));
        assert_eq!(provider.open_count(), opens + 1);
        assert!(session.annotations().is_empty());
    }

    #[test]
    fn failed_reload_after_save_keeps_session_usable() {
        let (provider, mut session) = session_with(MemoryPdf::with_pages(1));
        provider.fail_next_opens(1);
        let draft = AnnotationDraft {
            page: 1,
            kind: AnnotationKind::Rectangle,
            rect: Rect::new(10.0, 10.0, 60.0, 40.0),
        };

        let err = session
            .commit_annotation(&draft, AnnotationInfo::default())
            .unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
        assert_eq!(provider.stored(Path::new(PATH)).unwrap().pages[0].annotations.len(), 1);
        assert_eq!(session.annotations().len(), 1);
        assert_eq!(session.annotations()[0].rect, draft.rect);

        assert!(session.zoom_in().unwrap());
        assert!(session.rotate_right().unwrap());
        assert!(session.raster().is_some());
    }

    #[test]
    fn locate_falls_back_to_equal_record() {
        let a = record(AnnotationKind::Rectangle, Rect::new(0.0, 0.0, 1.0, 1.0), "a");
        let b = record(AnnotationKind::Rectangle, Rect::new(2.0, 2.0, 3.0, 3.0), "b");
        let live = vec![b.clone(), a.clone()];
        assert_eq!(locate(&live, 1, &a).unwrap(), 1);
        assert_eq!(locate(&live, 0, &a).unwrap(), 1);
        let missing = record(AnnotationKind::Text, Rect::new(9.0, 9.0, 10.0, 10.0), "c");
        assert!(matches!(
            locate(&live, 0, &missing),
            Err(Error::AnnotationNotFound { index: 0 })
        ));
    }
}
