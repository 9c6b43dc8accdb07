//! Per-page link index and overlay primitives.

use serde::Serialize;

use crate::engine::LinkRecord;
use crate::geometry::{page_to_screen, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverlayKind {
    Link,
    SearchMatch,
}

/// A drawable rectangle in screen space, on top of the raster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub kind: OverlayKind,
    pub rect: Rect,
    pub tooltip: String,
}

/// Links of the displayed page. Hit-testing uses the page-space rectangles;
/// the screen-space rectangles are only for drawing.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    records: Vec<LinkRecord>,
    screen_rects: Vec<Rect>,
}

impl LinkIndex {
    pub fn build(records: Vec<LinkRecord>, zoom: f32) -> Self {
        let screen_rects = records
            .iter()
            .map(|record| page_to_screen(record.source_rect, zoom))
            .collect();
        Self {
            records,
            screen_rects,
        }
    }

    pub fn records(&self) -> &[LinkRecord] {
        &self.records
    }

    pub fn overlays(&self) -> impl Iterator<Item = Overlay> + '_ {
        self.records
            .iter()
            .zip(&self.screen_rects)
            .map(|(record, rect)| Overlay {
                kind: OverlayKind::Link,
                rect: *rect,
                tooltip: record.target.to_string(),
            })
    }
}

pub fn search_overlays(matches: &[Rect], zoom: f32, query: &str) -> Vec<Overlay> {
    matches
        .iter()
        .map(|rect| Overlay {
            kind: OverlayKind::SearchMatch,
            rect: page_to_screen(*rect, zoom),
            tooltip: query.to_owned(),
        })
        .collect()
}
