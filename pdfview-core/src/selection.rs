//! Text selection and pointer hit-testing.

use crate::engine::{AnnotationRecord, LinkRecord, Word};
use crate::geometry::{is_upright, screen_to_page, Point, Rect};

/// Anything with a page-space rectangle that pointer positions can hit.
pub trait HitTarget {
    fn hit_rect(&self) -> Rect;
}

impl HitTarget for AnnotationRecord {
    fn hit_rect(&self) -> Rect {
        self.rect
    }
}

impl HitTarget for LinkRecord {
    fn hit_rect(&self) -> Rect {
        self.source_rect
    }
}

/// A run of selected words sharing one baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub baseline_y: f32,
    pub text: String,
}

/// Words intersecting `rect`, in reading order: by baseline, then left edge.
pub fn words_in_rect<'a>(rect: &Rect, words: &'a [Word]) -> Vec<&'a Word> {
    let mut selected: Vec<&Word> = words.iter().filter(|w| w.rect.intersects(rect)).collect();
    selected.sort_by(|a, b| {
        a.baseline_y
            .total_cmp(&b.baseline_y)
            .then(a.rect.x0.total_cmp(&b.rect.x0))
    });
    selected
}

/// Groups the words selected by `rect` into lines of identical baseline.
pub fn group_lines(rect: &Rect, words: &[Word]) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    for word in words_in_rect(rect, words) {
        match lines.last_mut() {
            Some(line) if line.baseline_y == word.baseline_y => {
                line.text.push(' ');
                line.text.push_str(&word.text);
            }
            _ => lines.push(TextLine {
                baseline_y: word.baseline_y,
                text: word.text.clone(),
            }),
        }
    }
    lines
}

/// Text covered by `rect`, one line per baseline joined with newlines.
pub fn resolve_text_selection(rect: &Rect, words: &[Word]) -> String {
    group_lines(rect, words)
        .into_iter()
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// First record, in insertion order, whose rectangle strictly contains the
/// screen `point` mapped to page space.
pub fn hit_test<'a, T: HitTarget>(point: Point, records: &'a [T], zoom: f32) -> Option<(usize, &'a T)> {
    let page_point = screen_to_page(point, zoom);
    records
        .iter()
        .enumerate()
        .find(|(_, record)| record.hit_rect().contains_strict(page_point))
}

/// Link under the screen `point` and its position in `links`. Links are
/// inert while the page is rotated.
pub fn resolve_link_hover(
    point: Point,
    links: &[LinkRecord],
    zoom: f32,
    rotation: i32,
) -> Option<(usize, &LinkRecord)> {
    if !is_upright(rotation) {
        return None;
    }
    hit_test(point, links, zoom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AnnotationInfo, AnnotationKind, LinkTarget};

    fn word(x0: f32, y0: f32, x1: f32, y1: f32, text: &str) -> Word {
        Word::new(Rect::new(x0, y0, x1, y1), text)
    }

    fn annotation(rect: Rect, name: &str) -> AnnotationRecord {
        AnnotationRecord {
            kind: AnnotationKind::Rectangle,
            info: AnnotationInfo {
                name: name.into(),
                ..AnnotationInfo::default()
            },
            rect,
        }
    }

    #[test]
    fn hello_world_selection_forms_one_line() {
        let words = vec![
            word(0.0, 0.0, 10.0, 10.0, "Hello"),
            word(12.0, 0.0, 20.0, 10.0, "World"),
        ];
        let lines = group_lines(&Rect::new(-1.0, -1.0, 25.0, 11.0), &words);
        assert_eq!(
            lines,
            vec![TextLine {
                baseline_y: 10.0,
                text: "Hello World".into()
            }]
        );
    }

    #[test]
    fn selection_is_sorted_into_reading_order() {
        let words = vec![
            word(40.0, 20.0, 60.0, 30.0, "line"),
            word(12.0, 0.0, 20.0, 10.0, "first"),
            word(0.0, 20.0, 30.0, 30.0, "second"),
            word(0.0, 0.0, 10.0, 10.0, "the"),
            word(200.0, 200.0, 210.0, 210.0, "outside"),
        ];
        let text = resolve_text_selection(&Rect::new(0.0, 0.0, 100.0, 40.0), &words);
        assert_eq!(text, "the first\nsecond line");
    }

    #[test]
    fn empty_selection_yields_empty_text() {
        let words = vec![word(0.0, 0.0, 10.0, 10.0, "far")];
        assert_eq!(resolve_text_selection(&Rect::new(50.0, 50.0, 60.0, 60.0), &words), "");
    }

    #[test]
    fn hit_test_is_strict_on_borders() {
        let records = vec![annotation(Rect::new(10.0, 10.0, 20.0, 20.0), "a")];
        assert!(hit_test(Point::new(10.0, 15.0), &records, 1.0).is_none());
        assert!(hit_test(Point::new(20.0, 15.0), &records, 1.0).is_none());
        assert!(hit_test(Point::new(15.0, 10.0), &records, 1.0).is_none());
        assert!(hit_test(Point::new(15.0, 15.0), &records, 1.0).is_some());
    }

    #[test]
    fn hit_test_returns_first_overlapping_record() {
        let records = vec![
            annotation(Rect::new(0.0, 0.0, 50.0, 50.0), "below"),
            annotation(Rect::new(10.0, 10.0, 20.0, 20.0), "on top"),
        ];
        let (index, record) = hit_test(Point::new(30.0, 30.0), &records, 2.0).unwrap();
        assert_eq!(index, 0);
        assert_eq!(record.info.name, "below");
    }

    #[test]
    fn hit_test_divides_by_zoom() {
        let records = vec![annotation(Rect::new(10.0, 10.0, 20.0, 20.0), "a")];
        assert!(hit_test(Point::new(15.0, 15.0), &records, 2.0).is_none());
        assert!(hit_test(Point::new(30.0, 30.0), &records, 2.0).is_some());
    }

    #[test]
    fn link_hover_is_disabled_while_rotated() {
        let links = vec![LinkRecord {
            source_rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            target: LinkTarget::GoToPage(3),
        }];
        let (index, hovered) = resolve_link_hover(Point::new(5.0, 5.0), &links, 1.0, 360).unwrap();
        assert_eq!(index, 0);
        assert_eq!(hovered.target, LinkTarget::GoToPage(3));
        assert!(resolve_link_hover(Point::new(5.0, 5.0), &links, 1.0, 90).is_none());
        assert!(resolve_link_hover(Point::new(5.0, 5.0), &links, 1.0, -180).is_none());
    }
}
