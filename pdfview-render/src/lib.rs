//! Pdfium-backed implementation of the document engine contract, plus the
//! engine-neutral helpers it is built from.

#[cfg(feature = "pdf")]
mod pdfium;

#[cfg(feature = "pdf")]
pub use pdfium::PdfiumProvider;

use pdfview_core::{Rect, Word};

/// Converts a rectangle in PDF user space (origin bottom-left, y up) to the
/// top-left page space used by the viewer.
pub fn from_pdf_space(left: f32, bottom: f32, right: f32, top: f32, page_height: f32) -> Rect {
    Rect::new(left, page_height - top, right, page_height - bottom).normalized()
}

/// Inverse of [`from_pdf_space`]; returns `(left, bottom, right, top)`.
pub fn to_pdf_space(rect: Rect, page_height: f32) -> (f32, f32, f32, f32) {
    let rect = rect.normalized();
    (rect.x0, page_height - rect.y1, rect.x1, page_height - rect.y0)
}

/// Joins glyphs, in content order, into whitespace-separated words. A glyph
/// whose bottom edge jumps by more than half its height starts a new word
/// even without intervening whitespace.
pub fn assemble_words<I>(glyphs: I) -> Vec<Word>
where
    I: IntoIterator<Item = (char, Rect)>,
{
    let mut words = Vec::new();
    let mut text = String::new();
    let mut bounds: Option<Rect> = None;

    for (ch, rect) in glyphs {
        if ch.is_whitespace() || ch == '\0' {
            flush_word(&mut words, &mut text, &mut bounds);
            continue;
        }
        if let Some(current) = bounds {
            let jump = (rect.y1 - current.y1).abs();
            if jump > rect.height().max(current.height()) / 2.0 {
                flush_word(&mut words, &mut text, &mut bounds);
            }
        }
        text.push(ch);
        bounds = Some(match bounds {
            Some(current) => current.union(&rect),
            None => rect,
        });
    }
    flush_word(&mut words, &mut text, &mut bounds);
    words
}

fn flush_word(words: &mut Vec<Word>, text: &mut String, bounds: &mut Option<Rect>) {
    if let Some(rect) = bounds.take() {
        if !text.is_empty() {
            words.push(Word::new(rect, std::mem::take(text)));
        }
    }
    text.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(ch: char, x: f32, y: f32) -> (char, Rect) {
        (ch, Rect::new(x, y, x + 5.0, y + 10.0))
    }

    #[test]
    fn pdf_space_is_flipped_vertically() {
        let rect = from_pdf_space(10.0, 700.0, 60.0, 720.0, 792.0);
        assert_eq!(rect, Rect::new(10.0, 72.0, 60.0, 92.0));
        assert_eq!(to_pdf_space(rect, 792.0), (10.0, 700.0, 60.0, 720.0));
    }

    #[test]
    fn glyphs_split_on_whitespace() {
        let glyphs = vec![
            glyph('H', 0.0, 0.0),
            glyph('i', 5.0, 0.0),
            glyph(' ', 10.0, 0.0),
            glyph('y', 15.0, 0.0),
            glyph('o', 20.0, 0.0),
        ];
        let words = assemble_words(glyphs);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Hi");
        assert_eq!(words[0].rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(words[1].text, "yo");
        assert_eq!(words[1].baseline_y, 10.0);
    }

    #[test]
    fn line_change_without_space_starts_a_new_word() {
        let glyphs = vec![glyph('a', 0.0, 0.0), glyph('b', 0.0, 20.0)];
        let words = assemble_words(glyphs);
        assert_eq!(
            words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>(),
            ["a", "b"]
        );
    }

    #[test]
    fn blank_input_has_no_words() {
        assert!(assemble_words(vec![glyph(' ', 0.0, 0.0), glyph('\n', 5.0, 0.0)]).is_empty());
    }
}
