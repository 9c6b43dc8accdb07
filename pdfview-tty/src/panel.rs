//! Text panels drawn over the page: the outline browser, the annotation
//! popup and the status line.

use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    cursor,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};

use pdfview_core::{AnnotationRecord, OutlineEntry};

const MAX_INDENT_LEVELS: usize = 8;

/// Scrollable list over a flattened outline.
#[derive(Debug, Clone, Default)]
pub struct OutlineWindow {
    entries: Vec<OutlineEntry>,
    selected: usize,
    scroll_offset: usize,
}

impl OutlineWindow {
    /// Preselects the last entry that starts at or before `current_page`.
    pub fn new(entries: Vec<OutlineEntry>, current_page: usize) -> Self {
        let mut window = Self {
            entries,
            selected: 0,
            scroll_offset: 0,
        };
        window.select_page(current_page);
        window
    }

    pub fn selected_entry(&self) -> Option<&OutlineEntry> {
        self.entries.get(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let len = self.entries.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    fn select_page(&mut self, current_page: usize) {
        self.selected = self
            .entries
            .iter()
            .take_while(|entry| entry.target_page <= current_page)
            .count()
            .saturating_sub(1);
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.entries.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.entries.len().saturating_sub(viewport_height);
        self.scroll_offset = self.scroll_offset.min(max_offset);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + viewport_height {
            self.scroll_offset = self.selected + 1 - viewport_height;
        }
    }

    fn lines(&mut self, height: usize, width: usize) -> Vec<String> {
        if self.entries.is_empty() {
            return vec![truncate_with_ellipsis("  No outline available".to_owned(), width)];
        }
        self.ensure_visible(height);
        let end = (self.scroll_offset + height).min(self.entries.len());
        (self.scroll_offset..end)
            .map(|idx| format_outline_line(&self.entries[idx], idx == self.selected, width))
            .collect()
    }
}

fn outline_line_length(entry: &OutlineEntry) -> usize {
    let indent = entry.depth.saturating_sub(1).min(MAX_INDENT_LEVELS) * 2;
    2 + indent + entry.title.chars().count() + format!(" (p{})", entry.target_page).len()
}

fn format_outline_line(entry: &OutlineEntry, selected: bool, width: usize) -> String {
    let marker = if selected { '>' } else { ' ' };
    let indent = "  ".repeat(entry.depth.saturating_sub(1).min(MAX_INDENT_LEVELS));
    let text = format!("{marker} {indent}{} (p{})", entry.title, entry.target_page);
    truncate_with_ellipsis(text, width)
}

/// Lines of the popup shown for a clicked annotation.
pub fn annotation_lines(record: &AnnotationRecord) -> Vec<String> {
    let info = &record.info;
    let mut lines = Vec::new();
    for (label, value) in [
        ("Author", &info.title),
        ("Subject", &info.subject),
        ("Name", &info.name),
        ("Created", &info.creation_date),
        ("Modified", &info.mod_date),
    ] {
        if !value.is_empty() {
            lines.push(format!("{label}: {value}"));
        }
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    if info.content.is_empty() {
        lines.push("(no content)".to_owned());
    } else {
        lines.extend(info.content.lines().map(str::to_owned));
    }
    lines
}

pub fn draw_outline<W: Write>(
    writer: &mut W,
    outline: &mut OutlineWindow,
    total_cols: u16,
    image_rows: u16,
) -> Result<()> {
    let natural_width = outline
        .entries
        .iter()
        .map(outline_line_length)
        .max()
        .unwrap_or(24);
    let content_lines = outline.entries.len().max(1);
    let Some(frame) = Frame::fit("Outline", natural_width, content_lines, total_cols, image_rows)
    else {
        return Ok(());
    };
    let lines = outline.lines(frame.content_height, frame.inner_width);
    frame.draw(writer, &lines)
}

pub fn draw_annotation<W: Write>(
    writer: &mut W,
    record: &AnnotationRecord,
    total_cols: u16,
    image_rows: u16,
) -> Result<()> {
    let lines = annotation_lines(record);
    let natural_width = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
    let title = format!("{} annotation", record.kind);
    let Some(frame) = Frame::fit(&title, natural_width, lines.len(), total_cols, image_rows) else {
        return Ok(());
    };
    let shown: Vec<String> = lines
        .into_iter()
        .take(frame.content_height)
        .map(|line| truncate_with_ellipsis(line, frame.inner_width))
        .collect();
    frame.draw(writer, &shown)
}

/// Geometry of a bordered, centred box.
struct Frame {
    title: String,
    inner_width: usize,
    content_height: usize,
    start_col: u16,
    start_row: u16,
}

impl Frame {
    fn fit(
        title: &str,
        natural_width: usize,
        content_lines: usize,
        total_cols: u16,
        image_rows: u16,
    ) -> Option<Self> {
        if total_cols < 20 || image_rows < 6 {
            return None;
        }
        let max_inner_width = usize::from(total_cols).saturating_sub(6);
        let inner_width = natural_width
            .max(title.chars().count())
            .max(20)
            .min(max_inner_width);

        let max_content_height = usize::from(image_rows).saturating_sub(6);
        if max_content_height == 0 {
            return None;
        }
        let content_height = content_lines.clamp(1, max_content_height);

        let window_width = (inner_width + 2) as u16;
        let window_height = (content_height + 4) as u16;
        Some(Self {
            title: title.to_owned(),
            inner_width,
            content_height,
            start_col: total_cols.saturating_sub(window_width) / 2,
            start_row: image_rows.saturating_sub(window_height) / 2,
        })
    }

    fn draw<W: Write>(&self, writer: &mut W, lines: &[String]) -> Result<()> {
        let width = self.inner_width;
        let border = format!("+{}+", "-".repeat(width));
        let mut rows = Vec::with_capacity(self.content_height + 4);
        rows.push(border.clone());
        rows.push(format!("|{: ^width$}|", truncate_title(&self.title, width)));
        rows.push(format!("|{}|", "-".repeat(width)));
        for idx in 0..self.content_height {
            let content = lines
                .get(idx)
                .map(|line| truncate_with_ellipsis(line.clone(), width))
                .unwrap_or_else(|| " ".repeat(width));
            rows.push(format!("|{content}|"));
        }
        rows.push(border);

        for (offset, content) in rows.iter().enumerate() {
            let row = self.start_row.saturating_add(offset as u16);
            print_inverted(writer, self.start_col, row, content)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn truncate_title(title: &str, width: usize) -> String {
    title.chars().take(width).collect()
}

fn print_inverted(writer: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::queue!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

/// Pads or cuts `text` to exactly `width` characters.
pub fn truncate_with_ellipsis(text: String, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        if width <= 3 {
            return text.chars().take(width).collect();
        }
        let mut truncated: String = text.chars().take(width - 3).collect();
        truncated.push_str("...");
        return truncated;
    }
    let mut text = text;
    text.push_str(&" ".repeat(width - len));
    text
}

pub fn write_status_line<W: Write>(writer: &mut W, row: u16, width: u16, label: &str) -> io::Result<()> {
    let label: String = label.chars().take(usize::from(width)).collect();
    crossterm::queue!(
        writer,
        cursor::MoveTo(0, row),
        Clear(ClearType::CurrentLine),
        Print(label)
    )?;
    writer.flush()
}
