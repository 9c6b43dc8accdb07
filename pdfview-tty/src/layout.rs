//! Placement of the page raster in the terminal grid.
//!
//! The raster is shown at its native pixel size. When it is larger than the
//! image area only a window of it is visible; `scroll` is the canvas
//! position of that window's top-left corner. Narrow pages are centred
//! horizontally. The last terminal row is reserved for the status line.

use pdfview_core::geometry::screen_to_canvas;
use pdfview_core::{Point, Raster};

use crate::kitty::DrawParams;

/// Used when the terminal does not report its pixel size.
pub const FALLBACK_CELL_WIDTH: f32 = 8.0;
pub const FALLBACK_CELL_HEIGHT: f32 = 16.0;

/// Portion of the raster to send to the terminal, and the cells it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Size after padding to whole cells, so the terminal does not rescale.
    pub padded_width: u32,
    pub padded_height: u32,
    pub params: DrawParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    columns: u16,
    image_rows: u16,
    cell_width: f32,
    cell_height: f32,
    scroll: Point,
    origin_column: u16,
}

impl Viewport {
    /// `pixel_width`/`pixel_height` are the window size in pixels, zero when
    /// unknown.
    pub fn new(columns: u16, rows: u16, pixel_width: u16, pixel_height: u16) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(2);
        let (cell_width, cell_height) = if pixel_width > 0 && pixel_height > 0 {
            (
                f32::from(pixel_width) / f32::from(columns),
                f32::from(pixel_height) / f32::from(rows),
            )
        } else {
            (FALLBACK_CELL_WIDTH, FALLBACK_CELL_HEIGHT)
        };
        Self {
            columns,
            image_rows: rows - 1,
            cell_width,
            cell_height,
            scroll: Point::default(),
            origin_column: 0,
        }
    }

    /// Adopts a new terminal size, keeping the scroll position.
    pub fn resize(&mut self, columns: u16, rows: u16, pixel_width: u16, pixel_height: u16) {
        let scroll = self.scroll;
        *self = Self::new(columns, rows, pixel_width, pixel_height);
        self.scroll = scroll;
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn image_rows(&self) -> u16 {
        self.image_rows
    }

    pub fn status_row(&self) -> u16 {
        self.image_rows
    }

    pub fn scroll(&self) -> Point {
        self.scroll
    }

    pub fn origin_column(&self) -> u16 {
        self.origin_column
    }

    /// Size of the image area in pixels.
    pub fn visible_size(&self) -> (f32, f32) {
        (
            f32::from(self.columns) * self.cell_width,
            f32::from(self.image_rows) * self.cell_height,
        )
    }

    pub fn reset_scroll(&mut self) {
        self.scroll = Point::default();
    }

    /// Clamps the scroll position to `raster` and recomputes centring.
    pub fn fit(&mut self, raster: &Raster) {
        let (visible_w, visible_h) = self.visible_size();
        let max_x = (raster.width as f32 - visible_w).max(0.0);
        let max_y = (raster.height as f32 - visible_h).max(0.0);
        self.scroll = Point::new(self.scroll.x.clamp(0.0, max_x), self.scroll.y.clamp(0.0, max_y));

        let used_columns = (raster.width as f32 / self.cell_width).ceil() as u16;
        self.origin_column = self.columns.saturating_sub(used_columns) / 2;
    }

    /// Scrolls by fractions of the visible area. Returns whether anything
    /// moved.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32, raster: &Raster) -> bool {
        let before = self.scroll;
        let (visible_w, visible_h) = self.visible_size();
        self.scroll = Point::new(
            self.scroll.x + delta_x * visible_w,
            self.scroll.y + delta_y * visible_h,
        );
        self.fit(raster);
        self.scroll != before
    }

    /// Canvas point at the centre of a terminal cell, `None` outside the
    /// image area.
    pub fn cell_to_canvas(&self, column: u16, row: u16) -> Option<Point> {
        if row >= self.image_rows || column < self.origin_column {
            return None;
        }
        let local = Point::new(
            (f32::from(column - self.origin_column) + 0.5) * self.cell_width,
            (f32::from(row) + 0.5) * self.cell_height,
        );
        Some(screen_to_canvas(local, self.scroll))
    }

    /// The visible window of `raster`. Call [`fit`](Self::fit) first.
    pub fn crop(&self, raster: &Raster) -> CropRegion {
        let (visible_w, visible_h) = self.visible_size();
        let x = self.scroll.x.round() as u32;
        let y = self.scroll.y.round() as u32;
        let width = raster.width.saturating_sub(x).min(visible_w.floor() as u32);
        let height = raster.height.saturating_sub(y).min(visible_h.floor() as u32);

        let columns = (width as f32 / self.cell_width).ceil().max(1.0) as u32;
        let rows = (height as f32 / self.cell_height).ceil().max(1.0) as u32;
        let columns = columns.min(u32::from(self.columns));
        let rows = rows.min(u32::from(self.image_rows));
        CropRegion {
            x,
            y,
            width,
            height,
            padded_width: ((columns as f32 * self.cell_width).round() as u32).max(width),
            padded_height: ((rows as f32 * self.cell_height).round() as u32).max(height),
            params: DrawParams::clamped(columns, rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(width: u32, height: u32) -> Raster {
        Raster {
            width,
            height,
            pixels: vec![255; (width * height * 4) as usize],
        }
    }

    #[test]
    fn unknown_pixel_size_uses_fallback_cells() {
        let viewport = Viewport::new(80, 25, 0, 0);
        assert_eq!(viewport.image_rows(), 24);
        assert_eq!(viewport.visible_size(), (640.0, 384.0));
    }

    #[test]
    fn cell_centres_map_into_canvas_space() {
        let mut viewport = Viewport::new(100, 41, 1000, 820);
        viewport.fit(&raster(2000, 2000));
        assert_eq!(viewport.cell_to_canvas(0, 0), Some(Point::new(5.0, 10.0)));
        assert_eq!(viewport.cell_to_canvas(3, 2), Some(Point::new(35.0, 50.0)));
        assert_eq!(viewport.cell_to_canvas(0, 40), None);

        viewport.pan(0.5, 0.0, &raster(2000, 2000));
        assert_eq!(viewport.cell_to_canvas(0, 0), Some(Point::new(505.0, 10.0)));
    }

    #[test]
    fn narrow_pages_are_centred() {
        let mut viewport = Viewport::new(100, 41, 1000, 820);
        viewport.fit(&raster(400, 2000));
        assert_eq!(viewport.origin_column(), 30);
        assert_eq!(viewport.cell_to_canvas(29, 0), None);
        assert_eq!(viewport.cell_to_canvas(30, 0), Some(Point::new(5.0, 10.0)));
    }

    #[test]
    fn pan_stops_at_raster_edges() {
        let page = raster(1500, 1000);
        let mut viewport = Viewport::new(100, 41, 1000, 820);
        viewport.fit(&page);
        assert!(!viewport.pan(-0.1, -0.1, &page));
        assert!(viewport.pan(5.0, 5.0, &page));
        assert_eq!(viewport.scroll(), Point::new(500.0, 200.0));
    }

    #[test]
    fn crop_is_padded_to_whole_cells() {
        let page = raster(1005, 300);
        let mut viewport = Viewport::new(100, 41, 1000, 820);
        viewport.fit(&page);
        let crop = viewport.crop(&page);
        assert_eq!((crop.width, crop.height), (1000, 300));
        assert_eq!(crop.params, DrawParams::clamped(100, 15));
        assert_eq!((crop.padded_width, crop.padded_height), (1000, 300));

        let small = raster(95, 25);
        viewport.fit(&small);
        let crop = viewport.crop(&small);
        assert_eq!(crop.params, DrawParams::clamped(10, 2));
        assert_eq!((crop.padded_width, crop.padded_height), (100, 40));
    }
}
