//! Paints overlays onto a copy of the page raster before it is sent to the
//! terminal. All rectangles are in canvas pixels.

use pdfview_core::{Overlay, OverlayKind, Point, Raster, Rect, ViewerConfig};

use crate::layout::CropRegion;

const PAPER: [u8; 4] = [255, 255, 255, 255];
const MARKER_RADIUS: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub link: [u8; 3],
    pub highlight: [u8; 3],
    pub selection: [u8; 3],
}

impl Palette {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            link: config.link_color,
            highlight: config.highlight_color,
            selection: [70, 130, 230],
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

/// What goes on top of the page.
#[derive(Debug, Default)]
pub struct Decorations<'a> {
    pub overlays: &'a [Overlay],
    /// Position of the hovered link among the link overlays, which come in
    /// link-index order.
    pub hovered: Option<usize>,
    /// Rectangle of a drag in progress.
    pub selection: Option<Rect>,
    /// First corner of an annotation being placed.
    pub anchor: Option<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelRect {
    fn from_rect(rect: Rect, width: u32, height: u32) -> Option<Self> {
        if !rect.is_finite() {
            return None;
        }
        let rect = rect.normalized();
        let x0 = rect.x0.floor().clamp(0.0, width as f32) as u32;
        let y0 = rect.y0.floor().clamp(0.0, height as f32) as u32;
        let x1 = rect.x1.ceil().clamp(0.0, width as f32) as u32;
        let y1 = rect.y1.ceil().clamp(0.0, height as f32) as u32;
        (x1 > x0 && y1 > y0).then_some(Self { x0, y0, x1, y1 })
    }
}

pub fn compose(raster: &Raster, decorations: &Decorations<'_>, palette: &Palette) -> Raster {
    let mut image = raster.clone();
    let mut link_index = 0;
    for overlay in decorations.overlays {
        match overlay.kind {
            OverlayKind::SearchMatch => fill_rect(&mut image, overlay.rect, palette.highlight, 0.35),
            OverlayKind::Link => {
                let hovered = decorations.hovered == Some(link_index);
                link_index += 1;
                if hovered {
                    fill_rect(&mut image, overlay.rect, palette.link, 0.15);
                }
                stroke_rect(&mut image, overlay.rect, palette.link, if hovered { 2 } else { 1 });
            }
        }
    }
    if let Some(rect) = decorations.selection {
        fill_rect(&mut image, rect, palette.selection, 0.2);
        stroke_rect(&mut image, rect, palette.selection, 1);
    }
    if let Some(anchor) = decorations.anchor {
        draw_marker(&mut image, anchor, palette.selection);
    }
    image
}

/// Cuts `region` out of `raster`, padding the right and bottom edges with
/// paper colour up to whole cells.
pub fn crop_padded(raster: &Raster, region: &CropRegion) -> Raster {
    let width = region.padded_width as usize;
    let height = region.padded_height as usize;
    let mut pixels = PAPER.repeat(width * height);

    let stride = raster.width as usize * 4;
    let copy_width = region.width.min(raster.width.saturating_sub(region.x)) as usize;
    let copy_height = region.height.min(raster.height.saturating_sub(region.y)) as usize;
    for row in 0..copy_height.min(height) {
        let src = (region.y as usize + row) * stride + region.x as usize * 4;
        let dst = row * width * 4;
        let len = copy_width.min(width) * 4;
        pixels[dst..dst + len].copy_from_slice(&raster.pixels[src..src + len]);
    }

    Raster {
        width: region.padded_width,
        height: region.padded_height,
        pixels,
    }
}

fn fill_rect(image: &mut Raster, rect: Rect, color: [u8; 3], alpha: f32) {
    let Some(rect) = PixelRect::from_rect(rect, image.width, image.height) else {
        return;
    };
    let width = image.width as usize;
    for y in rect.y0..rect.y1 {
        let row_start = y as usize * width * 4;
        for x in rect.x0..rect.x1 {
            let idx = row_start + x as usize * 4;
            blend_pixel(&mut image.pixels[idx..idx + 4], color, alpha);
        }
    }
}

fn stroke_rect(image: &mut Raster, rect: Rect, color: [u8; 3], thickness: u32) {
    let Some(px) = PixelRect::from_rect(rect, image.width, image.height) else {
        return;
    };
    let t = thickness as f32;
    let (x0, y0, x1, y1) = (px.x0 as f32, px.y0 as f32, px.x1 as f32, px.y1 as f32);
    for edge in [
        Rect::new(x0, y0, x1, y0 + t),
        Rect::new(x0, y1 - t, x1, y1),
        Rect::new(x0, y0, x0 + t, y1),
        Rect::new(x1 - t, y0, x1, y1),
    ] {
        fill_rect(image, edge, color, 1.0);
    }
}

fn draw_marker(image: &mut Raster, at: Point, color: [u8; 3]) {
    let r = MARKER_RADIUS;
    fill_rect(image, Rect::new(at.x - r, at.y - 1.0, at.x + r, at.y + 1.0), color, 1.0);
    fill_rect(image, Rect::new(at.x - 1.0, at.y - r, at.x + 1.0, at.y + r), color, 1.0);
}

fn blend_pixel(pixel: &mut [u8], color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;
    for (channel, target) in pixel.iter_mut().zip(color) {
        *channel = (*channel as f32 * inv + target as f32 * alpha)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(width: u32, height: u32) -> Raster {
        Raster {
            width,
            height,
            pixels: vec![255; (width * height * 4) as usize],
        }
    }

    fn pixel(image: &Raster, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * image.width + x) * 4) as usize;
        [
            image.pixels[idx],
            image.pixels[idx + 1],
            image.pixels[idx + 2],
            image.pixels[idx + 3],
        ]
    }

    #[test]
    fn search_matches_are_tinted() {
        let overlays = [Overlay {
            kind: OverlayKind::SearchMatch,
            rect: Rect::new(2.0, 2.0, 4.0, 4.0),
            tooltip: "needle".into(),
        }];
        let palette = Palette {
            highlight: [255, 0, 0],
            ..Palette::default()
        };
        let decorations = Decorations {
            overlays: &overlays,
            ..Decorations::default()
        };
        let image = compose(&white(8, 8), &decorations, &palette);
        assert_eq!(pixel(&image, 3, 3), [255, 166, 166, 255]);
        assert_eq!(pixel(&image, 5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn links_are_outlined_not_filled() {
        let overlays = [Overlay {
            kind: OverlayKind::Link,
            rect: Rect::new(1.0, 1.0, 7.0, 7.0),
            tooltip: "Go to page 2".into(),
        }];
        let palette = Palette {
            link: [0, 0, 255],
            ..Palette::default()
        };
        let decorations = Decorations {
            overlays: &overlays,
            ..Decorations::default()
        };
        let image = compose(&white(8, 8), &decorations, &palette);
        assert_eq!(pixel(&image, 1, 1), [0, 0, 255, 255]);
        assert_eq!(pixel(&image, 4, 4), [255, 255, 255, 255]);
    }

    #[test]
    fn only_the_hovered_link_is_filled() {
        let link = |x0: f32| Overlay {
            kind: OverlayKind::Link,
            rect: Rect::new(x0, 1.0, x0 + 6.0, 7.0),
            tooltip: "Go to page 2".into(),
        };
        let overlays = [link(1.0), link(11.0)];
        let palette = Palette {
            link: [0, 0, 255],
            ..Palette::default()
        };
        let decorations = Decorations {
            overlays: &overlays,
            hovered: Some(1),
            ..Decorations::default()
        };
        let image = compose(&white(20, 8), &decorations, &palette);
        assert_eq!(pixel(&image, 4, 4), [255, 255, 255, 255]);
        assert_ne!(pixel(&image, 14, 4), [255, 255, 255, 255]);
    }

    #[test]
    fn overlays_outside_the_raster_are_clipped() {
        let overlays = [Overlay {
            kind: OverlayKind::SearchMatch,
            rect: Rect::new(-10.0, -10.0, 100.0, 1.0),
            tooltip: String::new(),
        }];
        let decorations = Decorations {
            overlays: &overlays,
            ..Decorations::default()
        };
        let image = compose(&white(4, 4), &decorations, &Palette::default());
        assert_eq!(image.pixels.len(), 64);
        assert_ne!(pixel(&image, 3, 0), [255, 255, 255, 255]);
        assert_eq!(pixel(&image, 3, 1), [255, 255, 255, 255]);
    }

    #[test]
    fn crop_pads_with_paper() {
        let mut source = white(4, 4);
        for chunk in source.pixels.chunks_mut(4) {
            chunk.copy_from_slice(&[0, 0, 0, 255]);
        }
        let region = CropRegion {
            x: 2,
            y: 1,
            width: 2,
            height: 3,
            padded_width: 3,
            padded_height: 4,
            params: crate::kitty::DrawParams::clamped(1, 1),
        };
        let cropped = crop_padded(&source, &region);
        assert_eq!((cropped.width, cropped.height), (3, 4));
        assert_eq!(pixel(&cropped, 1, 2), [0, 0, 0, 255]);
        assert_eq!(pixel(&cropped, 2, 0), PAPER);
        assert_eq!(pixel(&cropped, 0, 3), PAPER);
    }
}
