//! Screen, canvas and page-user coordinate spaces.
//!
//! Page-user space has its origin at the top-left corner of the unrotated
//! page with y growing downward, in PDF points. Screen space is page space
//! multiplied by the zoom factor. Canvas space is screen space shifted by the
//! scroll offset of the presentation layer.
//!
//! None of these conversions account for rotation; callers must check
//! [`is_upright`] before mapping pointer positions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Divides both coordinates. Not the same as scaling by the reciprocal:
    /// `1.0 / divisor` is rounded, which can push a border point inside.
    pub fn unscale(self, divisor: f32) -> Self {
        Self {
            x: self.x / divisor,
            y: self.y / divisor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Builds a rectangle from two opposite corners given in any order;
    /// `(x0, y0)` is always the min corner.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x0: a.x.min(b.x),
            y0: a.y.min(b.y),
            x1: a.x.max(b.x),
            y1: a.y.max(b.y),
        }
    }

    pub fn normalized(self) -> Self {
        Self::from_corners(Point::new(self.x0, self.y0), Point::new(self.x1, self.y1))
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// True when both rectangles are non-empty and share interior area.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Strict containment: points on the border never match.
    pub fn contains_strict(&self, point: Point) -> bool {
        self.x0 < point.x && point.x < self.x1 && self.y0 < point.y && point.y < self.y1
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            x0: self.x0 * factor,
            y0: self.y0 * factor,
            x1: self.x1 * factor,
            y1: self.y1 * factor,
        }
    }

    pub fn unscale(self, divisor: f32) -> Self {
        Self {
            x0: self.x0 / divisor,
            y0: self.y0 / divisor,
            x1: self.x1 / divisor,
            y1: self.y1 / divisor,
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

pub fn screen_to_page(point: Point, zoom: f32) -> Point {
    point.unscale(zoom)
}

pub fn screen_rect_to_page(rect: Rect, zoom: f32) -> Rect {
    rect.unscale(zoom)
}

pub fn page_to_screen(rect: Rect, zoom: f32) -> Rect {
    rect.scale(zoom)
}

pub fn screen_to_canvas(point: Point, scroll: Point) -> Point {
    Point::new(point.x + scroll.x, point.y + scroll.y)
}

/// Turns a drag gesture in canvas space into a min/max rectangle clamped to
/// the raster bounds.
pub fn clamp_drag(start: Point, end: Point, width: u32, height: u32) -> Rect {
    let rect = Rect::from_corners(start, end);
    let max_x = width as f32;
    let max_y = height as f32;
    Rect {
        x0: rect.x0.clamp(0.0, max_x),
        y0: rect.y0.clamp(0.0, max_y),
        x1: rect.x1.clamp(0.0, max_x),
        y1: rect.y1.clamp(0.0, max_y),
    }
}

pub fn normalize_rotation(rotation: i32) -> i32 {
    rotation.rem_euclid(360)
}

pub fn is_upright(rotation: i32) -> bool {
    normalize_rotation(rotation) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_corners_orders_min_and_max() {
        let rect = Rect::from_corners(Point::new(30.0, 5.0), Point::new(10.0, 25.0));
        assert_eq!(rect, Rect::new(10.0, 5.0, 30.0, 25.0));
    }

    #[test]
    fn contains_strict_rejects_border_points() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains_strict(Point::new(5.0, 5.0)));
        assert!(!rect.contains_strict(Point::new(0.0, 5.0)));
        assert!(!rect.contains_strict(Point::new(10.0, 5.0)));
        assert!(!rect.contains_strict(Point::new(5.0, 10.0)));
    }

    #[test]
    fn intersects_requires_shared_area() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(9.0, 9.0, 20.0, 20.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 20.0, 10.0)));
        assert!(!a.intersects(&Rect::new(2.0, 2.0, 2.0, 8.0)));
    }

    #[test]
    fn screen_and_page_space_round_trip_through_zoom() {
        let page = screen_to_page(Point::new(40.0, 20.0), 2.0);
        assert_eq!(page, Point::new(20.0, 10.0));
        let screen = page_to_screen(Rect::new(1.0, 2.0, 3.0, 4.0), 1.5);
        assert_eq!(screen, Rect::new(1.5, 3.0, 4.5, 6.0));
    }

    #[test]
    fn page_mapping_is_exact_at_odd_zooms() {
        // 2.0 plus three zoom steps; 1.0 / 3.5 is not representable.
        let zoom = 3.5;
        assert_eq!(screen_to_page(Point::new(10.5, 7.0), zoom), Point::new(3.0, 2.0));
        let rect = Rect::new(3.0, 3.0, 50.0, 50.0);
        assert!(!rect.contains_strict(screen_to_page(Point::new(10.5, 20.0), zoom)));
        assert_eq!(
            screen_rect_to_page(Rect::new(10.5, 10.5, 175.0, 175.0), zoom),
            Rect::new(3.0, 3.0, 50.0, 50.0)
        );
    }

    #[test]
    fn clamp_drag_stays_inside_raster() {
        let rect = clamp_drag(Point::new(120.0, -4.0), Point::new(-10.0, 50.0), 100, 40);
        assert_eq!(rect, Rect::new(0.0, 0.0, 100.0, 40.0));
    }

    #[test]
    fn rotation_is_upright_only_on_full_turns() {
        assert!(is_upright(0));
        assert!(is_upright(-720));
        assert!(is_upright(1080));
        assert!(!is_upright(-90));
        assert_eq!(normalize_rotation(-90), 270);
    }
}
