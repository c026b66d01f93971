//! Planar-to-pixel mapping.

use geo::{BoundingRect, Coord, Rect};

/// Maps planar coordinates into a pixel box, preserving aspect ratio and
/// flipping the y axis so north is up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    min: Coord<f64>,
    max_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Frame {
    /// Fits `bounds` into a `width` x `height` box inset by `margin` pixels
    /// on every side. The map is centered along the slack axis.
    #[must_use]
    pub fn fit(bounds: Rect<f64>, width: u32, height: u32, margin: u32) -> Self {
        let inner_w = f64::from(width.saturating_sub(2 * margin).max(1));
        let inner_h = f64::from(height.saturating_sub(2 * margin).max(1));

        let span_x = bounds.width();
        let span_y = bounds.height();

        let scale = match (span_x > 0.0, span_y > 0.0) {
            (true, true) => (inner_w / span_x).min(inner_h / span_y),
            (true, false) => inner_w / span_x,
            (false, true) => inner_h / span_y,
            (false, false) => 1.0,
        };

        let offset_x = (inner_w - span_x * scale).mul_add(0.5, f64::from(margin));
        let offset_y = (inner_h - span_y * scale).mul_add(0.5, f64::from(margin));

        Self {
            min: bounds.min(),
            max_y: bounds.max().y,
            scale,
            offset_x,
            offset_y,
        }
    }

    /// Moves the whole map `pixels` further down the image.
    #[must_use]
    pub fn shifted_down(mut self, pixels: u32) -> Self {
        self.offset_y += f64::from(pixels);
        self
    }

    /// Pixels per planar unit.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Pixel position of a planar coordinate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_pixel(&self, coord: Coord<f64>) -> (f32, f32) {
        let x = (coord.x - self.min.x).mul_add(self.scale, self.offset_x);
        let y = (self.max_y - coord.y).mul_add(self.scale, self.offset_y);
        (x as f32, y as f32)
    }
}

/// Bounding rectangle of every geometry, or `None` if all are empty.
#[must_use]
pub fn bounds_of<'a, G>(geometries: impl IntoIterator<Item = &'a G>) -> Option<Rect<f64>>
where
    G: BoundingRect<f64, Output = Option<Rect<f64>>> + 'a,
{
    geometries
        .into_iter()
        .filter_map(BoundingRect::bounding_rect)
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    #[test]
    fn corners_map_inside_margin() {
        let frame = Frame::fit(rect(0.0, 0.0, 100.0, 100.0), 120, 120, 10);
        assert_eq!(frame.to_pixel(Coord { x: 0.0, y: 100.0 }), (10.0, 10.0));
        assert_eq!(frame.to_pixel(Coord { x: 100.0, y: 0.0 }), (110.0, 110.0));
    }

    #[test]
    fn shifted_frame_moves_only_vertically() {
        let frame = Frame::fit(rect(0.0, 0.0, 100.0, 100.0), 120, 120, 10).shifted_down(30);
        assert_eq!(frame.to_pixel(Coord { x: 0.0, y: 100.0 }), (10.0, 40.0));
    }

    #[test]
    fn tall_bounds_are_centered_horizontally() {
        let frame = Frame::fit(rect(0.0, 0.0, 50.0, 100.0), 100, 100, 0);
        assert!((frame.scale() - 1.0).abs() < f64::EPSILON);
        assert_eq!(frame.to_pixel(Coord { x: 0.0, y: 0.0 }), (25.0, 100.0));
    }

    #[test]
    fn degenerate_bounds_do_not_divide_by_zero() {
        let frame = Frame::fit(rect(5.0, 5.0, 5.0, 5.0), 100, 100, 0);
        let (x, y) = frame.to_pixel(Coord { x: 5.0, y: 5.0 });
        assert!(x.is_finite() && y.is_finite());
    }

    #[test]
    fn union_of_bounds() {
        let a = MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]);
        let b = MultiPolygon(vec![polygon![(x: 5.0, y: -2.0), (x: 6.0, y: 0.0), (x: 5.0, y: 1.0)]]);
        let empty = MultiPolygon::<f64>(vec![]);
        assert_eq!(bounds_of([&a, &b, &empty]), Some(rect(0.0, -2.0, 6.0, 1.0)));
        assert_eq!(bounds_of([&empty]), None);
    }
}
