//! Static PNG maps.

use std::path::Path;

use ab_glyph::FontRef;
use geo::{LineString, MultiPolygon};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::{
    drawing::{
        draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut,
        draw_line_segment_mut, draw_polygon_mut,
    },
    point::Point,
    rect::Rect,
};
use wildfire_map_geography_models::{
    CountyBoundary, CountyFireCount, FireEvent, Layer, RegionBoundary,
};

use crate::{
    RenderError, RenderOptions,
    color::{ColorScale, ramp},
    ensure_parent,
    frame::{Frame, bounds_of},
    text::{draw_centered, draw_label, load_font, measure},
};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const OUTLINE: Rgb<u8> = Rgb([0, 0, 0]);
const LIGHT_GRAY: Rgb<u8> = Rgb([211, 211, 211]);
const FIRE: Rgb<u8> = Rgb([255, 0, 0]);

const LEGEND_WIDTH: u32 = 120;
const LEGEND_BAR_WIDTH: u32 = 24;
const LABEL_PX: f32 = 18.0;

/// Band above the map holding the title.
const TITLE_HEIGHT: u32 = 40;
const TITLE_PX: f32 = 24.0;

/// Draws the region filled light gray with a black outline and every fire
/// event as a red dot under the title, then writes a PNG to `path`.
///
/// # Errors
///
/// * [`RenderError::EmptyGeometry`] if the region has no geometry.
/// * [`RenderError::Font`] if the label font cannot be loaded.
/// * [`RenderError::Io`] or [`RenderError::Image`] if writing fails.
pub fn render_fire_locations(
    region: &Layer<RegionBoundary>,
    fires: &Layer<FireEvent>,
    path: &Path,
    options: &RenderOptions,
) -> Result<(), RenderError> {
    let bounds = bounds_of(region.iter().map(|r| &r.geometry))
        .ok_or(RenderError::EmptyGeometry { what: "region" })?;

    let font = load_font()?;
    let mut image =
        RgbImage::from_pixel(options.size, options.size + TITLE_HEIGHT, BACKGROUND);
    let frame =
        Frame::fit(bounds, options.size, options.size, options.margin).shifted_down(TITLE_HEIGHT);

    draw_title(&mut image, &font, &options.title);
    for boundary in region {
        fill_multi_polygon(&mut image, &frame, &boundary.geometry, LIGHT_GRAY);
        outline_multi_polygon(&mut image, &frame, &boundary.geometry);
    }

    let radius = i32::try_from(options.marker_radius).unwrap_or(i32::MAX);
    for event in fires {
        let (x, y) = frame.to_pixel(event.location.0);
        draw_filled_circle_mut(&mut image, (round(x), round(y)), radius, FIRE);
    }

    save_png(&image, path)
}

/// Fills each county by its fire count on a sequential red scale, outlines
/// it in black, and adds a legend bar labelled with the lowest and highest
/// count. `counts` must be aligned with `counties`.
///
/// # Errors
///
/// * [`RenderError::CountMismatch`] if the lengths differ.
/// * [`RenderError::EmptyGeometry`] if there are no counties.
/// * [`RenderError::Font`] if the label font cannot be loaded.
/// * [`RenderError::Io`] or [`RenderError::Image`] if writing fails.
pub fn render_choropleth(
    counties: &Layer<CountyBoundary>,
    counts: &[CountyFireCount],
    path: &Path,
    options: &RenderOptions,
) -> Result<(), RenderError> {
    if counts.len() != counties.len() {
        return Err(RenderError::CountMismatch {
            counties: counties.len(),
            counts: counts.len(),
        });
    }
    let bounds = bounds_of(counties.iter().map(|c| &c.geometry))
        .ok_or(RenderError::EmptyGeometry { what: "counties" })?;

    let scale = ColorScale::from_counts(counts.iter().map(|row| row.count));

    let font = load_font()?;
    let mut image = RgbImage::from_pixel(
        options.size + LEGEND_WIDTH,
        options.size + TITLE_HEIGHT,
        BACKGROUND,
    );
    let frame =
        Frame::fit(bounds, options.size, options.size, options.margin).shifted_down(TITLE_HEIGHT);

    draw_title(&mut image, &font, &options.title);
    for (county, row) in counties.iter().zip(counts) {
        fill_multi_polygon(&mut image, &frame, &county.geometry, Rgb(scale.color(row.count)));
    }
    for county in counties {
        outline_multi_polygon(&mut image, &frame, &county.geometry);
    }

    draw_legend(&mut image, &font, &scale, options);

    save_png(&image, path)
}

fn draw_title(image: &mut RgbImage, font: &FontRef<'_>, title: &str) {
    if title.is_empty() {
        return;
    }
    let (_, height) = measure(font, TITLE_PX, title);
    let y = TITLE_HEIGHT.saturating_sub(height) / 2;
    let width = image.width();
    draw_centered(image, font, TITLE_PX, width, to_i32(y), title, OUTLINE);
}

fn draw_legend(
    image: &mut RgbImage,
    font: &FontRef<'_>,
    scale: &ColorScale,
    options: &RenderOptions,
) {
    let max_label = scale.max().to_string();
    let min_label = scale.min().to_string();
    let (_, label_height) = measure(font, LABEL_PX, &max_label);

    let top = options.margin.max(label_height + 8);
    let height = options.size.saturating_sub(2 * top).max(2);
    let top = top + TITLE_HEIGHT;
    let left = options.size + 16;

    for offset in 0..height {
        let t = 1.0 - f64::from(offset) / f64::from(height - 1);
        draw_filled_rect_mut(
            image,
            Rect::at(to_i32(left), to_i32(top + offset)).of_size(LEGEND_BAR_WIDTH, 1),
            Rgb(ramp(t)),
        );
    }
    draw_hollow_rect_mut(
        image,
        Rect::at(to_i32(left), to_i32(top)).of_size(LEGEND_BAR_WIDTH, height),
        OUTLINE,
    );

    let label_x = to_i32(left + LEGEND_BAR_WIDTH + 8);
    draw_label(image, font, LABEL_PX, (label_x, to_i32(top)), &max_label, OUTLINE);
    draw_label(
        image,
        font,
        LABEL_PX,
        (
            label_x,
            to_i32((top + height).saturating_sub(label_height)),
        ),
        &min_label,
        OUTLINE,
    );
}

fn fill_multi_polygon(
    image: &mut RgbImage,
    frame: &Frame,
    geometry: &MultiPolygon<f64>,
    color: Rgb<u8>,
) {
    for polygon in geometry {
        if let Some(ring) = pixel_ring(frame, polygon.exterior()) {
            draw_polygon_mut(image, &ring, color);
        }
        for hole in polygon.interiors() {
            if let Some(ring) = pixel_ring(frame, hole) {
                draw_polygon_mut(image, &ring, BACKGROUND);
            }
        }
    }
}

fn outline_multi_polygon(image: &mut RgbImage, frame: &Frame, geometry: &MultiPolygon<f64>) {
    for polygon in geometry {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            for line in ring.lines() {
                draw_line_segment_mut(
                    image,
                    frame.to_pixel(line.start),
                    frame.to_pixel(line.end),
                    OUTLINE,
                );
            }
        }
    }
}

/// Integer pixel ring suitable for `draw_polygon_mut`: consecutive
/// duplicates removed and the closing point dropped. `None` when fewer than
/// three distinct points remain.
fn pixel_ring(frame: &Frame, ring: &LineString<f64>) -> Option<Vec<Point<i32>>> {
    let mut points: Vec<Point<i32>> = Vec::with_capacity(ring.0.len());
    for coord in ring.coords() {
        let (x, y) = frame.to_pixel(*coord);
        let point = Point::new(round(x), round(y));
        if points.last() != Some(&point) {
            points.push(point);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    (points.len() >= 3).then_some(points)
}

fn save_png(image: &RgbImage, path: &Path) -> Result<(), RenderError> {
    ensure_parent(path)?;
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| RenderError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    log::info!("Map saved to: {}", path.display());
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn round(value: f32) -> i32 {
    value.round() as i32
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
