//! Self-contained interactive HTML map.
//!
//! Counties are drawn as SVG paths already projected into pixel space, so
//! the page needs no map library, tile server or network access. Hovering
//! a county shows its name and fire count.

use std::fmt::Write as _;
use std::path::Path;

use geo::{LineString, MultiPolygon};
use wildfire_map_geography_models::{CountyBoundary, CountyFireCount, Layer};

use crate::{
    RenderError, RenderOptions,
    color::{ColorScale, hex, ramp},
    ensure_parent,
    frame::{Frame, bounds_of},
};

const TEMPLATE: &str = include_str!("interactive.html");

/// Stops used for the CSS legend gradient.
const GRADIENT_STOPS: u32 = 9;

/// Writes a single HTML page with the county choropleth, a legend and hover
/// tooltips to `path`.
///
/// # Errors
///
/// * [`RenderError::CountMismatch`] if `counts` is not aligned with
///   `counties`.
/// * [`RenderError::EmptyGeometry`] if there are no counties.
/// * [`RenderError::Io`] if the file cannot be written.
pub fn export_interactive_map(
    counties: &Layer<CountyBoundary>,
    counts: &[CountyFireCount],
    path: &Path,
    options: &RenderOptions,
) -> Result<(), RenderError> {
    let html = interactive_html(counties, counts, options)?;

    ensure_parent(path)?;
    std::fs::write(path, html).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Interactive map saved to: {}", path.display());
    Ok(())
}

/// Builds the page written by [`export_interactive_map`].
///
/// # Errors
///
/// See [`export_interactive_map`].
pub fn interactive_html(
    counties: &Layer<CountyBoundary>,
    counts: &[CountyFireCount],
    options: &RenderOptions,
) -> Result<String, RenderError> {
    if counts.len() != counties.len() {
        return Err(RenderError::CountMismatch {
            counties: counties.len(),
            counts: counts.len(),
        });
    }
    let bounds = bounds_of(counties.iter().map(|c| &c.geometry))
        .ok_or(RenderError::EmptyGeometry { what: "counties" })?;

    let frame = Frame::fit(bounds, options.size, options.size, options.margin);
    let scale = ColorScale::from_counts(counts.iter().map(|row| row.count));

    let mut paths = String::new();
    for (county, row) in counties.iter().zip(counts) {
        let name = escape(&county.name);
        let _ = writeln!(
            paths,
            r#"<path d="{}" fill="{}" data-name="{name}" data-count="{count}"><title>{name}: {count}</title></path>"#,
            svg_path(&frame, &county.geometry),
            hex(scale.color(row.count)),
            count = row.count,
        );
    }

    let gradient = (0..GRADIENT_STOPS)
        .map(|i| hex(ramp(f64::from(i) / f64::from(GRADIENT_STOPS - 1))))
        .collect::<Vec<_>>()
        .join(", ");

    let size = options.size.to_string();
    Ok(fill_template(
        TEMPLATE,
        &[
            ("title", &escape(&options.title)),
            ("width", &size),
            ("height", &size),
            ("gradient", &gradient),
            ("min", &scale.min().to_string()),
            ("max", &scale.max().to_string()),
            ("paths", paths.trim_end()),
        ],
    ))
}

/// Replaces every `{{key}}` in `template` in a single pass, so substituted
/// text is never scanned for placeholders. Unknown keys are kept verbatim.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match values.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn svg_path(frame: &Frame, geometry: &MultiPolygon<f64>) -> String {
    let mut d = String::new();
    for polygon in geometry {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            append_ring(&mut d, frame, ring);
        }
    }
    d.trim_end().to_string()
}

fn append_ring(d: &mut String, frame: &Frame, ring: &LineString<f64>) {
    let mut coords = ring.coords();
    let Some(first) = coords.next() else {
        return;
    };
    let (x, y) = frame.to_pixel(*first);
    let _ = write!(d, "M{x:.1},{y:.1}");
    for coord in coords {
        let (x, y) = frame.to_pixel(*coord);
        let _ = write!(d, " L{x:.1},{y:.1}");
    }
    d.push_str(" Z ");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
