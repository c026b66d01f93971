#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map rendering.
//!
//! Produces the two static PNG maps (fire locations over the region, and a
//! county choropleth) and a single self-contained HTML page with an SVG
//! choropleth, legend and hover tooltips. Each output is written
//! independently; a failure in one does not affect the others.

pub mod color;
pub mod frame;
pub mod interactive;
pub mod static_map;
pub mod text;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use interactive::export_interactive_map;
pub use static_map::{render_choropleth, render_fire_locations};

/// Errors raised while producing one output.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Nothing to draw.
    #[error("{what} has no geometry to draw")]
    EmptyGeometry {
        /// Which layer was empty.
        what: &'static str,
    },

    /// The counts are not aligned one-to-one with the counties.
    #[error("{counts} counts for {counties} counties")]
    CountMismatch {
        /// Number of county features.
        counties: usize,
        /// Number of count rows.
        counts: usize,
    },

    /// The bundled label font could not be parsed.
    #[error("embedded label font is unreadable")]
    Font(#[source] ab_glyph::InvalidFont),

    /// Encoding the image failed.
    #[error("{}: failed to encode image", path.display())]
    Image {
        /// Destination path.
        path: PathBuf,
        /// Encoder error.
        source: image::ImageError,
    },

    /// Writing the output failed.
    #[error("{}: failed to write", path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Layout and labelling shared by every output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Edge length of the square map area in pixels.
    pub size: u32,
    /// Blank border around the map area in pixels.
    pub margin: u32,
    /// Radius of a fire marker in pixels.
    pub marker_radius: u32,
    /// Title drawn above the static maps and used as the page heading.
    pub title: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            size: 900,
            margin: 24,
            marker_radius: 3,
            title: String::new(),
        }
    }
}

/// Creates the parent directory of `path` if it is missing.
pub(crate) fn ensure_parent(path: &Path) -> Result<(), RenderError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(()),
    }
}
