#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary and fire-point layer management.
//!
//! Reads `GeoJSON` datasets into [`GeometricTable`]s, reduces a national
//! boundary table to the single region of interest, subsets county
//! polygons to the attributes the aggregation needs, and writes those
//! boundary layers back out as processed artifacts so later runs can skip
//! re-deriving them.
//!
//! [`GeometricTable`]: wildfire_map_geography_models::GeometricTable

pub mod export;
pub mod extract;
pub mod load;

use std::path::PathBuf;

use thiserror::Error;
use wildfire_map_geography_models::CrsParseError;

/// Errors raised while reading an input dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file does not exist.
    #[error("{}: file not found", path.display())]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("{}: failed to read", path.display())]
    Io {
        /// Requested path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The contents are not valid `GeoJSON`.
    #[error("{}: invalid GeoJSON", path.display())]
    Parse {
        /// Requested path.
        path: PathBuf,
        /// Parser error.
        source: geojson::Error,
    },

    /// The document is valid `GeoJSON` but not a feature collection.
    #[error("{}: expected a FeatureCollection, found a bare {kind}", path.display())]
    UnsupportedDocument {
        /// Requested path.
        path: PathBuf,
        /// Kind of document found.
        kind: &'static str,
    },

    /// Neither embedded metadata nor an override names the CRS.
    #[error(
        "{}: no coordinate reference system metadata and no override given",
        path.display()
    )]
    MissingCrs {
        /// Requested path.
        path: PathBuf,
    },

    /// The embedded CRS could not be interpreted.
    #[error("{}: invalid coordinate reference system metadata", path.display())]
    InvalidCrs {
        /// Requested path.
        path: PathBuf,
        /// Parse failure.
        source: CrsParseError,
    },

    /// A feature's geometry could not be converted.
    #[error("{}: feature {index} has an unsupported geometry", path.display())]
    Geometry {
        /// Requested path.
        path: PathBuf,
        /// Position of the feature in the collection.
        index: usize,
        /// Conversion error.
        source: geojson::Error,
    },
}

/// Errors raised while deriving boundaries and fire events from raw tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// No record matched the configured region.
    #[error("no record with {field} = '{target}' in the boundary table")]
    RegionNotFound {
        /// Attribute compared.
        field: String,
        /// Value looked for.
        target: String,
    },

    /// More than one record matched the configured region.
    #[error("{matches} records with {field} = '{target}' in the boundary table, expected exactly one")]
    AmbiguousRegion {
        /// Attribute compared.
        field: String,
        /// Value looked for.
        target: String,
        /// Number of matching records.
        matches: usize,
    },

    /// A record lacks an attribute the extraction requires.
    #[error("record {index} has no '{field}' attribute")]
    MissingAttribute {
        /// Position of the record.
        index: usize,
        /// Missing attribute.
        field: String,
    },

    /// A record's geometry has the wrong type.
    #[error("record {index} has a {found} geometry, expected {expected}")]
    UnexpectedGeometry {
        /// Position of the record.
        index: usize,
        /// Required geometry type.
        expected: &'static str,
        /// Geometry type found.
        found: &'static str,
    },
}

/// Errors raised while writing a processed artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Creating the directory or writing the file failed.
    #[error("{}: failed to write", path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The layer could not be serialized.
    #[error("{}: failed to serialize", path.display())]
    Serialize {
        /// Destination path.
        path: PathBuf,
        /// Serializer error.
        source: serde_json::Error,
    },
}
