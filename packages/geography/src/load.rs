//! `GeoJSON` dataset loading.
//!
//! The CRS of a layer comes from the document's `crs` member (the
//! pre-RFC 7946 named-CRS form written by most GIS exports). A caller may
//! supply an override; without either the load fails rather than guessing.

use std::io::ErrorKind;
use std::path::Path;

use geojson::{GeoJson, JsonObject, feature::Id};
use wildfire_map_geography_models::{AttributeValue, Epsg, GeometricRecord, GeometricTable, Layer};

use crate::LoadError;

/// Reads a `GeoJSON` file into a [`GeometricTable`].
///
/// `crs_override` is used when the file carries no CRS metadata. When both
/// exist the override wins and a disagreement is logged.
///
/// # Errors
///
/// Returns [`LoadError`] if the file is missing or unreadable, is not a
/// feature collection, has no usable CRS, or contains an unconvertible
/// geometry.
pub fn load_layer(path: &Path, crs_override: Option<Epsg>) -> Result<GeometricTable, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let table = parse_layer(&contents, path, crs_override)?;
    log::info!(
        "Loaded {} features from {} ({})",
        table.len(),
        path.display(),
        table.crs()
    );
    Ok(table)
}

/// Parses `GeoJSON` text into a [`GeometricTable`]. `path` is only used in
/// diagnostics.
///
/// # Errors
///
/// See [`load_layer`].
pub fn parse_layer(
    contents: &str,
    path: &Path,
    crs_override: Option<Epsg>,
) -> Result<GeometricTable, LoadError> {
    let geojson: GeoJson = contents.parse().map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let (features, foreign_members) = match geojson {
        GeoJson::FeatureCollection(collection) => {
            (collection.features, collection.foreign_members)
        }
        GeoJson::Feature(feature) => {
            let foreign_members = feature.foreign_members.clone();
            (vec![feature], foreign_members)
        }
        GeoJson::Geometry(_) => {
            return Err(LoadError::UnsupportedDocument {
                path: path.to_path_buf(),
                kind: "Geometry",
            });
        }
    };

    let embedded = embedded_crs(foreign_members.as_ref())
        .transpose()
        .map_err(|source| LoadError::InvalidCrs {
            path: path.to_path_buf(),
            source,
        })?;

    let crs = match (embedded, crs_override) {
        (Some(embedded), Some(forced)) => {
            if embedded != forced {
                log::warn!(
                    "{}: declares {embedded} but {forced} was forced",
                    path.display()
                );
            }
            forced
        }
        (Some(crs), None) | (None, Some(crs)) => crs,
        (None, None) => {
            return Err(LoadError::MissingCrs {
                path: path.to_path_buf(),
            });
        }
    };

    let mut records = Vec::with_capacity(features.len());
    let mut skipped = 0usize;

    for (index, feature) in features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };

        let geometry =
            geo::Geometry::<f64>::try_from(geometry).map_err(|source| LoadError::Geometry {
                path: path.to_path_buf(),
                index,
                source,
            })?;

        let attributes = feature
            .properties
            .iter()
            .flatten()
            .map(|(key, value)| (key.clone(), AttributeValue::from(value)))
            .collect();

        let id = feature.id.map(|id| match id {
            Id::String(s) => s,
            Id::Number(n) => n.to_string(),
        });

        records.push(GeometricRecord {
            id,
            geometry,
            attributes,
        });
    }

    if skipped > 0 {
        log::warn!(
            "{}: skipped {skipped} features without geometry",
            path.display()
        );
    }

    Ok(Layer::new(crs, records))
}

/// Reads the named-CRS member of a feature collection.
///
/// Handles `{"type": "name", "properties": {"name": "EPSG:2802"}}` and the
/// older `{"type": "EPSG", "properties": {"code": 2802}}`. A `null` member
/// counts as absent.
fn embedded_crs(
    foreign_members: Option<&JsonObject>,
) -> Option<Result<Epsg, wildfire_map_geography_models::CrsParseError>> {
    let properties = foreign_members?.get("crs")?.get("properties")?;

    if let Some(name) = properties.get("name").and_then(serde_json::Value::as_str) {
        return Some(name.parse());
    }

    match properties.get("code")? {
        serde_json::Value::Number(code) => Some(code.to_string().parse()),
        serde_json::Value::String(code) => Some(code.parse()),
        _ => None,
    }
}
