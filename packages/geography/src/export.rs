//! Processed-artifact export.
//!
//! Layers are written as `GeoJSON` feature collections carrying a layer
//! `name` and a named `crs` member, so [`crate::load::load_layer`] can read
//! them back without an override. Attributes are stored in sorted order
//! and features in layer order, which makes the output byte-identical for
//! identical input.

use std::path::Path;

use geojson::{Feature, FeatureCollection, JsonObject, feature::Id};
use wildfire_map_geography_models::GeometricTable;

use crate::ExportError;

/// Writes `table` to `path`, replacing any previous file and creating
/// parent directories as needed.
///
/// # Errors
///
/// Returns [`ExportError`] if the directory cannot be created, the layer
/// cannot be serialized, or the file cannot be written.
pub fn write_layer(
    table: &GeometricTable,
    path: &Path,
    layer_name: &str,
) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut json = to_geojson_string(table, layer_name).map_err(|source| {
        ExportError::Serialize {
            path: path.to_path_buf(),
            source,
        }
    })?;
    json.push('\n');

    std::fs::write(path, json).map_err(io_error)?;

    log::info!("Exported: {}", path.display());
    Ok(())
}

/// Serializes `table` as a pretty-printed feature collection.
///
/// # Errors
///
/// Returns the serializer error, which only occurs for non-string map keys
/// and therefore not for well-formed layers.
pub fn to_geojson_string(
    table: &GeometricTable,
    layer_name: &str,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&to_feature_collection(table, layer_name))
}

/// Builds the feature collection written by [`write_layer`].
#[must_use]
pub fn to_feature_collection(table: &GeometricTable, layer_name: &str) -> FeatureCollection {
    let features = table
        .iter()
        .map(|record| {
            let properties: JsonObject = record
                .attributes
                .iter()
                .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
                .collect();

            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&record.geometry))),
                id: record.id.clone().map(Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let mut foreign_members = JsonObject::new();
    foreign_members.insert("name".to_string(), serde_json::json!(layer_name));
    foreign_members.insert(
        "crs".to_string(),
        serde_json::json!({
            "type": "name",
            "properties": { "name": table.crs().urn() },
        }),
    );

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

#[cfg(test)]
mod tests {
    use geo::{Geometry, MultiPolygon, polygon};
    use wildfire_map_geography_models::{
        Attributes, CountyBoundary, Epsg, GeometricRecord, Layer, to_table,
    };

    use super::*;
    use crate::load::{load_layer, parse_layer};

    fn counties() -> Layer<CountyBoundary> {
        let square = polygon![
            (x: 0.0, y: 0.0), (x: 1000.0, y: 0.0), (x: 1000.0, y: 1000.0), (x: 0.0, y: 1000.0)
        ];
        Layer::new(
            Epsg::MAINE_EAST,
            vec![CountyBoundary {
                id: "York".to_string(),
                name: "York".to_string(),
                geometry: MultiPolygon(vec![square]),
            }],
        )
    }

    #[test]
    fn written_layer_loads_back_with_crs() {
        let table = to_table(&counties());
        let json = to_geojson_string(&table, "maine_counties").unwrap();
        let reloaded = parse_layer(&json, Path::new("counties.geojson"), None).unwrap();

        assert_eq!(reloaded.crs(), Epsg::MAINE_EAST);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.features()[0].attributes, table.features()[0].attributes);
        assert!(matches!(
            reloaded.features()[0].geometry,
            Geometry::MultiPolygon(_)
        ));
    }

    #[test]
    fn output_carries_layer_name() {
        let json = to_geojson_string(&to_table(&counties()), "maine_counties").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "maine_counties");
        assert_eq!(
            value["crs"]["properties"]["name"],
            "urn:ogc:def:crs:EPSG::2802"
        );
    }

    #[test]
    fn serialization_is_deterministic() {
        let mut attrs = Attributes::new();
        attrs.insert("b".to_string(), 2_i64.into());
        attrs.insert("a".to_string(), "x".into());
        let table = Layer::new(
            Epsg::WGS84,
            vec![GeometricRecord::new(geo::Point::new(1.5, 2.5).into(), attrs)],
        );
        let first = to_geojson_string(&table, "layer").unwrap();
        let second = to_geojson_string(&table.clone(), "layer").unwrap();
        assert_eq!(first, second);
        assert!(first.find("\"a\"").unwrap() < first.find("\"b\"").unwrap());
    }

    #[test]
    fn write_creates_directories_and_overwrites() {
        let dir = std::env::temp_dir().join(format!(
            "wildfire_map_export_test_{}",
            std::process::id()
        ));
        let path = dir.join("nested").join("maine_counties.geojson");
        let table = to_table(&counties());

        write_layer(&table, &path, "maine_counties").unwrap();
        let first = std::fs::read(&path).unwrap();
        write_layer(&table, &path, "maine_counties").unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);

        let reloaded = load_layer(&path, None).unwrap();
        assert_eq!(reloaded.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
