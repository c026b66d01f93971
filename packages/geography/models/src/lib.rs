#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometric tables and the wildfire/county entities derived from them.
//!
//! Every stage of the pipeline takes a [`Layer`] and returns a new one; no
//! layer is mutated after construction. A layer pins all of its features
//! to a single coordinate reference system, so comparing two layers starts
//! with comparing their [`Epsg`] codes.

pub mod attribute;
pub mod crs;

use geo::{Geometry, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

pub use attribute::{AttributeValue, Attributes};
pub use crs::{CrsParseError, Epsg};

/// A raw row: geometry plus every source attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometricRecord {
    /// The `GeoJSON` feature `id` member, if any.
    pub id: Option<String>,
    /// Geometry in the owning layer's CRS.
    pub geometry: Geometry<f64>,
    /// Source properties.
    pub attributes: Attributes,
}

impl GeometricRecord {
    /// Creates a record without a feature id.
    #[must_use]
    pub const fn new(geometry: Geometry<f64>, attributes: Attributes) -> Self {
        Self {
            id: None,
            geometry,
            attributes,
        }
    }

    /// Looks up an attribute by name (see [`attribute::lookup`]).
    #[must_use]
    pub fn attribute(&self, field: &str) -> Option<&AttributeValue> {
        attribute::lookup(&self.attributes, field)
    }
}

/// An ordered collection of features sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer<T> {
    crs: Epsg,
    features: Vec<T>,
}

/// A layer of untyped records, as read from disk.
pub type GeometricTable = Layer<GeometricRecord>;

impl<T> Layer<T> {
    /// Creates a layer whose features are all expressed in `crs`.
    #[must_use]
    pub const fn new(crs: Epsg, features: Vec<T>) -> Self {
        Self { crs, features }
    }

    /// The CRS shared by every feature.
    #[must_use]
    pub const fn crs(&self) -> Epsg {
        self.crs
    }

    /// The features, in source order.
    #[must_use]
    pub fn features(&self) -> &[T] {
        &self.features
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns `true` if the layer holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates over the features.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.features.iter()
    }

    /// Consumes the layer, returning its features.
    #[must_use]
    pub fn into_features(self) -> Vec<T> {
        self.features
    }

    /// Builds a new layer in the same CRS from the features kept by `keep`.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&T) -> bool) -> Self
    where
        T: Clone,
    {
        Self {
            crs: self.crs,
            features: self.features.iter().filter(|f| keep(f)).cloned().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a Layer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// A single wildfire occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct FireEvent {
    /// Identifier from the source data (or the record ordinal).
    pub id: String,
    /// Fire year, when the source provides one.
    pub year: Option<i32>,
    /// Ignition location.
    pub location: Point<f64>,
    /// Every source attribute.
    pub attributes: Attributes,
}

/// A county polygon reduced to identifier, name and geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct CountyBoundary {
    /// County identifier (the name when the source has no separate id).
    pub id: String,
    /// Human-readable county name.
    pub name: String,
    /// County area.
    pub geometry: MultiPolygon<f64>,
}

/// The single area of interest (e.g. the state of Maine).
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBoundary {
    /// Region name as matched by the region filter.
    pub name: String,
    /// Region area.
    pub geometry: MultiPolygon<f64>,
    /// Source attributes of the matched record.
    pub attributes: Attributes,
}

/// Number of fire events credited to one county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyFireCount {
    /// County identifier.
    pub county_id: String,
    /// County name.
    pub county_name: String,
    /// Events whose location falls within the county.
    pub count: u64,
}

/// Attribute key under which county identifiers are exported.
pub const COUNTY_ID_FIELD: &str = "county_id";
/// Attribute key under which county names are exported.
pub const COUNTY_NAME_FIELD: &str = "name";

impl From<&CountyBoundary> for GeometricRecord {
    fn from(county: &CountyBoundary) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert(COUNTY_ID_FIELD.to_string(), county.id.as_str().into());
        attributes.insert(COUNTY_NAME_FIELD.to_string(), county.name.as_str().into());
        Self::new(Geometry::MultiPolygon(county.geometry.clone()), attributes)
    }
}

impl From<&RegionBoundary> for GeometricRecord {
    fn from(region: &RegionBoundary) -> Self {
        Self::new(
            Geometry::MultiPolygon(region.geometry.clone()),
            region.attributes.clone(),
        )
    }
}

impl From<&FireEvent> for GeometricRecord {
    fn from(event: &FireEvent) -> Self {
        Self {
            id: Some(event.id.clone()),
            geometry: Geometry::Point(event.location),
            attributes: event.attributes.clone(),
        }
    }
}

/// Converts a typed layer back into an untyped table in the same CRS.
#[must_use]
pub fn to_table<'a, T>(layer: &'a Layer<T>) -> GeometricTable
where
    GeometricRecord: From<&'a T>,
{
    Layer::new(
        layer.crs(),
        layer.iter().map(GeometricRecord::from).collect(),
    )
}

/// Promotes polygonal geometries to a [`MultiPolygon`].
///
/// Returns `None` for points, lines and collections.
#[must_use]
pub fn as_multi_polygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon(vec![r.to_polygon()])),
        _ => None,
    }
}

/// Short name of a geometry's type, for diagnostics.
#[must_use]
pub const fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
