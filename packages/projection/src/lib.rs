#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate reference system normalization.
//!
//! Every layer is reprojected into one shared planar CRS before any
//! containment test. Transforms are resolved by GDAL from the EPSG
//! database. Normalizing a layer that is already in the target CRS returns
//! an identical copy.

pub mod registry;

use gdal::spatial_ref::CoordTransform;
use geo::{Coord, Geometry, MapCoords};
use thiserror::Error;
use wildfire_map_geography_models::{Epsg, GeometricRecord, GeometricTable, Layer};

pub use registry::spatial_ref;

/// Errors raised while reprojecting coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// The code is not in the EPSG database.
    #[error("unknown coordinate reference system {crs}")]
    UnknownCrs {
        /// The unresolved CRS.
        crs: Epsg,
    },

    /// The CRS is known but cannot be related to the others.
    #[error("no transform defined for {crs}: {reason}")]
    UndefinedTransform {
        /// The CRS lacking a transform.
        crs: Epsg,
        /// Why the transform is undefined.
        reason: String,
    },

    /// A coordinate fell outside the domain of a projection.
    #[error("coordinate ({x}, {y}) cannot be transformed from {from} to {to}")]
    OutOfDomain {
        /// Source CRS.
        from: Epsg,
        /// Target CRS.
        to: Epsg,
        /// Offending x (easting or longitude).
        x: f64,
        /// Offending y (northing or latitude).
        y: f64,
    },
}

/// A resolved transform between two CRSs.
pub struct Transformer {
    from: Epsg,
    to: Epsg,
    /// `None` when source and target are the same CRS.
    transform: Option<CoordTransform>,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    /// Resolves both CRSs and the operation between them.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if either CRS is unknown or no operation
    /// relates them.
    pub fn new(from: Epsg, to: Epsg) -> Result<Self, ProjectionError> {
        let source = spatial_ref(from)?;
        let target = spatial_ref(to)?;

        let transform = if from == to {
            None
        } else {
            let transform = CoordTransform::new(&source, &target).map_err(|e| {
                ProjectionError::UndefinedTransform {
                    crs: to,
                    reason: format!("no operation from {from}: {e}"),
                }
            })?;
            Some(transform)
        };

        Ok(Self {
            from,
            to,
            transform,
        })
    }

    /// Source CRS.
    #[must_use]
    pub const fn from(&self) -> Epsg {
        self.from
    }

    /// Target CRS.
    #[must_use]
    pub const fn to(&self) -> Epsg {
        self.to
    }

    /// Returns `true` when source and target are the same CRS.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.transform.is_none()
    }

    /// Transforms a single coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::OutOfDomain`] if the input or output is
    /// not finite or PROJ rejects the coordinate.
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        let Some(transform) = &self.transform else {
            return Ok(coord);
        };

        let out_of_domain = || ProjectionError::OutOfDomain {
            from: self.from,
            to: self.to,
            x: coord.x,
            y: coord.y,
        };

        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(out_of_domain());
        }

        let mut xs = [coord.x];
        let mut ys = [coord.y];
        let mut zs: [f64; 0] = [];
        transform
            .transform_coords(&mut xs, &mut ys, &mut zs)
            .map_err(|e| {
                log::trace!("{} -> {} rejected {coord:?}: {e}", self.from, self.to);
                out_of_domain()
            })?;

        if !xs[0].is_finite() || !ys[0].is_finite() {
            return Err(out_of_domain());
        }

        Ok(Coord { x: xs[0], y: ys[0] })
    }

    /// Transforms every coordinate of a geometry.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProjectionError::OutOfDomain`] encountered.
    pub fn transform(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, ProjectionError> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }
}

/// Returns `table` with every geometry expressed in `target`.
///
/// Attributes, feature ids and feature order are unchanged.
///
/// # Errors
///
/// Returns [`ProjectionError`] if either CRS cannot be resolved or any
/// coordinate falls outside the projection domain.
pub fn normalize(table: &GeometricTable, target: Epsg) -> Result<GeometricTable, ProjectionError> {
    let transformer = Transformer::new(table.crs(), target)?;

    if transformer.is_identity() {
        log::debug!("Layer already in {target}, nothing to reproject");
        return Ok(table.clone());
    }

    log::debug!(
        "Reprojecting {} features from {} to {target}",
        table.len(),
        table.crs()
    );

    let features = table
        .iter()
        .map(|record| {
            Ok(GeometricRecord {
                id: record.id.clone(),
                geometry: transformer.transform(&record.geometry)?,
                attributes: record.attributes.clone(),
            })
        })
        .collect::<Result<Vec<_>, ProjectionError>>()?;

    Ok(Layer::new(target, features))
}
