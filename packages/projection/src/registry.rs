//! Resolution of EPSG codes into GDAL spatial references.
//!
//! NAD83, NAD83(HARN) and WGS 84 agree to about a meter across the
//! continental US, far below county resolution, so PROJ's null or ballpark
//! operations between them are accepted. NAD27 needs grid shifts that are
//! not guaranteed to be installed, so its codes are rejected rather than
//! silently misplaced.

use gdal::spatial_ref::{AxisMappingStrategy, SpatialRef};
use wildfire_map_geography_models::Epsg;

use crate::ProjectionError;

/// Returns `true` for NAD27 geographic and projected codes.
#[must_use]
pub const fn is_nad27(crs: Epsg) -> bool {
    matches!(crs.code(), 4267 | 26701..=26799 | 32001..=32060)
}

/// Resolves an EPSG code to a spatial reference in longitude/latitude
/// (easting/northing) axis order.
///
/// # Errors
///
/// * [`ProjectionError::UndefinedTransform`] for NAD27-based codes.
/// * [`ProjectionError::UnknownCrs`] for codes missing from the EPSG
///   database.
pub fn spatial_ref(crs: Epsg) -> Result<SpatialRef, ProjectionError> {
    if is_nad27(crs) {
        return Err(ProjectionError::UndefinedTransform {
            crs,
            reason: "NAD27 datum shift grids are not available".to_string(),
        });
    }

    let mut srs = SpatialRef::from_epsg(crs.code()).map_err(|e| {
        log::debug!("EPSG lookup failed for {crs}: {e}");
        ProjectionError::UnknownCrs { crs }
    })?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    Ok(srs)
}
