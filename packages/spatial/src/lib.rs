#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fire-to-county attribution.
//!
//! Builds an R-tree over county envelopes, then resolves each fire event to
//! the counties whose polygon contains it. Points on a shared county line
//! touch both polygons; such an event is credited once, to the matching
//! county that comes first in the county table.

pub mod progress;

use std::sync::Arc;

use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;
use wildfire_map_geography_models::{CountyBoundary, CountyFireCount, Epsg, FireEvent, Layer};

use crate::progress::ProgressCallback;

/// Errors raised by [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// One of the layers has no features.
    #[error("{layer} layer is empty, nothing to aggregate")]
    EmptyInput {
        /// Which layer was empty (`"fires"` or `"counties"`).
        layer: &'static str,
    },

    /// The layers were not normalized to the same CRS.
    #[error("fire events are in {fires} but counties are in {counties}")]
    CrsMismatch {
        /// CRS of the fire layer.
        fires: Epsg,
        /// CRS of the county layer.
        counties: Epsg,
    },
}

/// A county polygon stored in the R-tree with its table position.
struct CountyEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for CountyEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over county polygons.
pub struct CountyIndex {
    tree: RTree<CountyEntry>,
}

impl CountyIndex {
    /// Indexes every county of `counties`.
    #[must_use]
    pub fn new(counties: &Layer<CountyBoundary>) -> Self {
        let entries = counties
            .iter()
            .enumerate()
            .map(|(position, county)| CountyEntry {
                position,
                envelope: compute_envelope(&county.geometry),
                polygon: county.geometry.clone(),
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Table positions of every county containing `point`, boundary
    /// included, in ascending order.
    #[must_use]
    pub fn containing(&self, point: &Point<f64>) -> Vec<usize> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        let mut positions: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(point))
            .map(|entry| entry.position)
            .collect();
        positions.sort_unstable();
        positions
    }

    /// Number of indexed counties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if no county is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// An event that fell inside more than one county.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousAssignment {
    /// Fire event identifier.
    pub event_id: String,
    /// Identifier of the county credited with the event.
    pub assigned: String,
    /// Identifiers of every matching county, in table order.
    pub candidates: Vec<String>,
}

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// One row per county, in county-table order.
    pub counts: Vec<CountyFireCount>,
    /// Identifiers of events outside every county.
    pub unassigned: Vec<String>,
    /// Events resolved by the tie-break.
    pub ambiguous: Vec<AmbiguousAssignment>,
}

impl Aggregation {
    /// Number of events credited to some county.
    #[must_use]
    pub fn assigned(&self) -> u64 {
        self.counts.iter().map(|row| row.count).sum()
    }
}

/// Counts fire events per county.
///
/// Both layers must share a CRS. Every county appears in the result, with
/// zero when nothing matched. Each event is credited to at most one row,
/// by table position, so rows sharing an identifier keep separate totals.
///
/// # Errors
///
/// * [`AggregateError::EmptyInput`] if either layer is empty.
/// * [`AggregateError::CrsMismatch`] if the layers' CRSs differ.
pub fn aggregate(
    fires: &Layer<FireEvent>,
    counties: &Layer<CountyBoundary>,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<Aggregation, AggregateError> {
    if fires.is_empty() {
        return Err(AggregateError::EmptyInput { layer: "fires" });
    }
    if counties.is_empty() {
        return Err(AggregateError::EmptyInput { layer: "counties" });
    }
    if fires.crs() != counties.crs() {
        return Err(AggregateError::CrsMismatch {
            fires: fires.crs(),
            counties: counties.crs(),
        });
    }

    let index = CountyIndex::new(counties);
    log::info!("Indexed {} counties for attribution", index.len());

    if let Some(p) = &progress {
        p.set_total(fires.len() as u64);
        p.set_message("Attributing fires to counties".to_string());
    }

    let county_id = |position: usize| counties.features()[position].id.clone();

    let mut tallies = vec![0_u64; counties.len()];
    let mut unassigned = Vec::new();
    let mut ambiguous = Vec::new();

    for event in fires {
        let matches = index.containing(&event.location);

        match matches.as_slice() {
            [] => unassigned.push(event.id.clone()),
            [first, rest @ ..] => {
                let winner = &counties.features()[*first];
                tallies[*first] += 1;

                if !rest.is_empty() {
                    log::debug!(
                        "Event {} lies in {} counties, credited to {}",
                        event.id,
                        matches.len(),
                        winner.id
                    );
                    ambiguous.push(AmbiguousAssignment {
                        event_id: event.id.clone(),
                        assigned: winner.id.clone(),
                        candidates: matches.iter().copied().map(county_id).collect(),
                    });
                }
            }
        }

        if let Some(p) = &progress {
            p.inc(1);
        }
    }

    let counts: Vec<CountyFireCount> = counties
        .iter()
        .zip(tallies)
        .map(|(county, count)| CountyFireCount {
            county_id: county.id.clone(),
            county_name: county.name.clone(),
            count,
        })
        .collect();

    let aggregation = Aggregation {
        counts,
        unassigned,
        ambiguous,
    };

    log::info!(
        "Attributed {} of {} fire events ({} outside every county, {} on shared boundaries)",
        aggregation.assigned(),
        fires.len(),
        aggregation.unassigned.len(),
        aggregation.ambiguous.len()
    );

    if let Some(p) = &progress {
        p.finish(format!("{} fires attributed", aggregation.assigned()));
    }

    Ok(aggregation)
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
