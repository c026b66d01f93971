//! Derivation of typed layers from raw tables.
//!
//! * [`extract_region`] keeps the one record naming the area of interest.
//! * [`subset_counties`] projects county records down to id, name and
//!   geometry without dropping rows.
//! * [`fire_events`] turns point records into [`FireEvent`]s.

use std::collections::BTreeMap;

use geo::Geometry;
use wildfire_map_geography_models::{
    AttributeValue, CountyBoundary, FireEvent, GeometricRecord, GeometricTable, Layer,
    RegionBoundary, as_multi_polygon, geometry_kind,
};

use crate::ExtractError;

/// Attributes that identify and name a county.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyFields {
    /// Identifier attribute. When `None` the name doubles as identifier.
    pub id: Option<String>,
    /// Name attribute.
    pub name: String,
}

/// Attributes read from fire-event records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireFields {
    /// Identifier attribute. Falls back to the feature id, then the
    /// record ordinal.
    pub id: Option<String>,
    /// Year attribute.
    pub year: Option<String>,
}

/// Selects the single record whose `field` equals `target`.
///
/// # Errors
///
/// * [`ExtractError::RegionNotFound`] if nothing matches.
/// * [`ExtractError::AmbiguousRegion`] if more than one record matches.
/// * [`ExtractError::UnexpectedGeometry`] if the match is not polygonal.
pub fn extract_region(
    table: &GeometricTable,
    field: &str,
    target: &str,
) -> Result<Layer<RegionBoundary>, ExtractError> {
    let target = target.trim();

    let matches: Vec<(usize, &GeometricRecord)> = table
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            record
                .attribute(field)
                .and_then(AttributeValue::as_text)
                .is_some_and(|value| value == target)
        })
        .collect();

    let (index, record) = match matches.as_slice() {
        [] => {
            return Err(ExtractError::RegionNotFound {
                field: field.to_string(),
                target: target.to_string(),
            });
        }
        [single] => *single,
        many => {
            return Err(ExtractError::AmbiguousRegion {
                field: field.to_string(),
                target: target.to_string(),
                matches: many.len(),
            });
        }
    };

    let geometry = polygonal(index, &record.geometry)?;
    log::info!("Selected region '{target}' (record {index} of {})", table.len());

    Ok(Layer::new(
        table.crs(),
        vec![RegionBoundary {
            name: target.to_string(),
            geometry,
            attributes: record.attributes.clone(),
        }],
    ))
}

/// Reduces every county record to identifier, name and geometry.
///
/// Row count is preserved; attributes outside `fields` are dropped.
///
/// # Errors
///
/// * [`ExtractError::MissingAttribute`] if a record lacks the name (or the
///   configured identifier).
/// * [`ExtractError::UnexpectedGeometry`] if a record is not polygonal.
pub fn subset_counties(
    table: &GeometricTable,
    fields: &CountyFields,
) -> Result<Layer<CountyBoundary>, ExtractError> {
    let counties = table
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let name = required_text(index, record, &fields.name)?;
            let id = match &fields.id {
                Some(field) => required_text(index, record, field)?,
                None => name.clone(),
            };
            Ok(CountyBoundary {
                id,
                name,
                geometry: polygonal(index, &record.geometry)?,
            })
        })
        .collect::<Result<Vec<_>, ExtractError>>()?;

    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for county in &counties {
        *seen.entry(county.id.as_str()).or_default() += 1;
    }
    for (id, count) in seen.iter().filter(|(_, count)| **count > 1) {
        log::warn!("County identifier '{id}' appears on {count} records; each keeps its own count");
    }

    log::info!("Subset {} counties to identifier, name and geometry", counties.len());
    Ok(Layer::new(table.crs(), counties))
}

/// Converts point records into fire events.
///
/// Single-member multipoints are accepted as points.
///
/// # Errors
///
/// Returns [`ExtractError::UnexpectedGeometry`] for any other geometry.
pub fn fire_events(
    table: &GeometricTable,
    fields: &FireFields,
) -> Result<Layer<FireEvent>, ExtractError> {
    let events = table
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let location = match &record.geometry {
                Geometry::Point(point) => *point,
                Geometry::MultiPoint(multi) if multi.0.len() == 1 => multi.0[0],
                other => {
                    return Err(ExtractError::UnexpectedGeometry {
                        index,
                        expected: "Point",
                        found: geometry_kind(other),
                    });
                }
            };

            let id = fields
                .id
                .as_deref()
                .and_then(|field| record.attribute(field))
                .and_then(AttributeValue::as_text)
                .or_else(|| record.id.clone())
                .unwrap_or_else(|| index.to_string());

            let year = fields
                .year
                .as_deref()
                .and_then(|field| record.attribute(field))
                .and_then(AttributeValue::as_i64)
                .and_then(|y| i32::try_from(y).ok());

            Ok(FireEvent {
                id,
                year,
                location,
                attributes: record.attributes.clone(),
            })
        })
        .collect::<Result<Vec<_>, ExtractError>>()?;

    Ok(Layer::new(table.crs(), events))
}

/// Keeps the events of a single year. Events without a year are dropped.
#[must_use]
pub fn filter_year(events: &Layer<FireEvent>, year: i32) -> Layer<FireEvent> {
    let filtered = events.filtered(|event| event.year == Some(year));
    log::info!(
        "Kept {} of {} fire events from {year}",
        filtered.len(),
        events.len()
    );
    filtered
}

fn required_text(
    index: usize,
    record: &GeometricRecord,
    field: &str,
) -> Result<String, ExtractError> {
    record
        .attribute(field)
        .and_then(AttributeValue::as_text)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ExtractError::MissingAttribute {
            index,
            field: field.to_string(),
        })
}

fn polygonal(
    index: usize,
    geometry: &Geometry<f64>,
) -> Result<geo::MultiPolygon<f64>, ExtractError> {
    as_multi_polygon(geometry).ok_or_else(|| ExtractError::UnexpectedGeometry {
        index,
        expected: "Polygon or MultiPolygon",
        found: geometry_kind(geometry),
    })
}

#[cfg(test)]
mod tests {
    use geo::{MultiPoint, Point, polygon};
    use wildfire_map_geography_models::{Attributes, Epsg};

    use super::*;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn square(offset: f64) -> Geometry<f64> {
        polygon![
            (x: offset, y: 0.0),
            (x: offset + 1.0, y: 0.0),
            (x: offset + 1.0, y: 1.0),
            (x: offset, y: 1.0),
        ]
        .into()
    }

    fn states(names: &[&str]) -> GeometricTable {
        Layer::new(
            Epsg::MAINE_EAST,
            names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    #[allow(clippy::cast_precision_loss)]
                    let offset = i as f64 * 2.0;
                    GeometricRecord::new(
                        square(offset),
                        attrs(&[
                            ("NAME", (*name).into()),
                            ("CENSUSAREA", AttributeValue::Float(30_842.9)),
                        ]),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn region_filter_returns_single_match() {
        let region = extract_region(&states(&["Vermont", "Maine", "New Hampshire"]), "NAME", "Maine")
            .unwrap();
        assert_eq!(region.len(), 1);
        assert_eq!(region.crs(), Epsg::MAINE_EAST);
        assert_eq!(region.features()[0].name, "Maine");
        assert!(region.features()[0].attributes.contains_key("CENSUSAREA"));
    }

    #[test]
    fn region_filter_without_match_fails() {
        assert_eq!(
            extract_region(&states(&["Vermont"]), "NAME", "Maine"),
            Err(ExtractError::RegionNotFound {
                field: "NAME".to_string(),
                target: "Maine".to_string(),
            })
        );
    }

    #[test]
    fn region_filter_with_duplicates_fails() {
        assert!(matches!(
            extract_region(&states(&["Maine", "Maine"]), "NAME", "Maine"),
            Err(ExtractError::AmbiguousRegion { matches: 2, .. })
        ));
    }

    #[test]
    fn region_filter_matches_numeric_codes() {
        let table = Layer::new(
            Epsg::WGS84,
            vec![GeometricRecord::new(
                square(0.0),
                attrs(&[("STATE", AttributeValue::Integer(23))]),
            )],
        );
        assert!(extract_region(&table, "STATE", "23").is_ok());
    }

    #[test]
    fn county_subset_keeps_rows_and_drops_attributes() {
        let table = Layer::new(
            Epsg::MAINE_EAST,
            vec![
                GeometricRecord::new(
                    square(0.0),
                    attrs(&[("name", "York".into()), ("POP", AttributeValue::Integer(1))]),
                ),
                GeometricRecord::new(
                    square(2.0),
                    attrs(&[("name", "Oxford".into()), ("POP", AttributeValue::Integer(2))]),
                ),
            ],
        );
        let fields = CountyFields {
            id: None,
            name: "name".to_string(),
        };
        let counties = subset_counties(&table, &fields).unwrap();
        assert_eq!(counties.len(), 2);
        assert_eq!(counties.features()[1].id, "Oxford");
        assert_eq!(counties.features()[1].name, "Oxford");
    }

    #[test]
    fn county_subset_uses_configured_identifier() {
        let table = Layer::new(
            Epsg::MAINE_EAST,
            vec![GeometricRecord::new(
                square(0.0),
                attrs(&[("Name", "York".into()), ("FIPS", "23031".into())]),
            )],
        );
        let fields = CountyFields {
            id: Some("FIPS".to_string()),
            name: "name".to_string(),
        };
        let county = &subset_counties(&table, &fields).unwrap().into_features()[0];
        assert_eq!(county.id, "23031");
        assert_eq!(county.name, "York");
    }

    #[test]
    fn county_subset_requires_name() {
        let table = Layer::new(
            Epsg::MAINE_EAST,
            vec![GeometricRecord::new(square(0.0), Attributes::new())],
        );
        let fields = CountyFields {
            id: None,
            name: "name".to_string(),
        };
        assert!(matches!(
            subset_counties(&table, &fields),
            Err(ExtractError::MissingAttribute { index: 0, .. })
        ));
    }

    #[test]
    fn county_subset_rejects_points() {
        let table = Layer::new(
            Epsg::MAINE_EAST,
            vec![GeometricRecord::new(
                Point::new(0.0, 0.0).into(),
                attrs(&[("name", "York".into())]),
            )],
        );
        let fields = CountyFields {
            id: None,
            name: "name".to_string(),
        };
        assert!(matches!(
            subset_counties(&table, &fields),
            Err(ExtractError::UnexpectedGeometry { found: "Point", .. })
        ));
    }

    fn fire_fields() -> FireFields {
        FireFields {
            id: Some("OBJECTID".to_string()),
            year: Some("YEAR".to_string()),
        }
    }

    #[test]
    fn fire_events_read_id_and_year() {
        let mut from_feature_id = GeometricRecord::new(
            MultiPoint(vec![Point::new(3.0, 4.0)]).into(),
            attrs(&[("YEAR", "2021".into())]),
        );
        from_feature_id.id = Some("f-9".to_string());

        let table = Layer::new(
            Epsg::MAINE_EAST,
            vec![
                GeometricRecord::new(
                    Point::new(1.0, 2.0).into(),
                    attrs(&[
                        ("OBJECTID", AttributeValue::Integer(11)),
                        ("YEAR", AttributeValue::Float(2022.0)),
                    ]),
                ),
                from_feature_id,
                GeometricRecord::new(Point::new(5.0, 6.0).into(), Attributes::new()),
            ],
        );

        let events = fire_events(&table, &fire_fields()).unwrap();
        let events = events.features();
        assert_eq!(events[0].id, "11");
        assert_eq!(events[0].year, Some(2022));
        assert_eq!(events[1].id, "f-9");
        assert_eq!(events[1].year, Some(2021));
        assert_eq!(events[1].location, Point::new(3.0, 4.0));
        assert_eq!(events[2].id, "2");
        assert_eq!(events[2].year, None);
    }

    #[test]
    fn fire_events_reject_polygons() {
        let table = Layer::new(
            Epsg::MAINE_EAST,
            vec![GeometricRecord::new(square(0.0), Attributes::new())],
        );
        assert!(matches!(
            fire_events(&table, &fire_fields()),
            Err(ExtractError::UnexpectedGeometry { expected: "Point", .. })
        ));
    }

    #[test]
    fn year_filter() {
        let events = Layer::new(
            Epsg::MAINE_EAST,
            [Some(2021), Some(2022), None, Some(2022)]
                .into_iter()
                .enumerate()
                .map(|(i, year)| FireEvent {
                    id: i.to_string(),
                    year,
                    location: Point::new(0.0, 0.0),
                    attributes: Attributes::new(),
                })
                .collect(),
        );
        let kept = filter_year(&events, 2022);
        assert_eq!(
            kept.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "3"]
        );
    }
}
