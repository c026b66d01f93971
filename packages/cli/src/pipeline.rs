//! Full pipeline: load -> normalize -> extract -> aggregate -> render.
//!
//! Every stage before rendering is fatal on error. Processed boundary
//! layers are written as soon as they are derived and stay on disk when a
//! later stage fails. Each map is rendered independently; a failed map is
//! reported and the remaining maps are still produced.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indicatif::MultiProgress;
use thiserror::Error;
use wildfire_map_cli_utils::IndicatifProgress;
use wildfire_map_geography::{
    ExportError, ExtractError, LoadError,
    export::write_layer,
    extract::{CountyFields, extract_region, filter_year, fire_events, subset_counties},
    load::load_layer,
};
use wildfire_map_geography_models::{
    COUNTY_ID_FIELD, COUNTY_NAME_FIELD, CountyBoundary, CountyFireCount, Epsg, FireEvent,
    GeometricTable, Layer, RegionBoundary, to_table,
};
use wildfire_map_projection::{ProjectionError, normalize};
use wildfire_map_render::{
    RenderError, RenderOptions, export_interactive_map, render_choropleth,
    render_fire_locations,
};
use wildfire_map_spatial::{AggregateError, aggregate, progress::ProgressCallback};

use crate::config::PipelineConfig;

/// Number of progress steps reported on the stage bar.
const STAGES: u64 = 5;

/// A fatal pipeline failure, tagged with the stage and the dataset.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading a dataset failed.
    #[error("load stage failed for the {dataset} dataset")]
    Load {
        /// Dataset being read.
        dataset: &'static str,
        /// Cause.
        #[source]
        source: LoadError,
    },

    /// Reprojecting a dataset failed.
    #[error("normalize stage failed for the {dataset} dataset")]
    Normalize {
        /// Dataset being reprojected.
        dataset: &'static str,
        /// Cause.
        #[source]
        source: ProjectionError,
    },

    /// Deriving a boundary or event layer failed.
    #[error("extract stage failed for the {dataset} dataset")]
    Extract {
        /// Dataset being extracted from.
        dataset: &'static str,
        /// Cause.
        #[source]
        source: ExtractError,
    },

    /// Writing a processed layer failed.
    #[error("export stage failed for the {dataset} dataset")]
    Export {
        /// Dataset being written.
        dataset: &'static str,
        /// Cause.
        #[source]
        source: ExportError,
    },

    /// Counting fires per county failed.
    #[error("aggregate stage failed for the fires and counties datasets")]
    Aggregate(#[from] AggregateError),
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    /// One row per county, in county order.
    pub counts: Vec<CountyFireCount>,
    /// Fire events considered (after the year filter).
    pub fires: usize,
    /// Fire events outside every county.
    pub unassigned: usize,
    /// Maps written successfully.
    pub rendered: Vec<PathBuf>,
    /// Maps that failed, with the cause.
    pub render_failures: Vec<(PathBuf, RenderError)>,
}

/// Boundary layers in the target CRS.
struct Boundaries {
    region: Layer<RegionBoundary>,
    counties: Layer<CountyBoundary>,
}

/// Runs the whole pipeline with `config`.
///
/// When `multi` is given a stage bar and an attribution bar are drawn.
///
/// # Errors
///
/// Returns [`PipelineError`] for any failure before rendering. Render
/// failures are collected in [`RunSummary::render_failures`].
pub fn run(
    config: &PipelineConfig,
    multi: Option<&MultiProgress>,
) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();
    let steps = multi.map(|m| IndicatifProgress::steps_bar(m, "Pipeline", STAGES));
    let step = |message: &str| {
        log::info!("{message}");
        if let Some(bar) = &steps {
            bar.set_message(message.to_string());
        }
    };
    let advance = || {
        if let Some(bar) = &steps {
            bar.inc(1);
        }
    };

    step("Preparing boundaries");
    let boundaries = prepare_boundaries(config)?;
    advance();

    step("Loading fire events");
    let fires = prepare_fires(config)?;
    advance();

    step("Attributing fires to counties");
    let attribution_bar = multi.map(|m| IndicatifProgress::batch_bar(m, "Attributing"));
    let progress = attribution_bar
        .clone()
        .map(|bar| bar as Arc<dyn ProgressCallback>);
    let aggregation = aggregate(&fires, &boundaries.counties, progress)?;
    if let Some(bar) = &attribution_bar {
        bar.finish_and_clear();
    }
    advance();

    step("Rendering maps");
    let (rendered, render_failures) = render_all(config, &boundaries, &fires, &aggregation.counts);
    advance();

    for row in &aggregation.counts {
        log::info!("{}: {}", row.county_name, row.count);
    }
    advance();

    if let Some(bar) = &steps {
        bar.finish(format!("Pipeline complete in {:.1}s", start.elapsed().as_secs_f64()));
    }
    log::info!("Pipeline complete in {:.1}s", start.elapsed().as_secs_f64());

    Ok(RunSummary {
        counts: aggregation.counts,
        fires: fires.len(),
        unassigned: aggregation.unassigned.len(),
        rendered,
        render_failures,
    })
}

fn prepare_boundaries(config: &PipelineConfig) -> Result<Boundaries, PipelineError> {
    let boundary_path = config.boundary_path();
    let counties_path = config.counties_path();

    if config.reuse_processed && boundary_path.is_file() && counties_path.is_file() {
        log::info!(
            "Reusing processed boundaries from {}",
            config.output.processed_dir.display()
        );
        return reload_boundaries(config, &boundary_path, &counties_path);
    }
    if config.reuse_processed {
        log::warn!("Processed boundaries missing, deriving them from the raw datasets");
    }

    let states = load_normalized(&config.inputs.states, "states", config.assume_crs, config.target_crs)?;
    let region = extract_region(&states, &config.region.field, &config.region.name)
        .map_err(|source| PipelineError::Extract {
            dataset: "states",
            source,
        })?;
    export(&to_table(&region), &boundary_path, &config.boundary_layer(), "region boundary")?;

    let raw_counties = load_normalized(
        &config.inputs.counties,
        "counties",
        config.assume_crs,
        config.target_crs,
    )?;
    let counties = subset_counties(&raw_counties, &config.county_fields()).map_err(|source| {
        PipelineError::Extract {
            dataset: "counties",
            source,
        }
    })?;
    export(&to_table(&counties), &counties_path, &config.counties_layer(), "counties")?;

    Ok(Boundaries { region, counties })
}

/// Reads processed layers back. They carry their own CRS, so no override
/// applies.
fn reload_boundaries(
    config: &PipelineConfig,
    boundary_path: &Path,
    counties_path: &Path,
) -> Result<Boundaries, PipelineError> {
    let states = load_normalized(boundary_path, "region boundary", None, config.target_crs)?;
    let region = extract_region(&states, &config.region.field, &config.region.name)
        .map_err(|source| PipelineError::Extract {
            dataset: "region boundary",
            source,
        })?;

    let table = load_normalized(counties_path, "counties", None, config.target_crs)?;
    let fields = CountyFields {
        id: Some(COUNTY_ID_FIELD.to_string()),
        name: COUNTY_NAME_FIELD.to_string(),
    };
    let counties = subset_counties(&table, &fields).map_err(|source| PipelineError::Extract {
        dataset: "counties",
        source,
    })?;

    Ok(Boundaries { region, counties })
}

fn prepare_fires(config: &PipelineConfig) -> Result<Layer<FireEvent>, PipelineError> {
    let table = load_normalized(&config.inputs.fires, "fires", config.assume_crs, config.target_crs)?;
    let events = fire_events(&table, &config.fire_fields()).map_err(|source| {
        PipelineError::Extract {
            dataset: "fires",
            source,
        }
    })?;

    Ok(match config.year {
        Some(year) => filter_year(&events, year),
        None => events,
    })
}

fn load_normalized(
    path: &Path,
    dataset: &'static str,
    assume_crs: Option<Epsg>,
    target: Epsg,
) -> Result<GeometricTable, PipelineError> {
    let table =
        load_layer(path, assume_crs).map_err(|source| PipelineError::Load { dataset, source })?;
    normalize(&table, target).map_err(|source| PipelineError::Normalize { dataset, source })
}

fn export(
    table: &GeometricTable,
    path: &Path,
    layer_name: &str,
    dataset: &'static str,
) -> Result<(), PipelineError> {
    write_layer(table, path, layer_name).map_err(|source| PipelineError::Export { dataset, source })
}

fn render_all(
    config: &PipelineConfig,
    boundaries: &Boundaries,
    fires: &Layer<FireEvent>,
    counts: &[CountyFireCount],
) -> (Vec<PathBuf>, Vec<(PathBuf, RenderError)>) {
    let options = RenderOptions {
        size: config.output.image_size,
        title: config.locations_title(),
        ..RenderOptions::default()
    };
    let county_options = RenderOptions {
        title: config.choropleth_title(),
        ..options.clone()
    };

    let outputs: [(PathBuf, Result<(), RenderError>); 3] = [
        {
            let path = config.locations_map_path();
            let result = render_fire_locations(&boundaries.region, fires, &path, &options);
            (path, result)
        },
        {
            let path = config.choropleth_path();
            let result = render_choropleth(&boundaries.counties, counts, &path, &county_options);
            (path, result)
        },
        {
            let path = config.interactive_path();
            let result =
                export_interactive_map(&boundaries.counties, counts, &path, &county_options);
            (path, result)
        },
    ];

    let mut rendered = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in outputs {
        match result {
            Ok(()) => rendered.push(path),
            Err(e) => {
                match std::error::Error::source(&e) {
                    Some(cause) => {
                        log::error!("Failed to render {}: {e} ({cause})", path.display());
                    }
                    None => log::error!("Failed to render {}: {e}", path.display()),
                }
                failures.push((path, e));
            }
        }
    }
    (rendered, failures)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" } },
        "features": [
            { "type": "Feature", "properties": { "NAME": "Maine", "STATE": "23" },
              "geometry": { "type": "Polygon", "coordinates": [[[-70.0,44.0],[-69.0,44.0],[-69.0,45.0],[-70.0,45.0],[-70.0,44.0]]] } },
            { "type": "Feature", "properties": { "NAME": "Vermont", "STATE": "50" },
              "geometry": { "type": "Polygon", "coordinates": [[[-73.0,43.0],[-72.0,43.0],[-72.0,44.0],[-73.0,44.0],[-73.0,43.0]]] } }
        ]
    }"#;

    const COUNTIES: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" } },
        "features": [
            { "type": "Feature", "properties": { "name": "West", "POP": 10 },
              "geometry": { "type": "Polygon", "coordinates": [[[-70.0,44.0],[-69.5,44.0],[-69.5,45.0],[-70.0,45.0],[-70.0,44.0]]] } },
            { "type": "Feature", "properties": { "name": "East", "POP": 20 },
              "geometry": { "type": "Polygon", "coordinates": [[[-69.5,44.0],[-69.0,44.0],[-69.0,45.0],[-69.5,45.0],[-69.5,44.0]]] } },
            { "type": "Feature", "properties": { "name": "North", "POP": 5 },
              "geometry": { "type": "Polygon", "coordinates": [[[-70.0,45.0],[-69.0,45.0],[-69.0,45.5],[-70.0,45.5],[-70.0,45.0]]] } }
        ]
    }"#;

    const FIRES: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" } },
        "features": [
            { "type": "Feature", "properties": { "OBJECTID": 1, "YEAR": 2022 },
              "geometry": { "type": "Point", "coordinates": [-69.8, 44.2] } },
            { "type": "Feature", "properties": { "OBJECTID": 2, "YEAR": 2022 },
              "geometry": { "type": "Point", "coordinates": [-69.7, 44.6] } },
            { "type": "Feature", "properties": { "OBJECTID": 3, "YEAR": 2021 },
              "geometry": { "type": "Point", "coordinates": [-69.2, 44.5] } },
            { "type": "Feature", "properties": { "OBJECTID": 4, "YEAR": 2022 },
              "geometry": { "type": "Point", "coordinates": [-75.0, 40.0] } }
        ]
    }"#;

    const NO_FIRES: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "EPSG:4326" } },
        "features": []
    }"#;

    fn workspace(name: &str, fires: &str) -> (PathBuf, PipelineConfig) {
        let dir = std::env::temp_dir().join(format!(
            "wildfire_map_pipeline_{name}_{}",
            std::process::id()
        ));
        let raw = dir.join("raw");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::write(raw.join("states.json"), STATES).unwrap();
        std::fs::write(raw.join("counties.geojson"), COUNTIES).unwrap();
        std::fs::write(raw.join("fires.json"), fires).unwrap();

        let mut config = PipelineConfig::default();
        config.inputs.states = raw.join("states.json");
        config.inputs.counties = raw.join("counties.geojson");
        config.inputs.fires = raw.join("fires.json");
        config.output.processed_dir = dir.join("processed");
        config.output.dir = dir.join("docs");
        config.output.image_size = 120;

        (dir, config)
    }

    fn counts(summary: &RunSummary) -> Vec<(&str, u64)> {
        summary
            .counts
            .iter()
            .map(|row| (row.county_name.as_str(), row.count))
            .collect()
    }

    #[test]
    fn end_to_end_counts_and_outputs() {
        let (dir, config) = workspace("e2e", FIRES);

        let summary = run(&config, None).unwrap();

        assert_eq!(counts(&summary), vec![("West", 2), ("East", 1), ("North", 0)]);
        assert_eq!(summary.fires, 4);
        assert_eq!(summary.unassigned, 1);
        assert!(summary.render_failures.is_empty());
        assert_eq!(summary.rendered.len(), 3);
        assert!(config.boundary_path().is_file());
        assert!(config.counties_path().is_file());
        assert!(config.locations_map_path().is_file());
        assert!(config.choropleth_path().is_file());
        assert!(config.interactive_path().is_file());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn year_filter_applies_before_counting() {
        let (dir, mut config) = workspace("year", FIRES);
        config.year = Some(2022);

        let summary = run(&config, None).unwrap();
        assert_eq!(counts(&summary), vec![("West", 2), ("East", 0), ("North", 0)]);
        assert_eq!(summary.fires, 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn repeated_runs_are_identical() {
        let (dir, config) = workspace("determinism", FIRES);

        let first = run(&config, None).unwrap();
        let boundary = std::fs::read(config.boundary_path()).unwrap();
        let counties = std::fs::read(config.counties_path()).unwrap();

        let second = run(&config, None).unwrap();
        assert_eq!(first.counts, second.counts);
        assert_eq!(boundary, std::fs::read(config.boundary_path()).unwrap());
        assert_eq!(counties, std::fs::read(config.counties_path()).unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reuse_processed_matches_fresh_run() {
        let (dir, mut config) = workspace("reuse", FIRES);

        let fresh = run(&config, None).unwrap();

        // Remove the raw boundaries so only the processed layers can serve.
        std::fs::remove_file(&config.inputs.states).unwrap();
        std::fs::remove_file(&config.inputs.counties).unwrap();
        config.reuse_processed = true;

        let reused = run(&config, None).unwrap();
        assert_eq!(fresh.counts, reused.counts);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_fires_halt_before_rendering() {
        let (dir, config) = workspace("empty", NO_FIRES);

        let result = run(&config, None);

        assert!(matches!(
            result,
            Err(PipelineError::Aggregate(AggregateError::EmptyInput { layer: "fires" }))
        ));
        // Boundaries were written before the failure and stay on disk.
        assert!(config.boundary_path().is_file());
        assert!(!config.locations_map_path().exists());
        assert!(!config.interactive_path().exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_region_is_fatal() {
        let (dir, mut config) = workspace("region", FIRES);
        config.region.name = "Ohio".to_string();

        assert!(matches!(
            run(&config, None),
            Err(PipelineError::Extract {
                dataset: "states",
                source: ExtractError::RegionNotFound { .. }
            })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_input_names_the_dataset() {
        let (dir, config) = workspace("missing", FIRES);
        std::fs::remove_file(&config.inputs.fires).unwrap();

        let error = run(&config, None).unwrap_err();
        assert!(matches!(
            error,
            PipelineError::Load {
                dataset: "fires",
                source: LoadError::NotFound { .. }
            }
        ));
        assert_eq!(error.to_string(), "load stage failed for the fires dataset");

        std::fs::remove_dir_all(&dir).ok();
    }
}
