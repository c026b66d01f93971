#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Wildfire-by-county map pipeline.
//!
//! Loads fire points, state boundaries and county boundaries, normalizes
//! them to one planar CRS, extracts the region of interest, counts fires
//! per county and renders two static maps plus an interactive HTML map.
//!
//! Uses `indicatif-log-bridge` (via [`wildfire_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod config;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use wildfire_map_geography_models::Epsg;

use crate::config::PipelineConfig;

/// Exit code when every stage succeeded but at least one map failed.
const RENDER_FAILURE_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "wildfire_map",
    about = "Count wildfires per county and render maps"
)]
struct Cli {
    /// Configuration file (defaults to `wildfire_map.toml` when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fire event points (`GeoJSON`)
    #[arg(long)]
    fires: Option<PathBuf>,

    /// State boundary polygons (`GeoJSON`)
    #[arg(long)]
    states: Option<PathBuf>,

    /// County boundary polygons (`GeoJSON`)
    #[arg(long)]
    counties: Option<PathBuf>,

    /// Directory for the processed boundary layers
    #[arg(long)]
    processed_dir: Option<PathBuf>,

    /// Directory for the rendered maps
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Planar CRS all layers are normalized to, e.g. `EPSG:2802`
    #[arg(long)]
    target_crs: Option<Epsg>,

    /// CRS assumed for every input, overriding embedded metadata
    #[arg(long)]
    assume_crs: Option<Epsg>,

    /// Name of the region of interest in the state boundaries
    #[arg(long)]
    region: Option<String>,

    /// Only count fires from this year
    #[arg(long)]
    year: Option<i32>,

    /// Load processed boundaries instead of re-deriving them when present
    #[arg(long)]
    reuse_processed: bool,
}

impl Cli {
    /// Applies every flag that was given on top of `config`.
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(path) = self.fires {
            config.inputs.fires = path;
        }
        if let Some(path) = self.states {
            config.inputs.states = path;
        }
        if let Some(path) = self.counties {
            config.inputs.counties = path;
        }
        if let Some(dir) = self.processed_dir {
            config.output.processed_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = dir;
        }
        if let Some(crs) = self.target_crs {
            config.target_crs = crs;
        }
        if self.assume_crs.is_some() {
            config.assume_crs = self.assume_crs;
        }
        if let Some(region) = self.region {
            config.region.name = region;
        }
        if self.year.is_some() {
            config.year = self.year;
        }
        if self.reuse_processed {
            config.reuse_processed = true;
        }
    }
}

fn main() -> ExitCode {
    let multi = wildfire_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report(&e),
    };
    cli.apply(&mut config);

    let result = pipeline::run(&config, Some(&multi));
    if let Ok(summary) = &result {
        log::info!(
            "{} of {} fires outside every county; {} map(s) written",
            summary.unassigned,
            summary.fires,
            summary.rendered.len()
        );
    }

    match result {
        Ok(summary) if summary.render_failures.is_empty() => ExitCode::SUCCESS,
        Ok(summary) => {
            for (_, e) in &summary.render_failures {
                print_chain(e);
            }
            ExitCode::from(RENDER_FAILURE_EXIT)
        }
        Err(e) => report(&e),
    }
}

/// Prints `error` and its source chain, returning the fatal exit code.
fn report(error: &dyn std::error::Error) -> ExitCode {
    print_chain(error);
    ExitCode::FAILURE
}

fn print_chain(error: &dyn std::error::Error) {
    eprintln!("error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

/// Messages of `error` and every cause, outermost first.
#[cfg(test)]
fn chain(error: &dyn std::error::Error) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "wildfire_map",
            "--fires",
            "in/fires.json",
            "--target-crs",
            "EPSG:26919",
            "--assume-crs",
            "4326",
            "--region",
            "Vermont",
            "--year",
            "2022",
            "--reuse-processed",
        ]);

        let mut config = PipelineConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.inputs.fires, PathBuf::from("in/fires.json"));
        assert_eq!(config.target_crs, Epsg(26919));
        assert_eq!(config.assume_crs, Some(Epsg::WGS84));
        assert_eq!(config.region.name, "Vermont");
        assert_eq!(config.year, Some(2022));
        assert!(config.reuse_processed);
        assert_eq!(
            config.inputs.states,
            PipelineConfig::default().inputs.states
        );
    }

    #[test]
    fn no_flags_keep_config_values() {
        let mut config = PipelineConfig::from_toml("year = 2021\nreuse_processed = true").unwrap();
        let expected = config.clone();

        Cli::parse_from(["wildfire_map"]).apply(&mut config);

        assert_eq!(config, expected);
    }

    #[test]
    fn causes_are_reported_once() {
        let missing = std::env::temp_dir().join("wildfire_map_main_no_such_config.toml");
        let Err(e) = PipelineConfig::load(Some(&missing)) else {
            panic!("missing file must fail");
        };

        let messages = chain(&e);
        assert_eq!(messages.len(), 2);
        assert!(!messages[0].contains(&messages[1]), "{messages:?}");
    }

    #[test]
    fn invalid_crs_flag_is_rejected() {
        assert!(Cli::try_parse_from(["wildfire_map", "--target-crs", "nowhere"]).is_err());
    }
}
