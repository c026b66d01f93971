//! Pipeline configuration.
//!
//! Every setting has a default, so the binary runs with no configuration
//! file at all. A `wildfire_map.toml` in the working directory (or the file
//! given with `--config`) overrides the defaults, and command-line flags
//! override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wildfire_map_geography::extract::{CountyFields, FireFields};
use wildfire_map_geography_models::Epsg;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "wildfire_map.toml";

/// Errors raised while reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("{}: failed to read configuration", path.display())]
    Read {
        /// Configuration path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid configuration TOML.
    #[error("{}: invalid configuration", path.display())]
    Parse {
        /// Configuration path.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },
}

/// Everything the pipeline needs to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Planar CRS all layers are normalized to.
    pub target_crs: Epsg,
    /// CRS assumed for inputs, overriding their metadata.
    pub assume_crs: Option<Epsg>,
    /// Keep only fire events from this year.
    pub year: Option<i32>,
    /// Load processed boundaries from disk when they exist.
    pub reuse_processed: bool,
    /// Region of interest.
    pub region: RegionConfig,
    /// Raw input datasets.
    pub inputs: InputConfig,
    /// Attribute names in the raw datasets.
    pub fields: FieldConfig,
    /// Output locations.
    pub output: OutputConfig,
}

/// Which boundary record is the region of interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    /// Attribute compared against `name`.
    pub field: String,
    /// Value the region's record carries in `field`.
    pub name: String,
}

/// Raw input datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Fire event points.
    pub fires: PathBuf,
    /// State boundary polygons.
    pub states: PathBuf,
    /// County boundary polygons.
    pub counties: PathBuf,
}

/// Attribute names in the raw datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldConfig {
    /// County name attribute.
    pub county_name: String,
    /// County identifier attribute; the name is used when unset.
    pub county_id: Option<String>,
    /// Fire identifier attribute.
    pub fire_id: Option<String>,
    /// Fire year attribute.
    pub fire_year: Option<String>,
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory for the processed boundary layers.
    pub processed_dir: PathBuf,
    /// Directory for the maps.
    pub dir: PathBuf,
    /// Edge length of the static maps in pixels.
    pub image_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_crs: Epsg::MAINE_EAST,
            assume_crs: None,
            year: None,
            reuse_processed: false,
            region: RegionConfig::default(),
            inputs: InputConfig::default(),
            fields: FieldConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            field: "NAME".to_string(),
            name: "Maine".to_string(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            fires: PathBuf::from("data/raw/Fires.json"),
            states: PathBuf::from("data/raw/gz_2010_us_040_00_500k.json"),
            counties: PathBuf::from("data/raw/Counties.geojson"),
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            county_name: "name".to_string(),
            county_id: None,
            fire_id: Some("OBJECTID".to_string()),
            fire_year: Some("YEAR".to_string()),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            processed_dir: PathBuf::from("data/processed"),
            dir: PathBuf::from("docs"),
            image_size: 900,
        }
    }
}

impl PipelineConfig {
    /// Reads the configuration.
    ///
    /// With `path` set the file must exist. Without it,
    /// [`DEFAULT_CONFIG_FILE`] is read when present and the defaults are
    /// used otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    log::debug!("No {DEFAULT_CONFIG_FILE}, using built-in defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses configuration TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed TOML or unknown keys.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(contents)
    }

    /// Lowercase, underscore-separated region name used in file and layer
    /// names, e.g. `new_hampshire`.
    #[must_use]
    pub fn region_slug(&self) -> String {
        let slug: String = self
            .region
            .name
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        slug.split('_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Layer name of the processed region boundary.
    #[must_use]
    pub fn boundary_layer(&self) -> String {
        format!("{}_boundary", self.region_slug())
    }

    /// Layer name of the processed counties.
    #[must_use]
    pub fn counties_layer(&self) -> String {
        format!("{}_counties", self.region_slug())
    }

    /// Path of the processed region boundary.
    #[must_use]
    pub fn boundary_path(&self) -> PathBuf {
        self.output
            .processed_dir
            .join(format!("{}.geojson", self.boundary_layer()))
    }

    /// Path of the processed counties.
    #[must_use]
    pub fn counties_path(&self) -> PathBuf {
        self.output
            .processed_dir
            .join(format!("{}.geojson", self.counties_layer()))
    }

    /// Path of the fire location map.
    #[must_use]
    pub fn locations_map_path(&self) -> PathBuf {
        self.output.dir.join("wildfire_locations.png")
    }

    /// Path of the static choropleth.
    #[must_use]
    pub fn choropleth_path(&self) -> PathBuf {
        self.output.dir.join("fires_by_county.png")
    }

    /// Path of the interactive map.
    #[must_use]
    pub fn interactive_path(&self) -> PathBuf {
        self.output.dir.join("fires_by_county.html")
    }

    /// County attribute names for extraction.
    #[must_use]
    pub fn county_fields(&self) -> CountyFields {
        CountyFields {
            id: self.fields.county_id.clone(),
            name: self.fields.county_name.clone(),
        }
    }

    /// Fire attribute names for extraction.
    #[must_use]
    pub fn fire_fields(&self) -> FireFields {
        FireFields {
            id: self.fields.fire_id.clone(),
            year: self.fields.fire_year.clone(),
        }
    }

    /// Title of the fire location map.
    #[must_use]
    pub fn locations_title(&self) -> String {
        self.with_year(format!("Wildfire Locations in {}", self.region.name))
    }

    /// Title of the county maps.
    #[must_use]
    pub fn choropleth_title(&self) -> String {
        self.with_year(format!("{} Wildfires per County", self.region.name))
    }

    fn with_year(&self, title: String) -> String {
        match self.year {
            Some(year) => format!("{title} ({year})"),
            None => title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_crs, Epsg(2802));
        assert_eq!(config.region.field, "NAME");
        assert_eq!(config.region.name, "Maine");
        assert_eq!(config.fields.county_id, None);
        assert_eq!(
            config.boundary_path(),
            PathBuf::from("data/processed/maine_boundary.geojson")
        );
        assert_eq!(
            config.counties_path(),
            PathBuf::from("data/processed/maine_counties.geojson")
        );
        assert_eq!(
            config.interactive_path(),
            PathBuf::from("docs/fires_by_county.html")
        );
        assert_eq!(config.output.image_size, 900);
    }

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(
            PipelineConfig::from_toml("").unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = PipelineConfig::from_toml(
            r#"
            target_crs = "EPSG:26919"
            year = 2022

            [region]
            name = "New Hampshire"

            [fields]
            county_id = "GEOID"
            "#,
        )
        .unwrap();

        assert_eq!(config.target_crs, Epsg(26919));
        assert_eq!(config.year, Some(2022));
        assert_eq!(config.region.field, "NAME");
        assert_eq!(config.region.name, "New Hampshire");
        assert_eq!(config.fields.county_id.as_deref(), Some("GEOID"));
        assert_eq!(config.fields.county_name, "name");
        assert_eq!(config.counties_layer(), "new_hampshire_counties");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_toml("colour = \"red\"").is_err());
    }

    #[test]
    fn invalid_crs_is_rejected() {
        assert!(PipelineConfig::from_toml("target_crs = \"Maine East\"").is_err());
    }

    #[test]
    fn titles_include_year_filter() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.locations_title(), "Wildfire Locations in Maine");
        config.year = Some(2022);
        assert_eq!(config.choropleth_title(), "Maine Wildfires per County (2022)");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("wildfire_map_no_such_config.toml");
        assert!(matches!(
            PipelineConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn loads_file_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "wildfire_map_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "reuse_processed = true\n").unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert!(config.reuse_processed);

        std::fs::remove_file(&path).ok();
    }
}
