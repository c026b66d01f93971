//! Coordinate reference system identifiers.
//!
//! Layers carry an [`Epsg`] code rather than a full CRS definition. The
//! transforms are resolved in `wildfire_map_projection`; this module only
//! parses and prints the identifiers found in `GeoJSON` `crs` members and
//! configuration files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// OGC URN for WGS 84 with longitude/latitude axis order.
const CRS84_URN: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// Error returned when a CRS string cannot be interpreted as an EPSG code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized coordinate reference system '{input}'")]
pub struct CrsParseError {
    /// The rejected input.
    pub input: String,
}

/// An EPSG coordinate reference system code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epsg(pub u32);

impl Epsg {
    /// WGS 84 geographic coordinates.
    pub const WGS84: Self = Self(4326);
    /// NAD83(HARN) / Maine East (meters).
    pub const MAINE_EAST: Self = Self(2802);

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Returns the OGC URN used in `GeoJSON` `crs` members.
    #[must_use]
    pub fn urn(self) -> String {
        if self == Self::WGS84 {
            CRS84_URN.to_string()
        } else {
            format!("urn:ogc:def:crs:EPSG::{}", self.0)
        }
    }
}

impl fmt::Display for Epsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Epsg {
    type Err = CrsParseError;

    /// Accepts `EPSG:2802`, `epsg:2802`, `2802`, `urn:ogc:def:crs:EPSG::2802`
    /// (with or without a version segment) and the `CRS84` URN.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || CrsParseError {
            input: s.to_string(),
        };

        if trimmed.eq_ignore_ascii_case(CRS84_URN) || trimmed.eq_ignore_ascii_case("CRS84") {
            return Ok(Self::WGS84);
        }

        let lower = trimmed.to_ascii_lowercase();
        let code = if let Some(rest) = lower.strip_prefix("epsg:") {
            rest
        } else if let Some(rest) = lower.strip_prefix("urn:ogc:def:crs:epsg:") {
            // urn:ogc:def:crs:EPSG::2802 or urn:ogc:def:crs:EPSG:6.6:2802
            rest.rsplit(':').next().unwrap_or_default()
        } else {
            lower.as_str()
        };

        code.parse::<u32>()
            .ok()
            .filter(|c| *c > 0)
            .map(Self)
            .ok_or_else(err)
    }
}

impl Serialize for Epsg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Epsg {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_spellings() {
        assert_eq!("EPSG:2802".parse(), Ok(Epsg(2802)));
        assert_eq!("epsg:4326".parse(), Ok(Epsg::WGS84));
        assert_eq!(" 3857 ".parse(), Ok(Epsg(3857)));
        assert_eq!("urn:ogc:def:crs:EPSG::26919".parse(), Ok(Epsg(26919)));
        assert_eq!("urn:ogc:def:crs:EPSG:6.6:4269".parse(), Ok(Epsg(4269)));
        assert_eq!(CRS84_URN.parse(), Ok(Epsg::WGS84));
    }

    #[test]
    fn rejects_garbage() {
        assert!("EPSG:".parse::<Epsg>().is_err());
        assert!("EPSG:0".parse::<Epsg>().is_err());
        assert!("+proj=tmerc".parse::<Epsg>().is_err());
    }

    #[test]
    fn urn_roundtrip() {
        for epsg in [Epsg::WGS84, Epsg::MAINE_EAST, Epsg(32619)] {
            assert_eq!(epsg.urn().parse(), Ok(epsg));
        }
    }

    #[test]
    fn display() {
        assert_eq!(Epsg::MAINE_EAST.to_string(), "EPSG:2802");
    }
}
