//! Tunable constants for the analysis routines.
//!
//! # Responsibility
//! - Carry the empirical constants of the measurement workflow as plain,
//!   overridable values instead of literals buried in the routines.
//! - Parse the optional `incllab.toml` tunables file.
//!
//! # Invariants
//! - `Tunables::default()` reproduces the historical constants exactly;
//!   recalibration and division results stay bit-compatible with prior
//!   campaigns unless the analyst overrides them on purpose.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Empirical constants of the inclusion-study workflow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tunables {
    /// Nominal outer radius (µm) used to seed recalibration of circular
    /// specimens when no calibration is stored yet.
    pub default_outer_radius_um: f64,
    /// Margin factor applied to the bounding-box span when sizing
    /// rectangular divisions, so points exactly at the recorded maximum
    /// land inside the last bin.
    pub division_margin: f64,
    /// Fixed covariance factor of the log-space kernel density estimate.
    pub kde_covariance_factor: f64,
    /// Number of evaluation points of the density grid.
    pub kde_grid_points: usize,
    /// Features larger than this feret diameter (µm) are not cropped for
    /// display or classifier inference.
    pub classifier_max_feret_um: f64,
    /// Minimum feret diameter (µm) of candidates in the random
    /// classification mode.
    pub random_mode_min_feret_um: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            default_outer_radius_um: 6500.0,
            division_margin: 1.01,
            kde_covariance_factor: 0.18,
            kde_grid_points: 1000,
            classifier_max_feret_um: 500.0,
            random_mode_min_feret_um: 10.0,
        }
    }
}

impl Tunables {
    /// Parses tunables from TOML text. Absent keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads tunables from a file, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&text)
    }
}

/// Errors from reading or parsing the tunables file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read tunables file: {err}"),
            Self::Parse(message) => write!(f, "invalid tunables file: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Tunables;

    #[test]
    fn defaults_preserve_historical_constants() {
        let tunables = Tunables::default();
        assert_eq!(tunables.default_outer_radius_um, 6500.0);
        assert_eq!(tunables.division_margin, 1.01);
        assert_eq!(tunables.kde_covariance_factor, 0.18);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let tunables = Tunables::from_toml("division_margin = 1.05\n").unwrap();
        assert_eq!(tunables.division_margin, 1.05);
        assert_eq!(tunables.default_outer_radius_um, 6500.0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Tunables::from_toml("margin_factor = 2.0\n").is_err());
    }
}
