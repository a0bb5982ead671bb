//! Per-feature measurement record and its classification enum.

use super::{ModelError, ModelResult, SliceKey};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt::{Display, Formatter};

/// Closed classification of a detected feature.
///
/// The empty label is the stored encoding of `Unclassified`, kept for
/// compatibility with tables produced by earlier campaigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionClass {
    /// Not reviewed yet.
    Unclassified,
    /// Unidentified microstructural feature.
    Microstructure,
    /// Non-metallic inclusion.
    Inclusion,
    /// Shrinkage porosity.
    Porosity,
    /// Polishing scratch.
    Scratch,
    /// Dust on the polished surface.
    Dust,
    /// Any other preparation artifact.
    Artifact,
    /// Polar radius beyond the calibrated outer radius; the feature
    /// belongs to an adjacent specimen on the same photograph.
    OutOfBounds,
}

impl InclusionClass {
    /// Stored label of this class.
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Unclassified => "",
            Self::Microstructure => "microstructure",
            Self::Inclusion => "inclusion",
            Self::Porosity => "porosity",
            Self::Scratch => "scratch",
            Self::Dust => "dust",
            Self::Artifact => "artifact",
            Self::OutOfBounds => "out_of_bounds",
        }
    }

    pub fn parse_label(value: &str) -> Option<Self> {
        match value {
            "" => Some(Self::Unclassified),
            "microstructure" => Some(Self::Microstructure),
            "inclusion" => Some(Self::Inclusion),
            "porosity" => Some(Self::Porosity),
            "scratch" => Some(Self::Scratch),
            "dust" => Some(Self::Dust),
            "artifact" => Some(Self::Artifact),
            "out_of_bounds" => Some(Self::OutOfBounds),
            _ => None,
        }
    }

    /// Preparation artifacts and out-of-bounds rows, always excluded
    /// from the statistics.
    pub fn is_artifact(self) -> bool {
        matches!(
            self,
            Self::Scratch | Self::Dust | Self::Artifact | Self::OutOfBounds
        )
    }

    /// Whether this row counts toward inclusion statistics.
    pub fn counts_in_stats(self, exclude_porosity: bool) -> bool {
        if self.is_artifact() {
            return false;
        }
        !(exclude_porosity && self == Self::Porosity)
    }

    /// Human-readable name for menus and reports.
    pub fn description(self) -> &'static str {
        match self {
            Self::Unclassified => "Unclassified",
            Self::Microstructure => "Unidentified microstructural feature",
            Self::Inclusion => "Inclusion",
            Self::Porosity => "Shrinkage porosity",
            Self::Scratch => "Scratch",
            Self::Dust => "Dust",
            Self::Artifact => "Other artifact",
            Self::OutOfBounds => "Out of bounds",
        }
    }
}

impl Display for InclusionClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// One row of the data table: one detected feature of one slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inclusion {
    pub specimen_id: String,
    pub slice: u32,
    /// Per-image feature sequence number, 1-based, unique within a slice.
    pub incl_nb: u32,
    /// Image-local cartesian coordinates, microns.
    pub x: f64,
    pub y: f64,
    /// Measured area, square microns.
    pub area: f64,
    /// `sqrt(area)`, the equivalent-diameter size measure.
    pub sqr_area: f64,
    /// Maximum caliper distance, microns.
    pub feret: f64,
    pub min_feret: f64,
    /// Orientation of the feret measurement, degrees, signed.
    pub feret_angle: f64,
    pub circ: f64,
    pub roundness: f64,
    /// Aspect ratio.
    pub ar: f64,
    /// Solidity.
    pub solid: f64,
    pub class: InclusionClass,
    /// Polar radius relative to the calibrated center, unset until
    /// recalibration has run.
    pub r: Option<f64>,
    /// Azimuth in `[0, 2*PI)`, unset until recalibration has run.
    pub theta: Option<f64>,
    /// Spatial-bin id, 1-based; zero means "not yet assigned".
    pub division: u32,
}

impl Inclusion {
    pub fn key(&self) -> SliceKey {
        SliceKey::new(self.specimen_id.clone(), self.slice)
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.specimen_id.trim().is_empty() || self.slice == 0 {
            return Err(ModelError::InvalidKey {
                specimen_id: self.specimen_id.clone(),
                slice: self.slice,
            });
        }
        if self.incl_nb == 0 {
            return Err(ModelError::InvalidSequence { key: self.key() });
        }

        for (field, value) in [
            ("x", self.x),
            ("y", self.y),
            ("feret_angle", self.feret_angle),
        ] {
            if !value.is_finite() {
                return Err(ModelError::NonFiniteField {
                    key: self.key(),
                    field,
                });
            }
        }

        for (field, value) in [
            ("area", self.area),
            ("sqr_area", self.sqr_area),
            ("feret", self.feret),
            ("min_feret", self.min_feret),
            ("circ", self.circ),
            ("roundness", self.roundness),
            ("ar", self.ar),
            ("solid", self.solid),
        ] {
            if !value.is_finite() {
                return Err(ModelError::NonFiniteField {
                    key: self.key(),
                    field,
                });
            }
            if value < 0.0 {
                return Err(ModelError::NegativeField {
                    key: self.key(),
                    field,
                    value,
                });
            }
        }

        if let Some(r) = self.r {
            if !r.is_finite() {
                return Err(ModelError::NonFiniteField {
                    key: self.key(),
                    field: "r",
                });
            }
            if r < 0.0 {
                return Err(ModelError::NegativeField {
                    key: self.key(),
                    field: "r",
                    value: r,
                });
            }
        }
        if let Some(theta) = self.theta {
            if !theta.is_finite() || !(0.0..TAU).contains(&theta) {
                return Err(ModelError::ThetaOutOfRange {
                    key: self.key(),
                    value: theta,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Inclusion, InclusionClass};
    use crate::model::ModelError;

    fn sample_row() -> Inclusion {
        Inclusion {
            specimen_id: "S1".to_string(),
            slice: 1,
            incl_nb: 4,
            x: 120.0,
            y: 80.0,
            area: 25.0,
            sqr_area: 5.0,
            feret: 9.0,
            min_feret: 4.0,
            feret_angle: -35.0,
            circ: 0.8,
            roundness: 0.7,
            ar: 1.4,
            solid: 0.95,
            class: InclusionClass::Unclassified,
            r: None,
            theta: None,
            division: 0,
        }
    }

    #[test]
    fn labels_round_trip_for_every_class() {
        for class in [
            InclusionClass::Unclassified,
            InclusionClass::Microstructure,
            InclusionClass::Inclusion,
            InclusionClass::Porosity,
            InclusionClass::Scratch,
            InclusionClass::Dust,
            InclusionClass::Artifact,
            InclusionClass::OutOfBounds,
        ] {
            assert_eq!(InclusionClass::parse_label(class.as_label()), Some(class));
        }
        assert_eq!(InclusionClass::parse_label("7"), None);
    }

    #[test]
    fn artifact_set_matches_statistics_exclusions() {
        assert!(InclusionClass::Scratch.is_artifact());
        assert!(InclusionClass::OutOfBounds.is_artifact());
        assert!(!InclusionClass::Porosity.is_artifact());
        assert!(!InclusionClass::Porosity.counts_in_stats(true));
        assert!(InclusionClass::Porosity.counts_in_stats(false));
        assert!(InclusionClass::Unclassified.counts_in_stats(true));
    }

    #[test]
    fn validate_rejects_zero_sequence_number() {
        let mut row = sample_row();
        row.incl_nb = 0;
        assert!(matches!(
            row.validate(),
            Err(ModelError::InvalidSequence { .. })
        ));
    }

    #[test]
    fn validate_rejects_negative_area_and_bad_theta() {
        let mut row = sample_row();
        row.area = -1.0;
        assert!(matches!(
            row.validate(),
            Err(ModelError::NegativeField { field: "area", .. })
        ));

        let mut row = sample_row();
        row.theta = Some(7.0);
        assert!(matches!(
            row.validate(),
            Err(ModelError::ThetaOutOfRange { .. })
        ));
    }
}
