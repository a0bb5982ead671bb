//! Per-slice metadata record.
//!
//! # Responsibility
//! - Identify one measurement pass of one specimen and carry its physical
//!   dimensions, calibration and division layout.
//!
//! # Invariants
//! - `img_width == 0.0` is the stored sentinel for a circular cross
//!   section; `CrossSection::from_width` is the only place that decodes
//!   it.
//! - Calibration fields are either all present or all absent in a
//!   meaningful row; `calibration()` exposes only the complete case.

use super::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Composite key of one measurement pass: specimen id plus 1-based slice
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SliceKey {
    pub specimen_id: String,
    pub slice: u32,
}

impl SliceKey {
    pub fn new(specimen_id: impl Into<String>, slice: u32) -> Self {
        Self {
            specimen_id: specimen_id.into(),
            slice,
        }
    }
}

impl Display for SliceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "specimen `{}` slice {}", self.specimen_id, self.slice)
    }
}

/// Shape of a specimen's analysed cross section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossSection {
    Rectangular,
    Circular,
}

impl CrossSection {
    /// Decodes the stored width sentinel: widths below one micron mean
    /// the shape is given by radii instead of width/height.
    pub fn from_width(img_width: f64) -> Self {
        if img_width.abs() < 1.0 {
            Self::Circular
        } else {
            Self::Rectangular
        }
    }
}

/// A complete specimen-center calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Calibrated center, image-local microns.
    pub x_c: f64,
    pub y_c: f64,
    /// Calibrated bounding radius, microns.
    pub r_outer: f64,
}

/// One row of the metadata table: one specimen+slice measurement pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceMeta {
    pub specimen_id: String,
    pub slice: u32,
    /// Identifier of the source measurement batch.
    pub filename: String,
    /// Physical width in microns; `0.0` marks a circular cross section.
    pub img_width: f64,
    /// Physical height in microns. For circular specimens this holds the
    /// equivalent height derived from the annulus area.
    pub img_height: f64,
    /// Analysed area in square millimeters.
    pub img_area_mm2: f64,
    /// Calibrated center, unset until recalibration has run.
    pub x_c: Option<f64>,
    pub y_c: Option<f64>,
    /// Calibrated bounding radius, unset until recalibration has run.
    pub r_outer: Option<f64>,
    /// Division-grid counts; zero means divisions were never assigned.
    /// Circular specimens only use `n_divis_x`, as the sector count.
    pub n_divis_x: u32,
    pub n_divis_y: u32,
    /// Area per division, derived from `img_area_mm2` and the counts.
    pub divis_area_mm2: Option<f64>,
}

impl SliceMeta {
    /// Creates the metadata row of a freshly imported slice: no
    /// calibration, no divisions.
    pub fn new_import(
        specimen_id: impl Into<String>,
        slice: u32,
        filename: impl Into<String>,
        img_width: f64,
        img_height: f64,
        img_area_mm2: f64,
    ) -> Self {
        Self {
            specimen_id: specimen_id.into(),
            slice,
            filename: filename.into(),
            img_width,
            img_height,
            img_area_mm2,
            x_c: None,
            y_c: None,
            r_outer: None,
            n_divis_x: 0,
            n_divis_y: 0,
            divis_area_mm2: None,
        }
    }

    pub fn key(&self) -> SliceKey {
        SliceKey::new(self.specimen_id.clone(), self.slice)
    }

    pub fn cross_section(&self) -> CrossSection {
        CrossSection::from_width(self.img_width)
    }

    /// Returns the stored calibration when all three components are set.
    pub fn calibration(&self) -> Option<Calibration> {
        match (self.x_c, self.y_c, self.r_outer) {
            (Some(x_c), Some(y_c), Some(r_outer)) => Some(Calibration { x_c, y_c, r_outer }),
            _ => None,
        }
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.x_c = Some(calibration.x_c);
        self.y_c = Some(calibration.y_c);
        self.r_outer = Some(calibration.r_outer);
    }

    pub fn has_divisions(&self) -> bool {
        self.n_divis_x > 0
    }

    /// Area per division for the current counts, `None` while divisions
    /// are unset.
    pub fn derived_division_area_mm2(&self) -> Option<f64> {
        if self.n_divis_x == 0 {
            return None;
        }
        let cells = self.n_divis_x * self.n_divis_y.max(1);
        Some(self.img_area_mm2 / f64::from(cells))
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.specimen_id.trim().is_empty() || self.slice == 0 {
            return Err(ModelError::InvalidKey {
                specimen_id: self.specimen_id.clone(),
                slice: self.slice,
            });
        }

        for (field, value) in [
            ("img_width", self.img_width),
            ("img_height", self.img_height),
            ("img_area_mm2", self.img_area_mm2),
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

        for (field, value) in [
            ("x_c", self.x_c),
            ("y_c", self.y_c),
            ("r_outer", self.r_outer),
            ("divis_area_mm2", self.divis_area_mm2),
        ] {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(ModelError::NonFiniteField {
                        key: self.key(),
                        field,
                    });
                }
            }
        }

        Ok(())
    }
}
