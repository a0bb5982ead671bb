//! Core use-case services.
//!
//! # Responsibility
//! - Implement the data-correction entry points as snapshot transforms:
//!   every service takes the current `Dataset` by reference and returns a
//!   new one plus a change summary.
//! - Keep prompting and rendering behind the `interact` contracts.
//!
//! # Invariants
//! - Services never perform I/O against the store; the session driver
//!   owns the load-transform-save cycle.
//! - Input validation happens before the first snapshot mutation.

use crate::geometry::GeometryError;
use crate::model::{CrossSection, SliceKey};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod calibrate_service;
pub mod classify_service;
pub mod divide_service;
pub mod export_service;
pub mod import_service;
pub mod stats_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors of the use-case layer.
#[derive(Debug)]
pub enum ServiceError {
    /// No metadata rows exist for this specimen.
    UnknownSpecimen(String),
    /// No metadata row exists for this specimen+slice.
    UnknownSlice(SliceKey),
    /// The slice has no feature rows to work on.
    EmptySlice(SliceKey),
    /// Recalibration found no point inside the candidate radius, so no
    /// refined center can be derived.
    NoInteriorPoints(SliceKey),
    /// Division counts must be strictly positive.
    InvalidDivisionCount(u32),
    /// The slice's features span a zero-width or zero-height bounding
    /// box; a rectangular grid cannot be sized.
    DegenerateBounds(SliceKey),
    /// The angular path needs `theta` on every row of the specimen;
    /// recalibration has not run for this one.
    ThetaMissing { key: SliceKey, incl_nb: u32 },
    /// The operation applies to the other cross-section shape.
    WrongCrossSection {
        specimen_id: String,
        expected: CrossSection,
    },
    /// An exclusion rectangle with inverted bounds.
    InvalidBounds {
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    },
    /// Physical dimensions of an import must be positive and ordered.
    InvalidDimensions(String),
    /// An import request with an unusable key.
    InvalidRequest(String),
    /// Not enough usable rows for a numeric estimate.
    InsufficientData(String),
    /// Measurement batch could not be mapped onto the canonical schema.
    Batch(BatchError),
    Geometry(GeometryError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSpecimen(id) => write!(f, "unknown specimen `{id}`"),
            Self::UnknownSlice(key) => write!(f, "no metadata for {key}"),
            Self::EmptySlice(key) => write!(f, "no features recorded for {key}"),
            Self::NoInteriorPoints(key) => {
                write!(f, "no feature inside the candidate radius for {key}")
            }
            Self::InvalidDivisionCount(value) => {
                write!(f, "division counts must be >= 1, got {value}")
            }
            Self::DegenerateBounds(key) => {
                write!(f, "features of {key} span a degenerate bounding box")
            }
            Self::ThetaMissing { key, incl_nb } => write!(
                f,
                "feature {incl_nb} of {key} has no azimuth; run recalibration first"
            ),
            Self::WrongCrossSection {
                specimen_id,
                expected,
            } => write!(
                f,
                "specimen `{specimen_id}` does not have a {expected:?} cross section"
            ),
            Self::InvalidBounds {
                x_min,
                x_max,
                y_min,
                y_max,
            } => write!(
                f,
                "invalid bounding rectangle x=[{x_min}, {x_max}] y=[{y_min}, {y_max}]"
            ),
            Self::InvalidDimensions(message) => write!(f, "invalid dimensions: {message}"),
            Self::InvalidRequest(message) => write!(f, "invalid request: {message}"),
            Self::InsufficientData(message) => write!(f, "insufficient data: {message}"),
            Self::Batch(err) => write!(f, "{err}"),
            Self::Geometry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Batch(err) => Some(err),
            Self::Geometry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BatchError> for ServiceError {
    fn from(value: BatchError) -> Self {
        Self::Batch(value)
    }
}

impl From<GeometryError> for ServiceError {
    fn from(value: GeometryError) -> Self {
        Self::Geometry(value)
    }
}

/// Schema/mapping errors of a measurement batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    /// The batch has no header line.
    EmptyBatch,
    /// A canonical column is absent after the fixed rename.
    MissingColumn(&'static str),
    /// A data cell could not be parsed as a number.
    BadNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
}

impl Display for BatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBatch => write!(f, "measurement batch is empty"),
            Self::MissingColumn(column) => {
                write!(f, "measurement batch lacks required column `{column}`")
            }
            Self::BadNumber {
                line,
                column,
                value,
            } => write!(
                f,
                "line {line}: cannot parse `{value}` in column `{column}`"
            ),
        }
    }
}

impl Error for BatchError {}
