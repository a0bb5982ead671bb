//! Measurement-batch import and slice maintenance.
//!
//! # Responsibility
//! - Map a raw measurement batch onto the canonical data schema and merge
//!   it into the snapshot, replacing any prior pass of the same slice.
//! - Remove a slice (meta and data together) and exclude rectangular
//!   zones from an analysed image.
//!
//! # Invariants
//! - The column rename is fixed and exhaustive; a missing canonical
//!   column rejects the whole batch.
//! - Re-import is a wholesale replacement: prior classification, polar
//!   coordinates and divisions of the slice are discarded by design.

use super::{BatchError, ServiceError, ServiceResult};
use crate::model::{Dataset, Inclusion, InclusionClass, SliceKey, SliceMeta};
use log::info;
use std::f64::consts::PI;

/// Physical dimensions of an analysed cross section, as entered by the
/// analyst at import time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecimenDims {
    /// Rectangular section, microns.
    Rectangular { width_um: f64, height_um: f64 },
    /// Circular (annular) section, microns. `r_inner_um` is zero for a
    /// full disc.
    Circular { r_outer_um: f64, r_inner_um: f64 },
}

impl SpecimenDims {
    fn validate(&self) -> ServiceResult<()> {
        match *self {
            Self::Rectangular { width_um, height_um } => {
                if !(width_um.is_finite() && height_um.is_finite()) {
                    return Err(ServiceError::InvalidDimensions(
                        "dimensions must be finite".to_string(),
                    ));
                }
                if width_um < 1.0 {
                    return Err(ServiceError::InvalidDimensions(format!(
                        "rectangular width must be at least 1 micron, got {width_um} \
                         (zero width marks a circular section)"
                    )));
                }
                if height_um <= 0.0 {
                    return Err(ServiceError::InvalidDimensions(format!(
                        "height must be positive, got {height_um}"
                    )));
                }
                Ok(())
            }
            Self::Circular {
                r_outer_um,
                r_inner_um,
            } => {
                if !(r_outer_um.is_finite() && r_inner_um.is_finite()) {
                    return Err(ServiceError::InvalidDimensions(
                        "radii must be finite".to_string(),
                    ));
                }
                if r_outer_um <= 0.0 || r_inner_um < 0.0 || r_inner_um >= r_outer_um {
                    return Err(ServiceError::InvalidDimensions(format!(
                        "radii must satisfy 0 <= inner < outer, got inner={r_inner_um} \
                         outer={r_outer_um}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Analysed area in square millimeters.
    pub fn area_mm2(&self) -> f64 {
        match *self {
            Self::Rectangular { width_um, height_um } => width_um * height_um / 1e6,
            Self::Circular {
                r_outer_um,
                r_inner_um,
            } => PI * (r_outer_um * r_outer_um - r_inner_um * r_inner_um) / 1e6,
        }
    }

    /// Width stored in the metadata row; zero is the circular sentinel.
    pub fn recorded_width_um(&self) -> f64 {
        match *self {
            Self::Rectangular { width_um, .. } => width_um,
            Self::Circular { .. } => 0.0,
        }
    }

    /// Height stored in the metadata row. Circular sections record the
    /// equivalent height of a square of the same area, back-converted to
    /// microns for symmetry with rectangular rows.
    pub fn recorded_height_um(&self) -> f64 {
        match *self {
            Self::Rectangular { height_um, .. } => height_um,
            Self::Circular { .. } => (self.area_mm2() / PI).sqrt() * 1000.0,
        }
    }
}

/// One canonical row parsed out of a measurement batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub incl_nb: u32,
    pub x: f64,
    pub y: f64,
    pub area: f64,
    pub feret: f64,
    pub min_feret: f64,
    pub feret_angle: f64,
    pub circ: f64,
    pub roundness: f64,
    pub ar: f64,
    pub solid: f64,
}

/// Canonical columns and the raw header names the measurement tool uses
/// for them. The first column of the tool's export carries the feature
/// sequence under a blank or `ID` header.
const COLUMN_MAP: &[(&str, &[&str])] = &[
    ("seq", &["", "ID"]),
    ("Area", &["Area"]),
    ("X", &["X"]),
    ("Y", &["Y"]),
    ("Feret", &["Feret"]),
    ("MinFeret", &["MinFeret"]),
    ("FeretAngle", &["FeretAngle"]),
    ("Circ.", &["Circ."]),
    ("AR", &["AR"]),
    ("Round", &["Round"]),
    ("Solidity", &["Solidity"]),
];

/// Parses the measurement tool's CSV export into canonical rows.
///
/// Rows without a feature-sequence value are malformed leftovers of the
/// measurement tool and are dropped; any other unparseable cell rejects
/// the batch.
pub fn parse_measurement_batch(text: &str) -> Result<Vec<MeasurementRow>, BatchError> {
    let mut lines = text.lines().enumerate();
    let header = loop {
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => continue,
            Some((_, line)) => break line,
            None => return Err(BatchError::EmptyBatch),
        }
    };

    let headers: Vec<&str> = header.split(',').map(str::trim).collect();
    let mut positions = [0usize; COLUMN_MAP.len()];
    for (slot, (canonical, raw_names)) in COLUMN_MAP.iter().enumerate() {
        let position = headers
            .iter()
            .position(|header| raw_names.contains(header))
            .ok_or(BatchError::MissingColumn(canonical))?;
        positions[slot] = position;
    }

    let mut rows = Vec::new();
    for (index, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();

        let seq_cell = cells.get(positions[0]).copied().unwrap_or("");
        if seq_cell.is_empty() {
            // Malformed row from the measurement tool.
            continue;
        }
        let incl_nb = parse_sequence(seq_cell, index + 1)?;

        let mut numbers = [0.0f64; 10];
        for (slot, value) in numbers.iter_mut().enumerate() {
            let (canonical, _) = COLUMN_MAP[slot + 1];
            let cell = cells.get(positions[slot + 1]).copied().unwrap_or("");
            *value = cell.parse().map_err(|_| BatchError::BadNumber {
                line: index + 1,
                column: canonical,
                value: cell.to_string(),
            })?;
        }

        rows.push(MeasurementRow {
            incl_nb,
            area: numbers[0],
            x: numbers[1],
            y: numbers[2],
            feret: numbers[3],
            min_feret: numbers[4],
            feret_angle: numbers[5],
            circ: numbers[6],
            ar: numbers[7],
            roundness: numbers[8],
            solid: numbers[9],
        });
    }

    Ok(rows)
}

fn parse_sequence(cell: &str, line: usize) -> Result<u32, BatchError> {
    let bad = || BatchError::BadNumber {
        line,
        column: "seq",
        value: cell.to_string(),
    };

    if let Ok(value) = cell.parse::<u32>() {
        return Ok(value);
    }
    // Some exports write the sequence as a float.
    let value = cell.parse::<f64>().map_err(|_| bad())?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(bad());
    }
    Ok(value as u32)
}

/// One import: key, source batch and physical dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub specimen_id: String,
    pub slice: u32,
    pub filename: String,
    pub dims: SpecimenDims,
}

/// Change summary of a completed import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub key: SliceKey,
    pub rows_imported: usize,
    /// Data rows of a prior pass of the same slice that were discarded.
    pub rows_replaced: usize,
    pub area_mm2: f64,
}

/// Merges a measurement batch into the snapshot, wholesale-replacing any
/// existing pass of the same specimen+slice.
pub fn import_batch(
    dataset: &Dataset,
    request: &ImportRequest,
    rows: &[MeasurementRow],
) -> ServiceResult<(Dataset, ImportSummary)> {
    if request.specimen_id.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(
            "specimen id must not be blank".to_string(),
        ));
    }
    if request.slice == 0 {
        return Err(ServiceError::InvalidRequest(
            "slice numbers start at 1".to_string(),
        ));
    }
    request.dims.validate()?;

    let key = SliceKey::new(request.specimen_id.clone(), request.slice);
    let meta = SliceMeta::new_import(
        request.specimen_id.clone(),
        request.slice,
        request.filename.clone(),
        request.dims.recorded_width_um(),
        request.dims.recorded_height_um(),
        request.dims.area_mm2(),
    );

    let inclusions: Vec<Inclusion> = rows
        .iter()
        .map(|row| Inclusion {
            specimen_id: request.specimen_id.clone(),
            slice: request.slice,
            incl_nb: row.incl_nb,
            x: row.x,
            y: row.y,
            area: row.area,
            sqr_area: row.area.sqrt(),
            feret: row.feret,
            min_feret: row.min_feret,
            feret_angle: row.feret_angle,
            circ: row.circ,
            roundness: row.roundness,
            ar: row.ar,
            solid: row.solid,
            class: InclusionClass::Unclassified,
            r: None,
            theta: None,
            division: 0,
        })
        .collect();

    let mut next = dataset.clone();
    let rows_replaced = next.replace_slice(meta, inclusions);

    let summary = ImportSummary {
        key: key.clone(),
        rows_imported: rows.len(),
        rows_replaced,
        area_mm2: request.dims.area_mm2(),
    };
    info!(
        "event=import_slice module=service status=ok specimen={} slice={} file={} rows={} replaced={} area_mm2={:.4}",
        key.specimen_id,
        key.slice,
        request.filename,
        summary.rows_imported,
        summary.rows_replaced,
        summary.area_mm2
    );

    Ok((next, summary))
}

/// Change summary of a slice removal.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalSummary {
    pub key: SliceKey,
    pub meta_rows: usize,
    pub data_rows: usize,
}

/// Deletes a slice's metadata row and every matching data row together.
pub fn remove_slice(dataset: &Dataset, key: &SliceKey) -> ServiceResult<(Dataset, RemovalSummary)> {
    if dataset.meta_for(key).is_none() {
        return Err(ServiceError::UnknownSlice(key.clone()));
    }

    let mut next = dataset.clone();
    let (meta_rows, data_rows) = next.remove_slice(key);

    info!(
        "event=remove_slice module=service status=ok specimen={} slice={} data_rows={data_rows}",
        key.specimen_id, key.slice
    );
    Ok((
        next,
        RemovalSummary {
            key: key.clone(),
            meta_rows,
            data_rows,
        },
    ))
}

/// Axis-aligned rectangle excluded from an analysed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExclusionRect {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl ExclusionRect {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> ServiceResult<Self> {
        let finite = [x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite());
        if !finite || x_max < x_min || y_max < y_min {
            return Err(ServiceError::InvalidBounds {
                x_min,
                x_max,
                y_min,
                y_max,
            });
        }
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    pub fn area_mm2(&self) -> f64 {
        (self.x_max - self.x_min) * (self.y_max - self.y_min) / 1e6
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        x > self.x_min && x < self.x_max && y > self.y_min && y < self.y_max
    }
}

/// Change summary of a zone exclusion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionSummary {
    pub key: SliceKey,
    pub rows_removed: usize,
    pub area_removed_mm2: f64,
}

/// Removes every feature strictly inside the rectangle and subtracts the
/// rectangle's area from the slice's analysed area.
pub fn exclude_zone(
    dataset: &Dataset,
    key: &SliceKey,
    rect: &ExclusionRect,
) -> ServiceResult<(Dataset, ExclusionSummary)> {
    if dataset.meta_for(key).is_none() {
        return Err(ServiceError::UnknownSlice(key.clone()));
    }

    let mut next = dataset.clone();
    let before = next.inclusions.len();
    next.inclusions.retain(|row| {
        !(row.specimen_id == key.specimen_id
            && row.slice == key.slice
            && rect.contains(row.x, row.y))
    });
    let rows_removed = before - next.inclusions.len();

    let area_removed_mm2 = rect.area_mm2();
    for meta in &mut next.meta {
        if meta.specimen_id == key.specimen_id && meta.slice == key.slice {
            meta.img_area_mm2 -= area_removed_mm2;
        }
    }

    info!(
        "event=exclude_zone module=service status=ok specimen={} slice={} rows={rows_removed} area_mm2={area_removed_mm2:.4}",
        key.specimen_id, key.slice
    );
    Ok((
        next,
        ExclusionSummary {
            key: key.clone(),
            rows_removed,
            area_removed_mm2,
        },
    ))
}
