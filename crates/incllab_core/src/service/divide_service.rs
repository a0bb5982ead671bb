//! Spatial-division assignment for per-region statistics.
//!
//! # Responsibility
//! - Partition every feature of one specimen into grid cells
//!   (rectangular sections) or angular sectors (circular sections).
//! - Update the specimen's metadata rows with the division layout.
//!
//! # Invariants
//! - Division counts are validated before the snapshot is touched.
//! - The rectangular grid is re-derived per slice from that slice's own
//!   bounding box, so differently sized slice images still populate the
//!   full grid.
//! - The angular path never defaults a missing azimuth; recalibration
//!   must have run first.

use super::{ServiceError, ServiceResult};
use crate::config::Tunables;
use crate::geometry;
use crate::model::{CrossSection, Dataset, SliceKey};
use log::info;

/// Change summary of a division pass over one specimen.
#[derive(Debug, Clone, PartialEq)]
pub struct DivisionSummary {
    pub specimen_id: String,
    pub n_divis_x: u32,
    pub n_divis_y: u32,
    pub rows_assigned: usize,
}

/// Per-specimen overview used by the selection listing: mean dimensions
/// and the current division layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DivisionOverview {
    pub specimen_id: String,
    pub cross_section: CrossSection,
    pub mean_width_um: f64,
    pub mean_height_um: f64,
    pub mean_area_mm2: f64,
    pub n_divis_x: u32,
    pub n_divis_y: u32,
    /// Zero while divisions are unset.
    pub area_per_division_mm2: f64,
}

/// Summarizes every specimen for the division-selection listing.
pub fn division_overview(dataset: &Dataset) -> Vec<DivisionOverview> {
    dataset
        .specimen_ids()
        .into_iter()
        .map(|specimen_id| {
            let rows = dataset.meta_for_specimen(&specimen_id);
            let n = rows.len() as f64;
            let mean = |f: fn(&&crate::model::SliceMeta) -> f64| {
                rows.iter().map(f).sum::<f64>() / n
            };
            let first = rows[0];
            let n_divis_x = first.n_divis_x;
            let n_divis_y = first.n_divis_y;
            let mean_area = mean(|meta| meta.img_area_mm2);
            let cells = n_divis_x * n_divis_y.max(1);
            DivisionOverview {
                cross_section: first.cross_section(),
                mean_width_um: mean(|meta| meta.img_width),
                mean_height_um: mean(|meta| meta.img_height),
                mean_area_mm2: mean_area,
                n_divis_x,
                n_divis_y,
                area_per_division_mm2: if cells == 0 {
                    0.0
                } else {
                    mean_area / f64::from(cells)
                },
                specimen_id,
            }
        })
        .collect()
}

/// Assigns grid-cell divisions to every feature of a rectangular
/// specimen.
///
/// The grid counts are specimen-wide; the bin sizes are re-derived per
/// slice from that slice's bounding box, widened by the sizing margin so
/// features exactly at the recorded maximum stay inside the last bin.
pub fn divide_rectangular(
    dataset: &Dataset,
    specimen_id: &str,
    n_divis_x: u32,
    n_divis_y: u32,
    tunables: &Tunables,
) -> ServiceResult<(Dataset, DivisionSummary)> {
    if n_divis_x == 0 || n_divis_y == 0 {
        return Err(ServiceError::InvalidDivisionCount(n_divis_x.min(n_divis_y)));
    }
    let meta_rows = dataset.meta_for_specimen(specimen_id);
    if meta_rows.is_empty() {
        return Err(ServiceError::UnknownSpecimen(specimen_id.to_string()));
    }
    if meta_rows
        .iter()
        .any(|meta| meta.cross_section() != CrossSection::Rectangular)
    {
        return Err(ServiceError::WrongCrossSection {
            specimen_id: specimen_id.to_string(),
            expected: CrossSection::Rectangular,
        });
    }

    // Size the grid of every slice before mutating anything.
    let mut grids: Vec<(u32, f64, f64, f64, f64)> = Vec::new();
    for slice in dataset.slice_numbers(specimen_id) {
        let key = SliceKey::new(specimen_id, slice);
        let rows = dataset.inclusions_for(&key);
        if rows.is_empty() {
            continue;
        }

        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for row in &rows {
            x_min = x_min.min(row.x);
            x_max = x_max.max(row.x);
            y_min = y_min.min(row.y);
            y_max = y_max.max(row.y);
        }

        let div_width = (x_max - x_min) * tunables.division_margin / f64::from(n_divis_x);
        let div_height = (y_max - y_min) * tunables.division_margin / f64::from(n_divis_y);
        if div_width <= 0.0 || div_height <= 0.0 {
            return Err(ServiceError::DegenerateBounds(key));
        }
        grids.push((slice, x_min, y_min, div_width, div_height));
    }

    let mut next = dataset.clone();
    let mut rows_assigned = 0usize;
    for (slice, x_min, y_min, div_width, div_height) in grids {
        for row in next
            .inclusions
            .iter_mut()
            .filter(|row| row.specimen_id == specimen_id && row.slice == slice)
        {
            row.division = geometry::rect_division_index(
                row.x - x_min,
                row.y - y_min,
                div_width,
                div_height,
                n_divis_x,
            )?;
            rows_assigned += 1;
        }
    }

    for meta in &mut next.meta {
        if meta.specimen_id == specimen_id {
            meta.n_divis_x = n_divis_x;
            meta.n_divis_y = n_divis_y;
            meta.divis_area_mm2 = meta.derived_division_area_mm2();
        }
    }

    info!(
        "event=divide module=service status=ok specimen={specimen_id} kind=rectangular nx={n_divis_x} ny={n_divis_y} rows={rows_assigned}"
    );
    Ok((
        next,
        DivisionSummary {
            specimen_id: specimen_id.to_string(),
            n_divis_x,
            n_divis_y,
            rows_assigned,
        },
    ))
}

/// Assigns angular-sector divisions to every feature of a circular
/// specimen.
///
/// # Errors
/// - `ThetaMissing` when any feature of the specimen has no azimuth yet;
///   sector assignment is meaningless before recalibration.
pub fn divide_circular(
    dataset: &Dataset,
    specimen_id: &str,
    n_divis: u32,
) -> ServiceResult<(Dataset, DivisionSummary)> {
    if n_divis == 0 {
        return Err(ServiceError::InvalidDivisionCount(n_divis));
    }
    let meta_rows = dataset.meta_for_specimen(specimen_id);
    if meta_rows.is_empty() {
        return Err(ServiceError::UnknownSpecimen(specimen_id.to_string()));
    }
    if meta_rows
        .iter()
        .any(|meta| meta.cross_section() != CrossSection::Circular)
    {
        return Err(ServiceError::WrongCrossSection {
            specimen_id: specimen_id.to_string(),
            expected: CrossSection::Circular,
        });
    }

    for row in dataset.inclusions_for_specimen(specimen_id) {
        if row.theta.is_none() {
            return Err(ServiceError::ThetaMissing {
                key: row.key(),
                incl_nb: row.incl_nb,
            });
        }
    }

    let mut next = dataset.clone();
    let mut rows_assigned = 0usize;
    for row in next
        .inclusions
        .iter_mut()
        .filter(|row| row.specimen_id == specimen_id)
    {
        if let Some(theta) = row.theta {
            row.division = geometry::angular_division_index(theta, n_divis);
            rows_assigned += 1;
        }
    }

    for meta in &mut next.meta {
        if meta.specimen_id == specimen_id {
            meta.n_divis_x = n_divis;
            meta.divis_area_mm2 = meta.derived_division_area_mm2();
        }
    }

    info!(
        "event=divide module=service status=ok specimen={specimen_id} kind=circular n={n_divis} rows={rows_assigned}"
    );
    Ok((
        next,
        DivisionSummary {
            specimen_id: specimen_id.to_string(),
            n_divis_x: n_divis,
            n_divis_y: 0,
            rows_assigned,
        },
    ))
}
