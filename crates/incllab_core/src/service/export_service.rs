//! Spreadsheet export of the flattened per-slice summary.
//!
//! A reporting view over Meta+Data, not part of the correction core: one
//! CSV row per measurement pass with area, counts and densities.

use super::stats_service::{slice_stats, SliceStats};
use crate::model::Dataset;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fmt::Write as _;
use std::path::Path;

/// Errors of the export sink.
#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to write export file: {err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
        }
    }
}

/// Builds the summary spreadsheet as CSV text, one row per slice.
///
/// `specimens` restricts the export when given; artifacts are always
/// excluded from the counts, porosity per `exclude_porosity`.
pub fn summary_csv(
    dataset: &Dataset,
    specimens: Option<&[String]>,
    exclude_porosity: bool,
) -> String {
    let mut csv = String::from(
        "specimen_id,slice,filename,img_area_mm2,incl_count,total_incl_area_mm2,incl_per_mm2,incl_area_fract\n",
    );

    for stats in slice_stats(dataset, exclude_porosity) {
        if let Some(wanted) = specimens {
            if !wanted.contains(&stats.specimen_id) {
                continue;
            }
        }
        let _ = writeln!(csv, "{}", csv_row(&stats));
    }

    csv
}

fn csv_row(stats: &SliceStats) -> String {
    // Inclusion areas are measured in square microns; the export reports
    // them in square millimeters alongside the analysed area.
    let total_incl_area_mm2 = stats.total_incl_area_um2 / 1e6;
    let area_fraction = if stats.area_mm2 > 0.0 {
        total_incl_area_mm2 / stats.area_mm2
    } else {
        0.0
    };
    format!(
        "{},{},{},{:.6},{},{:.6},{:.6},{:.8}",
        csv_field(&stats.specimen_id),
        stats.slice,
        csv_field(&stats.filename),
        stats.area_mm2,
        stats.inclusion_count,
        total_incl_area_mm2,
        stats.count_per_mm2,
        area_fraction,
    )
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes the summary spreadsheet to disk.
pub fn export_summary(
    dataset: &Dataset,
    path: impl AsRef<Path>,
    specimens: Option<&[String]>,
    exclude_porosity: bool,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let csv = summary_csv(dataset, specimens, exclude_porosity);
    std::fs::write(path, csv).map_err(ExportError::Io)?;
    info!(
        "event=export_summary module=service status=ok path={}",
        path.display()
    );
    Ok(())
}
