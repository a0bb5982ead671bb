//! Derived statistics over the two tables.
//!
//! Thin, fixed-form numerical procedures: per-specimen summaries, a
//! log-space kernel density estimate of the size distribution, the
//! exponential-quantile transform used for extreme-value plots, and the
//! peak-over-threshold estimate of the exponential scale.

use super::{ServiceError, ServiceResult};
use crate::config::Tunables;
use crate::interact::Series;
use crate::model::{Dataset, Inclusion};
use std::f64::consts::TAU;

/// Per-specimen roll-up of the metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecimenSummary {
    pub specimen_id: String,
    pub slice_count: usize,
    pub total_area_mm2: f64,
}

pub fn specimen_summaries(dataset: &Dataset) -> Vec<SpecimenSummary> {
    dataset
        .specimen_ids()
        .into_iter()
        .map(|specimen_id| {
            let rows = dataset.meta_for_specimen(&specimen_id);
            SpecimenSummary {
                slice_count: rows.len(),
                total_area_mm2: rows.iter().map(|meta| meta.img_area_mm2).sum(),
                specimen_id,
            }
        })
        .collect()
}

/// Per-slice inclusion statistics, artifacts excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceStats {
    pub specimen_id: String,
    pub slice: u32,
    pub filename: String,
    pub area_mm2: f64,
    pub inclusion_count: usize,
    pub max_feret_um: f64,
    /// Summed inclusion area, square microns.
    pub total_incl_area_um2: f64,
    /// Inclusions per square millimeter.
    pub count_per_mm2: f64,
    /// Inclusion area fraction, scaled by 1e3 for readability.
    pub area_fraction_e3: f64,
}

/// Computes the per-slice statistics table, ordered by key.
pub fn slice_stats(dataset: &Dataset, exclude_porosity: bool) -> Vec<SliceStats> {
    let mut meta: Vec<_> = dataset.meta.iter().collect();
    meta.sort_by(|a, b| (&a.specimen_id, a.slice).cmp(&(&b.specimen_id, b.slice)));

    meta.into_iter()
        .map(|meta| {
            let key = meta.key();
            let rows: Vec<&Inclusion> = dataset
                .inclusions_for(&key)
                .into_iter()
                .filter(|row| row.class.counts_in_stats(exclude_porosity))
                .collect();
            let count = rows.len();
            let total_area: f64 = rows.iter().map(|row| row.area).sum();
            let max_feret = rows.iter().map(|row| row.feret).fold(0.0, f64::max);
            let area = meta.img_area_mm2;

            SliceStats {
                specimen_id: meta.specimen_id.clone(),
                slice: meta.slice,
                filename: meta.filename.clone(),
                area_mm2: area,
                inclusion_count: count,
                max_feret_um: max_feret,
                total_incl_area_um2: total_area,
                count_per_mm2: if area > 0.0 { count as f64 / area } else { 0.0 },
                area_fraction_e3: if area > 0.0 {
                    total_area / area / 1e3
                } else {
                    0.0
                },
            }
        })
        .collect()
}

/// Per-specimen densities for the comparison bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecimenDensity {
    pub specimen_id: String,
    pub count_per_mm2: f64,
    /// Inclusion area density, scaled by 1e3.
    pub area_density_e3: f64,
}

pub fn specimen_densities(
    dataset: &Dataset,
    specimens: Option<&[String]>,
    exclude_porosity: bool,
) -> Vec<SpecimenDensity> {
    dataset
        .specimen_ids()
        .into_iter()
        .filter(|id| specimens.map_or(true, |wanted| wanted.contains(id)))
        .map(|specimen_id| {
            let area: f64 = dataset
                .meta_for_specimen(&specimen_id)
                .iter()
                .map(|meta| meta.img_area_mm2)
                .sum();
            let rows: Vec<&Inclusion> = dataset
                .inclusions_for_specimen(&specimen_id)
                .into_iter()
                .filter(|row| row.class.counts_in_stats(exclude_porosity))
                .collect();
            let count = rows.len() as f64;
            let incl_area: f64 = rows.iter().map(|row| row.area).sum();

            SpecimenDensity {
                count_per_mm2: if area > 0.0 { count / area } else { 0.0 },
                area_density_e3: if area > 0.0 { incl_area / area / 1e3 } else { 0.0 },
                specimen_id,
            }
        })
        .collect()
}

/// Size measure of the density and quantile routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeParam {
    Feret,
    SqrArea,
}

impl SizeParam {
    pub fn label(self) -> &'static str {
        match self {
            Self::Feret => "Feret diameter (um)",
            Self::SqrArea => "Equivalent diameter sqrt(A) (um)",
        }
    }

    fn of(self, row: &Inclusion) -> f64 {
        match self {
            Self::Feret => row.feret,
            Self::SqrArea => row.sqr_area,
        }
    }
}

/// Gaussian kernel density estimate in log10 space with a fixed
/// covariance factor, evaluated at `x` (linear scale).
///
/// The bandwidth is `cov_factor` times the (weighted) standard deviation
/// of the log-transformed samples.
pub fn gaussian_kde_log10(
    samples: &[f64],
    weights: Option<&[f64]>,
    cov_factor: f64,
    x: f64,
) -> f64 {
    let logs: Vec<f64> = samples.iter().map(|value| value.log10()).collect();
    let weight_at = |index: usize| weights.map_or(1.0, |w| w[index]);
    let total_weight: f64 = (0..logs.len()).map(weight_at).sum();

    let mean: f64 = logs
        .iter()
        .enumerate()
        .map(|(index, value)| weight_at(index) * value)
        .sum::<f64>()
        / total_weight;
    let variance: f64 = logs
        .iter()
        .enumerate()
        .map(|(index, value)| weight_at(index) * (value - mean).powi(2))
        .sum::<f64>()
        / total_weight;
    let bandwidth = cov_factor * variance.sqrt();
    if !(bandwidth > 0.0) || !bandwidth.is_finite() {
        return 0.0;
    }

    let lx = x.log10();
    let norm = total_weight * bandwidth * (TAU).sqrt();
    logs.iter()
        .enumerate()
        .map(|(index, value)| {
            let z = (lx - value) / bandwidth;
            weight_at(index) * (-0.5 * z * z).exp()
        })
        .sum::<f64>()
        / norm
}

/// Inclusion size-density curve of one specimen, scaled to counts (or
/// inclusion area, when `weighted`) per micron per square millimeter.
#[allow(clippy::too_many_arguments)]
pub fn size_density(
    dataset: &Dataset,
    specimen_id: &str,
    param: SizeParam,
    weighted: bool,
    exclude_porosity: bool,
    x_range: (f64, f64),
    tunables: &Tunables,
) -> ServiceResult<Series> {
    let meta_rows = dataset.meta_for_specimen(specimen_id);
    if meta_rows.is_empty() {
        return Err(ServiceError::UnknownSpecimen(specimen_id.to_string()));
    }
    let area_mm2: f64 = meta_rows.iter().map(|meta| meta.img_area_mm2).sum();

    let rows: Vec<&Inclusion> = dataset
        .inclusions_for_specimen(specimen_id)
        .into_iter()
        .filter(|row| row.class.counts_in_stats(exclude_porosity))
        .filter(|row| param.of(row) > 0.0)
        .collect();
    if rows.len() < 2 || area_mm2 <= 0.0 {
        return Err(ServiceError::InsufficientData(format!(
            "specimen `{specimen_id}` has too few usable features for a density estimate"
        )));
    }

    let sizes: Vec<f64> = rows.iter().map(|row| param.of(row)).collect();
    let spread = sizes.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, v| {
        (acc.0.min(*v), acc.1.max(*v))
    });
    if spread.0 == spread.1 {
        return Err(ServiceError::InsufficientData(format!(
            "specimen `{specimen_id}` features all share one size; no bandwidth"
        )));
    }
    let areas: Vec<f64> = rows.iter().map(|row| row.area).collect();
    let scale = if weighted {
        areas.iter().sum::<f64>() / area_mm2
    } else {
        sizes.len() as f64 / area_mm2
    };
    let weights = weighted.then_some(areas.as_slice());

    let (x_min, x_max) = x_range;
    let n = tunables.kde_grid_points.max(2);
    let points: Vec<(f64, f64)> = (0..n)
        .map(|step| {
            let x = x_min + (x_max - x_min) * step as f64 / (n - 1) as f64;
            let density =
                gaussian_kde_log10(&sizes, weights, tunables.kde_covariance_factor, x);
            (x, density * scale)
        })
        .collect();

    Ok(Series::new(specimen_id, points))
}

/// Exponential-quantile transform for extreme-value plots: values sorted
/// ascending, paired with `-ln(1 - i/(n+1))`.
pub fn exponential_quantiles(values: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let p = (index + 1) as f64 / (n + 1.0);
            (value, -(1.0 - p).ln())
        })
        .collect()
}

/// One exponential-quantile series per specimen, for the extreme-value
/// comparison chart.
pub fn quantile_series(
    dataset: &Dataset,
    param: SizeParam,
    exclude_artifacts: bool,
) -> Vec<Series> {
    dataset
        .specimen_ids()
        .into_iter()
        .filter_map(|specimen_id| {
            let values: Vec<f64> = dataset
                .inclusions_for_specimen(&specimen_id)
                .into_iter()
                .filter(|row| !exclude_artifacts || !row.class.is_artifact())
                .map(|row| param.of(row))
                .collect();
            if values.is_empty() {
                return None;
            }
            Some(Series::new(
                specimen_id.replace('_', " "),
                exponential_quantiles(&values),
            ))
        })
        .collect()
}

/// Maximum-likelihood estimate of the exponential scale, fitted on the
/// `k` largest values with the peak-over-threshold method. The threshold
/// is the k-th largest value itself.
pub fn mle_exponential_scale(values: &[f64], k: usize) -> Option<f64> {
    if k == 0 || k > values.len() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    sorted.truncate(k);

    let threshold = *sorted.last()?;
    let excess: f64 = sorted.iter().map(|value| value - threshold).sum();
    Some(excess / k as f64)
}

#[cfg(test)]
mod tests {
    use super::{
        exponential_quantiles, gaussian_kde_log10, mle_exponential_scale, SizeParam,
    };

    #[test]
    fn quantiles_use_the_n_plus_one_plotting_position() {
        let points = exponential_quantiles(&[30.0, 10.0, 20.0]);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].0, 10.0);
        assert_eq!(points[2].0, 30.0);
        assert!((points[0].1 - -(1.0f64 - 0.25).ln()).abs() < 1e-12);
        assert!((points[2].1 - -(1.0f64 - 0.75).ln()).abs() < 1e-12);
    }

    #[test]
    fn mle_scale_is_the_mean_excess_over_the_threshold() {
        // Top 3 of the sample: 50, 40, 30; threshold 30; mean excess 10.
        let values = [10.0, 30.0, 50.0, 20.0, 40.0];
        let sigma = mle_exponential_scale(&values, 3).unwrap();
        assert!((sigma - 10.0).abs() < 1e-12);

        assert!(mle_exponential_scale(&values, 0).is_none());
        assert!(mle_exponential_scale(&values, 6).is_none());
    }

    #[test]
    fn kde_peaks_near_the_sample_mass() {
        let samples = [10.0, 11.0, 9.5, 10.5];
        let near = gaussian_kde_log10(&samples, None, 0.18, 10.0);
        let far = gaussian_kde_log10(&samples, None, 0.18, 100.0);
        assert!(near > far);
        assert!(far >= 0.0);
    }

    #[test]
    fn kde_weighting_shifts_mass_toward_heavy_samples() {
        let samples = [10.0, 100.0];
        let weights = [1.0, 9.0];
        let unweighted = gaussian_kde_log10(&samples, None, 0.3, 100.0);
        let weighted = gaussian_kde_log10(&samples, Some(&weights), 0.3, 100.0);
        assert!(weighted > unweighted);
    }

    #[test]
    fn size_param_labels_are_distinct() {
        assert_ne!(SizeParam::Feret.label(), SizeParam::SqrArea.label());
    }
}
