//! Circular-specimen centering and polar-coordinate recalibration.
//!
//! # Responsibility
//! - Seed and refine the center/outer-radius calibration of a circular
//!   specimen from its scattered feature coordinates.
//! - Drive the analyst's review/confirm cycle through the `Prompter` and
//!   `ChartSink` contracts.
//!
//! # Invariants
//! - Abandoning at any step returns without producing a new snapshot;
//!   the database is untouched.
//! - On commit, every feature of the slice gets `r`/`theta` and features
//!   beyond the refined radius are stamped out-of-bounds.

use super::{ServiceError, ServiceResult};
use crate::config::Tunables;
use crate::geometry;
use crate::interact::{ChartSink, Figure, Prompter, Series};
use crate::model::{Calibration, Dataset, InclusionClass, SliceKey};
use log::info;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Azimuth of a point relative to a center, total over the plane.
///
/// On the vertical axis, where the quadrant-corrected arctangent is
/// undefined, the boundary resolves to `PI/2` above the center and
/// `3*PI/2` below; the degenerate point at the center itself maps to
/// `PI`.
pub fn polar_angle_or_axis(x: f64, y: f64, x_c: f64, y_c: f64) -> f64 {
    match geometry::polar_angle(x, y, x_c, y_c) {
        Ok(theta) => theta,
        Err(_) => {
            let dy = y - y_c;
            if dy > 0.0 {
                FRAC_PI_2
            } else if dy < 0.0 {
                3.0 * FRAC_PI_2
            } else {
                PI
            }
        }
    }
}

/// Starting calibration for the review loop: the stored one when it is
/// complete, otherwise the mean feature position with the nominal outer
/// radius.
pub fn seed_calibration(
    stored: Option<Calibration>,
    points: &[(f64, f64)],
    default_outer_radius_um: f64,
) -> Calibration {
    if let Some(calibration) = stored {
        return calibration;
    }

    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    Calibration {
        x_c: sum_x / n,
        y_c: sum_y / n,
        r_outer: default_outer_radius_um,
    }
}

/// Result of the pure refinement step.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub calibration: Calibration,
    /// `(r, theta)` per input point, relative to the refined center.
    pub polar: Vec<(f64, f64)>,
}

impl Refinement {
    /// Indices of points beyond the refined outer radius.
    pub fn outside_indices(&self) -> Vec<usize> {
        self.polar
            .iter()
            .enumerate()
            .filter(|(_, (r, _))| *r > self.calibration.r_outer)
            .map(|(index, _)| index)
            .collect()
    }
}

/// Refines an accepted candidate calibration.
///
/// Points inside the candidate radius define the new center as the
/// midpoint of their bounding box; polar coordinates are recomputed
/// against that center, and the outer radius tightens to the largest
/// radius among the previously interior points.
pub fn refine_calibration(
    key: &SliceKey,
    points: &[(f64, f64)],
    candidate: &Calibration,
) -> ServiceResult<Refinement> {
    let radii: Vec<f64> = points
        .iter()
        .map(|(x, y)| (x - candidate.x_c).hypot(y - candidate.y_c))
        .collect();

    let interior: Vec<usize> = radii
        .iter()
        .enumerate()
        .filter(|(_, r)| **r < candidate.r_outer)
        .map(|(index, _)| index)
        .collect();
    if interior.is_empty() {
        return Err(ServiceError::NoInteriorPoints(key.clone()));
    }

    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for &index in &interior {
        let (x, y) = points[index];
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    let x_c = (x_max + x_min) / 2.0;
    let y_c = (y_max + y_min) / 2.0;

    let polar: Vec<(f64, f64)> = points
        .iter()
        .map(|&(x, y)| {
            let r = (x - x_c).hypot(y - y_c);
            (r, polar_angle_or_axis(x, y, x_c, y_c))
        })
        .collect();

    // The radius tightens to the largest recomputed radius still inside
    // the previous threshold.
    let r_outer = polar
        .iter()
        .map(|(r, _)| *r)
        .filter(|r| *r < candidate.r_outer)
        .fold(f64::NEG_INFINITY, f64::max);
    if !r_outer.is_finite() {
        return Err(ServiceError::NoInteriorPoints(key.clone()));
    }

    Ok(Refinement {
        calibration: Calibration { x_c, y_c, r_outer },
        polar,
    })
}

/// Outcome of one recalibration session.
#[derive(Debug)]
pub enum Recalibrated {
    /// Accepted: the new snapshot plus what was committed.
    Committed {
        dataset: Dataset,
        calibration: Calibration,
        out_of_bounds: usize,
    },
    /// The analyst left the loop; nothing changed.
    Abandoned,
}

/// Runs the interactive review/confirm cycle for one circular slice.
///
/// Review loop: render candidate, then accept / edit the three fields /
/// abandon. Confirm step: render the refined inside/outside split, then
/// accept or abandon. Only the final accept produces a snapshot.
pub fn run_recalibration(
    dataset: &Dataset,
    key: &SliceKey,
    prompter: &mut dyn Prompter,
    chart: &mut dyn ChartSink,
    tunables: &Tunables,
) -> ServiceResult<Recalibrated> {
    let meta = dataset
        .meta_for(key)
        .ok_or_else(|| ServiceError::UnknownSlice(key.clone()))?;
    let rows = dataset.inclusions_for(key);
    if rows.is_empty() {
        return Err(ServiceError::EmptySlice(key.clone()));
    }
    let points: Vec<(f64, f64)> = rows.iter().map(|row| (row.x, row.y)).collect();

    let mut candidate = seed_calibration(
        meta.calibration(),
        &points,
        tunables.default_outer_radius_um,
    );

    loop {
        chart.render(&review_figure(key, &points, &candidate));
        let choice = prompter.choose(
            "Points outside the circle will be excluded; center and radius will be \
             recalculated. Proceed?",
            &["Yes", "No, adjust values manually"],
        );
        match choice {
            Some(0) => break,
            Some(1) => {
                let Some(next) = edit_calibration(prompter, &candidate) else {
                    return Ok(Recalibrated::Abandoned);
                };
                candidate = next;
            }
            _ => return Ok(Recalibrated::Abandoned),
        }
    }

    let refinement = refine_calibration(key, &points, &candidate)?;
    chart.render(&confirm_figure(key, &points, &refinement));

    let confirmed = prompter.choose(
        "Specimen limit accurately represented?",
        &["Yes, update the database"],
    );
    if confirmed != Some(0) {
        return Ok(Recalibrated::Abandoned);
    }

    let calibration = refinement.calibration;
    let mut next = dataset.clone();
    let mut out_of_bounds = 0usize;
    // Filter order matches the order the points were collected in above.
    let slice_rows = next
        .inclusions
        .iter_mut()
        .filter(|row| row.specimen_id == key.specimen_id && row.slice == key.slice);
    for (row, &(r, theta)) in slice_rows.zip(refinement.polar.iter()) {
        row.r = Some(r);
        row.theta = Some(theta);
        if r > calibration.r_outer {
            row.class = InclusionClass::OutOfBounds;
            out_of_bounds += 1;
        }
    }
    for meta in &mut next.meta {
        if meta.specimen_id == key.specimen_id && meta.slice == key.slice {
            meta.set_calibration(calibration);
        }
    }

    info!(
        "event=recalibrate module=service status=ok specimen={} slice={} x_c={:.1} y_c={:.1} r_outer={:.1} out_of_bounds={out_of_bounds}",
        key.specimen_id, key.slice, calibration.x_c, calibration.y_c, calibration.r_outer
    );
    Ok(Recalibrated::Committed {
        dataset: next,
        calibration,
        out_of_bounds,
    })
}

fn edit_calibration(prompter: &mut dyn Prompter, current: &Calibration) -> Option<Calibration> {
    let x_c = prompter.edit_f64("Center X (microns)", current.x_c)?;
    let y_c = prompter.edit_f64("Center Y (microns)", current.y_c)?;
    let r_outer = prompter.edit_f64("Exclusion radius (microns)", current.r_outer)?;
    Some(Calibration { x_c, y_c, r_outer })
}

fn circle_series(label: &str, calibration: &Calibration) -> Series {
    let points = (0..=100)
        .map(|step| {
            let theta = TAU * f64::from(step) / 100.0;
            (
                calibration.x_c + calibration.r_outer * theta.cos(),
                calibration.y_c + calibration.r_outer * theta.sin(),
            )
        })
        .collect();
    Series::new(label, points)
}

fn review_figure(key: &SliceKey, points: &[(f64, f64)], candidate: &Calibration) -> Figure {
    Figure {
        title: format!("Recalibration candidate, {key}"),
        x_label: "x (microns)".to_string(),
        y_label: "y (microns)".to_string(),
        series: vec![
            Series::new("Features", points.to_vec()),
            circle_series("Max radius", candidate),
            Series::new("Center", vec![(candidate.x_c, candidate.y_c)]),
        ],
    }
}

fn confirm_figure(key: &SliceKey, points: &[(f64, f64)], refinement: &Refinement) -> Figure {
    let outside = refinement.outside_indices();
    let inside_points: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .filter(|(index, _)| !outside.contains(index))
        .map(|(_, point)| *point)
        .collect();
    let outside_points: Vec<(f64, f64)> = outside.iter().map(|&index| points[index]).collect();
    let calibration = &refinement.calibration;

    Figure {
        title: format!("Refined calibration, {key}"),
        x_label: "x (microns)".to_string(),
        y_label: "y (microns)".to_string(),
        series: vec![
            Series::new("Features", inside_points),
            Series::new("Out of bounds", outside_points),
            circle_series("Outer radius", calibration),
            Series::new("Center", vec![(calibration.x_c, calibration.y_c)]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::{polar_angle_or_axis, refine_calibration, seed_calibration};
    use crate::model::{Calibration, SliceKey};
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn axis_guard_resolves_vertical_and_center_cases() {
        assert_eq!(polar_angle_or_axis(0.0, 5.0, 0.0, 0.0), FRAC_PI_2);
        assert_eq!(polar_angle_or_axis(0.0, -5.0, 0.0, 0.0), 3.0 * FRAC_PI_2);
        assert_eq!(polar_angle_or_axis(3.0, 7.0, 3.0, 7.0), PI);
    }

    #[test]
    fn seeding_prefers_the_stored_calibration() {
        let stored = Calibration {
            x_c: 10.0,
            y_c: 20.0,
            r_outer: 500.0,
        };
        let seeded = seed_calibration(Some(stored), &[(0.0, 0.0)], 6500.0);
        assert_eq!(seeded, stored);

        let fresh = seed_calibration(None, &[(0.0, 0.0), (10.0, 20.0)], 6500.0);
        assert_eq!(fresh.x_c, 5.0);
        assert_eq!(fresh.y_c, 10.0);
        assert_eq!(fresh.r_outer, 6500.0);
    }

    #[test]
    fn refinement_centers_on_interior_bounding_box() {
        let key = SliceKey::new("S1", 1);
        // Four interior points off-center plus one stray far away.
        let points = [
            (90.0, 10.0),
            (-110.0, 10.0),
            (-10.0, 110.0),
            (-10.0, -90.0),
            (4000.0, 4000.0),
        ];
        let candidate = Calibration {
            x_c: 0.0,
            y_c: 0.0,
            r_outer: 200.0,
        };

        let refinement = refine_calibration(&key, &points, &candidate).unwrap();
        assert!((refinement.calibration.x_c - -10.0).abs() < 1e-9);
        assert!((refinement.calibration.y_c - 10.0).abs() < 1e-9);
        assert!((refinement.calibration.r_outer - 100.0).abs() < 1e-9);
        assert_eq!(refinement.outside_indices(), vec![4]);
    }

    #[test]
    fn refinement_with_no_interior_point_is_an_error() {
        let key = SliceKey::new("S1", 1);
        let candidate = Calibration {
            x_c: 0.0,
            y_c: 0.0,
            r_outer: 1.0,
        };
        assert!(refine_calibration(&key, &[(50.0, 50.0)], &candidate).is_err());
    }
}
