//! Stateless geometric routines shared by the correction services.
//!
//! # Responsibility
//! - Convert image-local cartesian coordinates to polar coordinates with
//!   quadrant correction.
//! - Map coordinates to rectangular grid cells and angular sectors.
//!
//! # Invariants
//! - `polar_angle` results lie in `[0, 2*PI)`.
//! - Division ids are 1-based; `0` is reserved for "not assigned".

use std::error::Error;
use std::f64::consts::{PI, TAU};
use std::fmt::{Display, Formatter};

pub type GeometryResult<T> = Result<T, GeometryError>;

/// Domain errors of the pure geometric routines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    /// The point lies on the vertical axis through the center
    /// (`x == x_c`), where the quadrant-corrected arctangent is undefined.
    UndefinedAzimuth,
    /// A division grid was sized with a non-positive bin dimension.
    NonPositiveBin { div_width: f64, div_height: f64 },
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UndefinedAzimuth => {
                write!(f, "azimuth undefined for a point on the center vertical axis")
            }
            Self::NonPositiveBin {
                div_width,
                div_height,
            } => write!(
                f,
                "division bins must have positive dimensions, got {div_width} x {div_height}"
            ),
        }
    }
}

impl Error for GeometryError {}

/// Returns the azimuth of `(x, y)` relative to the center `(x_c, y_c)`.
///
/// The raw arctangent lies in `(-PI/2, PI/2)`; the left half-plane is
/// shifted by `PI` and the lower-right quadrant by `2*PI`, so the result
/// covers `[0, 2*PI)`.
///
/// # Errors
/// - `UndefinedAzimuth` when `x == x_c`. Callers that must stay total on
///   the vertical axis decide the boundary value themselves (the
///   recalibration service maps it to `PI/2`, `3*PI/2` or `PI`).
pub fn polar_angle(x: f64, y: f64, x_c: f64, y_c: f64) -> GeometryResult<f64> {
    let dx = x - x_c;
    let dy = y - y_c;
    if dx == 0.0 {
        return Err(GeometryError::UndefinedAzimuth);
    }

    let theta = (dy / dx).atan();
    if dx < 0.0 {
        Ok(PI + theta)
    } else if dy < 0.0 {
        Ok(TAU + theta)
    } else {
        Ok(theta)
    }
}

/// Returns the 1-based grid-cell id of a point inside a rectangular
/// division grid with `n_divis_x` columns.
///
/// `x` and `y` must already be translated so the slice's bounding-box
/// minimum is the local origin; bin dimensions carry the sizing margin so
/// a point exactly at the recorded maximum stays inside the last bin.
pub fn rect_division_index(
    x: f64,
    y: f64,
    div_width: f64,
    div_height: f64,
    n_divis_x: u32,
) -> GeometryResult<u32> {
    if div_width <= 0.0 || div_height <= 0.0 {
        return Err(GeometryError::NonPositiveBin {
            div_width,
            div_height,
        });
    }

    let cx = (x / div_width).floor() as i64;
    let cy = (y / div_height).floor() as i64;
    Ok((cx + 1 + cy * i64::from(n_divis_x)) as u32)
}

/// Returns the 1-based angular-sector id of an azimuth in `[0, 2*PI)`,
/// partitioning the full circle into `n_divis` equal half-open sectors.
pub fn angular_division_index(theta: f64, n_divis: u32) -> u32 {
    let sector = TAU / f64::from(n_divis);
    let id = (theta / sector).floor() as u32 + 1;
    id.min(n_divis)
}

/// Axis-aligned crop box around a feature, used for visual inspection and
/// classifier inference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropWindow {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl CropWindow {
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Computes the crop box of a feature from its feret measurements.
///
/// The box spans twice the feret projection on each axis, clamped from
/// below by the minimum feret so needle-shaped features still get a
/// usable crop in their thin direction.
pub fn crop_window(x: f64, y: f64, feret: f64, min_feret: f64, feret_angle_deg: f64) -> CropWindow {
    let angle = feret_angle_deg.to_radians();
    let width = (feret * angle.cos()).abs().max(min_feret) * 2.0;
    let height = (feret * angle.sin()).abs().max(min_feret) * 2.0;

    CropWindow {
        x_min: x - width / 2.0,
        x_max: x + width / 2.0,
        y_min: y - height / 2.0,
        y_max: y + height / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        angular_division_index, crop_window, polar_angle, rect_division_index, GeometryError,
    };
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    const EPS: f64 = 1e-9;

    #[test]
    fn polar_angle_covers_all_quadrants() {
        assert!((polar_angle(1.0, 0.0, 0.0, 0.0).unwrap() - 0.0).abs() < EPS);
        assert!((polar_angle(1.0, 1.0, 0.0, 0.0).unwrap() - PI / 4.0).abs() < EPS);
        assert!((polar_angle(-1.0, 1.0, 0.0, 0.0).unwrap() - 3.0 * PI / 4.0).abs() < EPS);
        assert!((polar_angle(-1.0, 0.0, 0.0, 0.0).unwrap() - PI).abs() < EPS);
        assert!((polar_angle(-1.0, -1.0, 0.0, 0.0).unwrap() - 5.0 * PI / 4.0).abs() < EPS);
        assert!((polar_angle(1.0, -1.0, 0.0, 0.0).unwrap() - 7.0 * PI / 4.0).abs() < EPS);
    }

    #[test]
    fn polar_angle_rejects_vertical_axis() {
        assert_eq!(
            polar_angle(2.0, 5.0, 2.0, 0.0),
            Err(GeometryError::UndefinedAzimuth)
        );
    }

    #[test]
    fn polar_angle_round_trips_to_cartesian() {
        let center = (12.5, -3.0);
        for &(x, y) in &[(40.0, 7.0), (-18.0, 2.0), (-5.0, -44.0), (90.0, -0.5)] {
            let theta = polar_angle(x, y, center.0, center.1).unwrap();
            assert!((0.0..TAU).contains(&theta));

            let r = (x - center.0).hypot(y - center.1);
            assert!((center.0 + r * theta.cos() - x).abs() < 1e-9);
            assert!((center.1 + r * theta.sin() - y).abs() < 1e-9);
        }
    }

    #[test]
    fn rect_index_walks_row_major() {
        // 3 x 2 grid with 10 x 10 bins.
        assert_eq!(rect_division_index(0.0, 0.0, 10.0, 10.0, 3).unwrap(), 1);
        assert_eq!(rect_division_index(25.0, 0.0, 10.0, 10.0, 3).unwrap(), 3);
        assert_eq!(rect_division_index(0.0, 15.0, 10.0, 10.0, 3).unwrap(), 4);
        assert_eq!(rect_division_index(25.0, 15.0, 10.0, 10.0, 3).unwrap(), 6);
    }

    #[test]
    fn rect_index_is_monotonic_in_both_axes() {
        let mut previous = 0;
        for step in 0..10 {
            let x = f64::from(step) * 3.3;
            let id = rect_division_index(x, 0.0, 5.0, 5.0, 8).unwrap();
            assert!(id >= previous);
            previous = id;
        }

        let low = rect_division_index(1.0, 2.0, 5.0, 5.0, 8).unwrap();
        let high = rect_division_index(1.0, 22.0, 5.0, 5.0, 8).unwrap();
        assert!(high > low);
    }

    #[test]
    fn rect_index_keeps_recorded_maximum_inside_last_bin() {
        // Span 100 sized with the 1.01 margin over 4 bins per axis.
        let div = 100.0 * 1.01 / 4.0;
        let id = rect_division_index(100.0, 100.0, div, div, 4).unwrap();
        assert_eq!(id, 16);
    }

    #[test]
    fn rect_index_rejects_degenerate_bins() {
        assert!(matches!(
            rect_division_index(1.0, 1.0, 0.0, 5.0, 4),
            Err(GeometryError::NonPositiveBin { .. })
        ));
    }

    #[test]
    fn angular_index_partitions_the_circle_evenly() {
        let n = 8;
        for sector in 0..n {
            let start = TAU * f64::from(sector) / f64::from(n);
            let inside = start + TAU / f64::from(n) / 2.0;
            assert_eq!(angular_division_index(start, n), sector + 1);
            assert_eq!(angular_division_index(inside, n), sector + 1);
        }
        assert_eq!(angular_division_index(TAU - 1e-12, n), n);
    }

    #[test]
    fn crop_window_clamps_thin_direction_to_min_feret() {
        // Horizontal needle: the vertical extent comes from min_feret.
        let window = crop_window(50.0, 80.0, 40.0, 5.0, 0.0);
        assert!((window.width() - 80.0).abs() < EPS);
        assert!((window.height() - 10.0).abs() < EPS);
        assert!((window.x_min - 10.0).abs() < EPS);
        assert!((window.y_max - 85.0).abs() < EPS);

        let steep = crop_window(0.0, 0.0, 40.0, 5.0, 90.0);
        assert!((steep.height() - 80.0).abs() < EPS);
        assert!((steep.width() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn angular_index_is_half_pi_quadrant_aligned() {
        assert_eq!(angular_division_index(0.0, 4), 1);
        assert_eq!(angular_division_index(FRAC_PI_2, 4), 2);
        assert_eq!(angular_division_index(PI, 4), 3);
        assert_eq!(angular_division_index(3.0 * FRAC_PI_2, 4), 4);
    }
}
