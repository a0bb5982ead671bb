mod common;

use common::{circular_meta, feature_at, rect_meta};
use incllab_core::model::{Dataset, SliceKey};
use incllab_core::service::divide_service::{
    divide_circular, divide_rectangular, division_overview,
};
use incllab_core::service::ServiceError;
use incllab_core::Tunables;
use std::f64::consts::{FRAC_PI_2, PI};

fn rect_dataset() -> Dataset {
    let mut dataset = Dataset::new();
    dataset.meta.push(rect_meta("R", 1));
    dataset.meta.push(rect_meta("R", 2));
    // Slice 1 spans 0..100 on both axes.
    dataset.inclusions.extend([
        feature_at("R", 1, 1, 0.0, 0.0),
        feature_at("R", 1, 2, 100.0, 0.0),
        feature_at("R", 1, 3, 0.0, 100.0),
        feature_at("R", 1, 4, 100.0, 100.0),
    ]);
    // Slice 2 sits elsewhere in image coordinates with another span.
    dataset.inclusions.extend([
        feature_at("R", 2, 1, 1000.0, 1000.0),
        feature_at("R", 2, 2, 1200.0, 1300.0),
    ]);
    dataset
}

#[test]
fn rectangular_grid_is_rederived_per_slice() {
    let dataset = rect_dataset();
    let (next, summary) =
        divide_rectangular(&dataset, "R", 2, 2, &Tunables::default()).unwrap();

    assert_eq!(summary.rows_assigned, 6);

    let slice1: Vec<u32> = next
        .inclusions_for(&SliceKey::new("R", 1))
        .iter()
        .map(|row| row.division)
        .collect();
    // Corner features land in the four distinct cells.
    assert_eq!(slice1, vec![1, 2, 3, 4]);

    let slice2: Vec<u32> = next
        .inclusions_for(&SliceKey::new("R", 2))
        .iter()
        .map(|row| row.division)
        .collect();
    // A differently sized slice still populates first and last cells.
    assert_eq!(slice2, vec![1, 4]);

    for meta in next.meta_for_specimen("R") {
        assert_eq!(meta.n_divis_x, 2);
        assert_eq!(meta.n_divis_y, 2);
        assert_eq!(meta.divis_area_mm2, Some(0.5));
    }
}

#[test]
fn division_ids_stay_within_the_grid() {
    let mut dataset = Dataset::new();
    dataset.meta.push(rect_meta("R", 1));
    for incl_nb in 1..=50 {
        let step = f64::from(incl_nb);
        dataset
            .inclusions
            .push(feature_at("R", 1, incl_nb, step * 7.3, step * 3.1));
    }

    let (next, _) = divide_rectangular(&dataset, "R", 5, 3, &Tunables::default()).unwrap();
    for row in next.inclusions_for_specimen("R") {
        assert!(row.division >= 1);
        assert!(row.division <= 15);
    }

    // Features at the recorded maxima sit in the last cell.
    let max_row = next
        .inclusions_for_specimen("R")
        .into_iter()
        .max_by_key(|row| row.incl_nb)
        .unwrap();
    assert_eq!(max_row.division, 15);
}

#[test]
fn rectangular_validation_happens_before_any_assignment() {
    let dataset = rect_dataset();

    assert!(matches!(
        divide_rectangular(&dataset, "R", 0, 2, &Tunables::default()),
        Err(ServiceError::InvalidDivisionCount(0))
    ));
    assert!(matches!(
        divide_rectangular(&dataset, "missing", 2, 2, &Tunables::default()),
        Err(ServiceError::UnknownSpecimen(_))
    ));

    // A slice whose features share one y coordinate cannot be gridded.
    let mut degenerate = Dataset::new();
    degenerate.meta.push(rect_meta("R", 1));
    degenerate.inclusions.extend([
        feature_at("R", 1, 1, 0.0, 50.0),
        feature_at("R", 1, 2, 100.0, 50.0),
    ]);
    assert!(matches!(
        divide_rectangular(&degenerate, "R", 2, 2, &Tunables::default()),
        Err(ServiceError::DegenerateBounds(_))
    ));

    // The circular path refuses rectangular specimens and vice versa.
    assert!(matches!(
        divide_circular(&dataset, "R", 4),
        Err(ServiceError::WrongCrossSection { .. })
    ));
}

#[test]
fn circular_sectors_follow_stored_azimuths() {
    let mut dataset = Dataset::new();
    dataset.meta.push(circular_meta("C", 1));
    let thetas = [0.1, FRAC_PI_2 + 0.1, PI + 0.1, 2.0 * PI - 0.1];
    for (index, theta) in thetas.iter().enumerate() {
        let mut row = feature_at("C", 1, index as u32 + 1, 10.0, 10.0);
        row.r = Some(50.0);
        row.theta = Some(*theta);
        dataset.inclusions.push(row);
    }

    let (next, summary) = divide_circular(&dataset, "C", 4).unwrap();
    assert_eq!(summary.rows_assigned, 4);

    let divisions: Vec<u32> = next
        .inclusions_for_specimen("C")
        .iter()
        .map(|row| row.division)
        .collect();
    assert_eq!(divisions, vec![1, 2, 3, 4]);

    let meta = next.meta_for(&SliceKey::new("C", 1)).unwrap();
    assert_eq!(meta.n_divis_x, 4);
    assert_eq!(meta.divis_area_mm2, Some(PI / 4.0));
}

#[test]
fn circular_path_requires_recalibrated_azimuths() {
    let mut dataset = Dataset::new();
    dataset.meta.push(circular_meta("C", 1));
    let mut with_theta = feature_at("C", 1, 1, 10.0, 10.0);
    with_theta.theta = Some(1.0);
    dataset.inclusions.push(with_theta);
    dataset.inclusions.push(feature_at("C", 1, 2, 20.0, 20.0));

    assert!(matches!(
        divide_circular(&dataset, "C", 4),
        Err(ServiceError::ThetaMissing { incl_nb: 2, .. })
    ));
}

#[test]
fn overview_reports_means_and_current_layout() {
    let mut dataset = rect_dataset();
    dataset.meta.push(circular_meta("C", 1));

    let overview = division_overview(&dataset);
    assert_eq!(overview.len(), 2);

    let rect = overview.iter().find(|o| o.specimen_id == "R").unwrap();
    assert_eq!(rect.mean_width_um, 2000.0);
    assert_eq!(rect.mean_area_mm2, 2.0);
    assert_eq!(rect.area_per_division_mm2, 0.0);

    let (next, _) = divide_rectangular(&dataset, "R", 2, 2, &Tunables::default()).unwrap();
    let overview = division_overview(&next);
    let rect = overview.iter().find(|o| o.specimen_id == "R").unwrap();
    assert_eq!(rect.area_per_division_mm2, 0.5);
}
