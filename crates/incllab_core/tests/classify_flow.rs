mod common;

use common::{feature_at, rect_meta, ScriptedPrompter};
use incllab_core::interact::NoClassifier;
use incllab_core::model::{Dataset, InclusionClass, SliceKey};
use incllab_core::service::classify_service::{run_classification, SelectionMode};
use incllab_core::service::ServiceError;
use incllab_core::Tunables;

fn dataset_with_sizes() -> Dataset {
    let mut dataset = Dataset::new();
    dataset.meta.push(rect_meta("S1", 1));

    let mut small = feature_at("S1", 1, 1, 10.0, 10.0);
    small.area = 9.0;
    small.feret = 4.0;
    let mut large = feature_at("S1", 1, 2, 20.0, 20.0);
    large.area = 400.0;
    large.feret = 25.0;
    let mut already_labelled = feature_at("S1", 1, 3, 30.0, 30.0);
    already_labelled.class = InclusionClass::Dust;

    dataset.inclusions.extend([small, large, already_labelled]);
    dataset
}

#[test]
fn largest_area_candidate_is_reviewed_first() {
    let dataset = dataset_with_sizes();
    let key = SliceKey::new("S1", 1);

    // Label the first candidate "Inclusion" (menu entry 2), then quit.
    let mut prompter = ScriptedPrompter::new(vec![Some(1), None], vec![]);
    let (next, outcome) = run_classification(
        &dataset,
        &key,
        SelectionMode::LargestArea,
        &mut prompter,
        &mut NoClassifier,
        None,
        &Tunables::default(),
    )
    .unwrap();

    assert_eq!(outcome.assigned, 1);
    assert_eq!(outcome.skipped, 0);

    let large = next
        .inclusions_for(&key)
        .into_iter()
        .find(|row| row.incl_nb == 2)
        .cloned()
        .unwrap();
    assert_eq!(large.class, InclusionClass::Inclusion);

    // The smaller candidate was never reached; the labelled row was never
    // offered.
    let small = next
        .inclusions_for(&key)
        .into_iter()
        .find(|row| row.incl_nb == 1)
        .cloned()
        .unwrap();
    assert_eq!(small.class, InclusionClass::Unclassified);

    // Input snapshot untouched.
    assert!(dataset
        .inclusions_for(&key)
        .iter()
        .all(|row| row.incl_nb == 3 || row.class == InclusionClass::Unclassified));
}

#[test]
fn skip_leaves_the_row_unclassified_and_moves_on() {
    let dataset = dataset_with_sizes();
    let key = SliceKey::new("S1", 1);

    // Skip (last menu entry, index 7) the large one, label the small one
    // as porosity (entry 3), loop ends when candidates run out.
    let mut prompter = ScriptedPrompter::new(vec![Some(7), Some(2)], vec![]);
    let (next, outcome) = run_classification(
        &dataset,
        &key,
        SelectionMode::LargestArea,
        &mut prompter,
        &mut NoClassifier,
        None,
        &Tunables::default(),
    )
    .unwrap();

    assert_eq!(outcome.assigned, 1);
    assert_eq!(outcome.skipped, 1);

    let rows = next.inclusions_for(&key);
    let large = rows.iter().find(|row| row.incl_nb == 2).unwrap();
    assert_eq!(large.class, InclusionClass::Unclassified);
    let small = rows.iter().find(|row| row.incl_nb == 1).unwrap();
    assert_eq!(small.class, InclusionClass::Porosity);
}

#[test]
fn random_mode_filters_by_minimum_feret() {
    let dataset = dataset_with_sizes();
    let key = SliceKey::new("S1", 1);

    // Only the 25 um candidate passes the 10 um floor; label it dust
    // (entry 5).
    let mut prompter = ScriptedPrompter::new(vec![Some(4)], vec![]);
    let (next, outcome) = run_classification(
        &dataset,
        &key,
        SelectionMode::Random { min_feret_um: 10.0 },
        &mut prompter,
        &mut NoClassifier,
        None,
        &Tunables::default(),
    )
    .unwrap();

    assert_eq!(outcome.assigned, 1);
    let rows = next.inclusions_for(&key);
    assert_eq!(
        rows.iter().find(|row| row.incl_nb == 2).unwrap().class,
        InclusionClass::Dust
    );
    assert_eq!(
        rows.iter().find(|row| row.incl_nb == 1).unwrap().class,
        InclusionClass::Unclassified
    );
}

#[test]
fn unknown_slice_is_rejected_before_prompting() {
    let dataset = dataset_with_sizes();
    let mut prompter = ScriptedPrompter::new(vec![], vec![]);

    assert!(matches!(
        run_classification(
            &dataset,
            &SliceKey::new("S1", 9),
            SelectionMode::LargestArea,
            &mut prompter,
            &mut NoClassifier,
            None,
            &Tunables::default(),
        ),
        Err(ServiceError::UnknownSlice(_))
    ));
}
