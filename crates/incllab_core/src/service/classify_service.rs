//! Interactive feature-classification workflow.
//!
//! # Responsibility
//! - Order the unclassified features of one slice for review and drive
//!   the identify/skip/quit loop through the `Prompter`.
//! - Query the optional `ImageClassifier` for a suggestion on each
//!   reviewable crop.
//!
//! # Invariants
//! - Only unclassified rows are offered for review.
//! - Labels are applied to the snapshot copy; the session driver
//!   persists once after the loop ends.

use super::{ServiceError, ServiceResult};
use crate::config::Tunables;
use crate::geometry::crop_window;
use crate::interact::{ImageClassifier, Prompter};
use crate::model::{Dataset, Inclusion, InclusionClass, SliceKey};
use log::info;
use rand::seq::SliceRandom;
use std::path::Path;

/// Candidate ordering of the review loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionMode {
    /// Largest unclassified features first, by area.
    LargestArea,
    /// Largest unclassified features first, by feret diameter.
    LargestFeret,
    /// Random order among unclassified features above a minimum feret.
    Random { min_feret_um: f64 },
}

/// Labels offered in the review menu, in menu order.
const LABEL_CHOICES: &[InclusionClass] = &[
    InclusionClass::Microstructure,
    InclusionClass::Inclusion,
    InclusionClass::Porosity,
    InclusionClass::Scratch,
    InclusionClass::Dust,
    InclusionClass::Artifact,
    InclusionClass::OutOfBounds,
];

/// Change summary of one classification session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassifyOutcome {
    pub assigned: usize,
    pub skipped: usize,
}

/// Runs the identify loop over the unclassified features of one slice.
///
/// `image` is the slice photograph the crops refer to, when available;
/// crops are only proposed to the classifier for features small enough
/// to display (`Tunables::classifier_max_feret_um`).
pub fn run_classification(
    dataset: &Dataset,
    key: &SliceKey,
    mode: SelectionMode,
    prompter: &mut dyn Prompter,
    classifier: &mut dyn ImageClassifier,
    image: Option<&Path>,
    tunables: &Tunables,
) -> ServiceResult<(Dataset, ClassifyOutcome)> {
    if dataset.meta_for(key).is_none() {
        return Err(ServiceError::UnknownSlice(key.clone()));
    }

    let mut candidates: Vec<u32> = dataset
        .inclusions_for(key)
        .into_iter()
        .filter(|row| row.class == InclusionClass::Unclassified)
        .filter(|row| match mode {
            SelectionMode::Random { min_feret_um } => row.feret > min_feret_um,
            _ => true,
        })
        .map(|row| row.incl_nb)
        .collect();

    let mut next = dataset.clone();
    order_candidates(&next, key, mode, &mut candidates);

    let mut labels: Vec<&str> = LABEL_CHOICES
        .iter()
        .map(|class| class.description())
        .collect();
    labels.push("Skip, leave unclassified");

    let mut outcome = ClassifyOutcome::default();
    for incl_nb in candidates {
        let Some(row) = next
            .inclusions
            .iter()
            .find(|row| {
                row.specimen_id == key.specimen_id
                    && row.slice == key.slice
                    && row.incl_nb == incl_nb
            })
            .cloned()
        else {
            continue;
        };

        prompter.info(&describe(&row));
        if let Some(image) = image {
            if row.feret < tunables.classifier_max_feret_um {
                let window =
                    crop_window(row.x, row.y, row.feret, row.min_feret, row.feret_angle);
                if let Some(suggestion) = classifier.suggest(image, &window) {
                    prompter.info(&format!(
                        "Assistant: {:.0}% {}",
                        suggestion.confidence * 100.0,
                        suggestion.class
                    ));
                }
            }
        }

        match prompter.choose("Identify inclusion type", &labels) {
            Some(index) if index < LABEL_CHOICES.len() => {
                let class = LABEL_CHOICES[index];
                apply_label(&mut next, key, incl_nb, class);
                outcome.assigned += 1;
                info!(
                    "event=classify module=service status=ok specimen={} slice={} incl_nb={incl_nb} class={}",
                    key.specimen_id,
                    key.slice,
                    class.as_label()
                );
            }
            Some(_) => outcome.skipped += 1,
            None => break,
        }
    }

    Ok((next, outcome))
}

fn order_candidates(dataset: &Dataset, key: &SliceKey, mode: SelectionMode, ids: &mut Vec<u32>) {
    let measure = |incl_nb: u32, f: fn(&Inclusion) -> f64| -> f64 {
        dataset
            .inclusions_for(key)
            .into_iter()
            .find(|row| row.incl_nb == incl_nb)
            .map_or(0.0, f)
    };

    match mode {
        SelectionMode::LargestArea => {
            ids.sort_by(|a, b| {
                measure(*b, |row| row.area)
                    .partial_cmp(&measure(*a, |row| row.area))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        SelectionMode::LargestFeret => {
            ids.sort_by(|a, b| {
                measure(*b, |row| row.feret)
                    .partial_cmp(&measure(*a, |row| row.feret))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        SelectionMode::Random { .. } => {
            ids.shuffle(&mut rand::thread_rng());
        }
    }
}

fn apply_label(dataset: &mut Dataset, key: &SliceKey, incl_nb: u32, class: InclusionClass) {
    for row in &mut dataset.inclusions {
        if row.specimen_id == key.specimen_id && row.slice == key.slice && row.incl_nb == incl_nb {
            row.class = class;
        }
    }
}

fn describe(row: &Inclusion) -> String {
    format!(
        "Feature {} at ({:.1}, {:.1}) um: area {:.1} um2, feret {:.1} um (min {:.1}, angle {:.1} deg), AR {:.2}",
        row.incl_nb, row.x, row.y, row.area, row.feret, row.min_feret, row.feret_angle, row.ar
    )
}

#[cfg(test)]
mod tests {
    use super::{order_candidates, SelectionMode};
    use crate::model::{Dataset, Inclusion, InclusionClass, SliceKey, SliceMeta};

    fn row(incl_nb: u32, area: f64, feret: f64) -> Inclusion {
        Inclusion {
            specimen_id: "S1".to_string(),
            slice: 1,
            incl_nb,
            x: 0.0,
            y: 0.0,
            area,
            sqr_area: area.sqrt(),
            feret,
            min_feret: 1.0,
            feret_angle: 0.0,
            circ: 1.0,
            roundness: 1.0,
            ar: 1.0,
            solid: 1.0,
            class: InclusionClass::Unclassified,
            r: None,
            theta: None,
            division: 0,
        }
    }

    #[test]
    fn ordering_by_area_and_feret_disagree_when_shapes_do() {
        let mut dataset = Dataset::new();
        dataset
            .meta
            .push(SliceMeta::new_import("S1", 1, "b.csv", 2000.0, 1000.0, 2.0));
        // Large-area compact feature vs needle with the bigger feret.
        dataset.inclusions.push(row(1, 100.0, 12.0));
        dataset.inclusions.push(row(2, 30.0, 40.0));

        let key = SliceKey::new("S1", 1);
        let mut ids = vec![1, 2];
        order_candidates(&dataset, &key, SelectionMode::LargestArea, &mut ids);
        assert_eq!(ids, vec![1, 2]);

        let mut ids = vec![1, 2];
        order_candidates(&dataset, &key, SelectionMode::LargestFeret, &mut ids);
        assert_eq!(ids, vec![2, 1]);
    }
}
