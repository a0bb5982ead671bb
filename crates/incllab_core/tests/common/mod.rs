#![allow(dead_code)]

//! Shared fixtures: scripted prompter and dataset builders.

use incllab_core::interact::Prompter;
use incllab_core::model::{Dataset, Inclusion, InclusionClass, SliceMeta};
use std::collections::VecDeque;

/// Prompter driven by a prepared script instead of a terminal.
pub struct ScriptedPrompter {
    choices: VecDeque<Option<usize>>,
    edits: VecDeque<Option<f64>>,
    pub infos: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(choices: Vec<Option<usize>>, edits: Vec<Option<f64>>) -> Self {
        Self {
            choices: choices.into(),
            edits: edits.into(),
            infos: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn info(&mut self, text: &str) {
        self.infos.push(text.to_string());
    }

    fn choose(&mut self, _prompt: &str, _options: &[&str]) -> Option<usize> {
        self.choices.pop_front().unwrap_or(None)
    }

    fn edit_f64(&mut self, _label: &str, current: f64) -> Option<f64> {
        match self.edits.pop_front() {
            Some(scripted) => scripted,
            None => Some(current),
        }
    }
}

pub fn rect_meta(specimen: &str, slice: u32) -> SliceMeta {
    SliceMeta::new_import(specimen, slice, format!("{specimen}_{slice}.csv"), 2000.0, 1000.0, 2.0)
}

pub fn circular_meta(specimen: &str, slice: u32) -> SliceMeta {
    SliceMeta::new_import(
        specimen,
        slice,
        format!("{specimen}_{slice}.csv"),
        0.0,
        1000.0,
        std::f64::consts::PI,
    )
}

pub fn feature_at(specimen: &str, slice: u32, incl_nb: u32, x: f64, y: f64) -> Inclusion {
    Inclusion {
        specimen_id: specimen.to_string(),
        slice,
        incl_nb,
        x,
        y,
        area: 25.0,
        sqr_area: 5.0,
        feret: 9.0,
        min_feret: 4.0,
        feret_angle: 12.0,
        circ: 0.9,
        roundness: 0.8,
        ar: 1.2,
        solid: 0.95,
        class: InclusionClass::Unclassified,
        r: None,
        theta: None,
        division: 0,
    }
}

/// A circular slice with four features on the axes at radius 100.
pub fn axes_dataset(specimen: &str) -> Dataset {
    let mut dataset = Dataset::new();
    dataset.meta.push(circular_meta(specimen, 1));
    dataset.inclusions.extend([
        feature_at(specimen, 1, 1, 100.0, 0.0),
        feature_at(specimen, 1, 2, -100.0, 0.0),
        feature_at(specimen, 1, 3, 0.0, 100.0),
        feature_at(specimen, 1, 4, 0.0, -100.0),
    ]);
    dataset
}
