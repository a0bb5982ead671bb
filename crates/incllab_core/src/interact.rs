//! Collaborator contracts of the interactive session.
//!
//! # Responsibility
//! - Define the prompting, chart and classifier seams so the calculation
//!   core never touches a terminal, a plotting backend or a model file.
//!
//! # Invariants
//! - Core services only receive finished values through these traits;
//!   input parsing and rendering stay in the shell.

use crate::geometry::CropWindow;
use crate::model::InclusionClass;
use std::path::Path;

/// Typed prompt calls the interactive drivers need.
///
/// `None` consistently means "leave this flow": an out-of-menu entry for
/// `choose`, an unparseable value for `edit_f64`.
pub trait Prompter {
    /// Shows context text to the analyst before a decision.
    fn info(&mut self, text: &str);

    /// Presents a numbered menu and returns the chosen index, or `None`
    /// for any other entry (the universal abandon/quit path).
    fn choose(&mut self, prompt: &str, options: &[&str]) -> Option<usize>;

    /// Asks for a replacement value, showing the current one as default.
    /// Returns `Some(current)` when the analyst keeps it, `None` when the
    /// entry cannot be parsed.
    fn edit_f64(&mut self, label: &str, current: f64) -> Option<f64>;
}

/// One named x/y series of a finished figure.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}

/// A finished figure: everything a rendering backend needs, nothing it
/// has to compute.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

/// Sink consuming finished figures. Implementations may render to a
/// terminal, write files, or discard.
pub trait ChartSink {
    fn render(&mut self, figure: &Figure);
}

/// Chart sink that discards every figure.
#[derive(Debug, Default)]
pub struct NullChart;

impl ChartSink for NullChart {
    fn render(&mut self, _figure: &Figure) {}
}

/// A label suggestion from the image-classification assistant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suggestion {
    pub class: InclusionClass,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Classification assistant over image crops. The inference backend
/// (neural network, remote service) lives behind this seam.
pub trait ImageClassifier {
    /// Returns a suggestion for the feature inside `window` of `image`,
    /// or `None` when no assistance is available.
    fn suggest(&mut self, image: &Path, window: &CropWindow) -> Option<Suggestion>;
}

/// Classifier that never suggests anything; manual identification only.
#[derive(Debug, Default)]
pub struct NoClassifier;

impl ImageClassifier for NoClassifier {
    fn suggest(&mut self, _image: &Path, _window: &CropWindow) -> Option<Suggestion> {
        None
    }
}
