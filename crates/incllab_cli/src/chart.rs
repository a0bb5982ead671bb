//! Terminal chart sink: coarse ASCII scatter of finished figures.
//!
//! Good enough to judge whether a candidate circle encloses the feature
//! cloud; anything publication-grade goes through the export paths.

use incllab_core::interact::{ChartSink, Figure};

const PLOT_COLS: usize = 64;
const PLOT_ROWS: usize = 24;
const GLYPHS: &[char] = &['.', 'o', '*', 'x', '+'];

/// Renders every figure as an ASCII scatter on stdout.
#[derive(Debug, Default)]
pub struct TextChart;

impl ChartSink for TextChart {
    fn render(&mut self, figure: &Figure) {
        println!("\n--- {} ---", figure.title);

        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for series in &figure.series {
            for &(x, y) in &series.points {
                x_min = x_min.min(x);
                x_max = x_max.max(x);
                y_min = y_min.min(y);
                y_max = y_max.max(y);
            }
        }
        if !(x_min.is_finite() && y_min.is_finite()) {
            println!("(no data)");
            return;
        }
        let x_span = (x_max - x_min).max(f64::MIN_POSITIVE);
        let y_span = (y_max - y_min).max(f64::MIN_POSITIVE);

        let mut grid = vec![[' '; PLOT_COLS]; PLOT_ROWS];
        for (index, series) in figure.series.iter().enumerate() {
            let glyph = GLYPHS[index % GLYPHS.len()];
            for &(x, y) in &series.points {
                let col = ((x - x_min) / x_span * (PLOT_COLS - 1) as f64).round() as usize;
                // Screen rows grow downward; flip y.
                let row = ((y_max - y) / y_span * (PLOT_ROWS - 1) as f64).round() as usize;
                grid[row.min(PLOT_ROWS - 1)][col.min(PLOT_COLS - 1)] = glyph;
            }
        }

        for row in &grid {
            println!("{}", row.iter().collect::<String>());
        }
        println!(
            "{}: {:.0}..{:.0}  {}: {:.0}..{:.0}",
            figure.x_label, x_min, x_max, figure.y_label, y_min, y_max
        );
        for (index, series) in figure.series.iter().enumerate() {
            println!(
                "  `{}` {} ({} points)",
                GLYPHS[index % GLYPHS.len()],
                series.label,
                series.points.len()
            );
        }
    }
}
