//! Session driver: one function per menu entry.
//!
//! Every flow follows the same cycle: load the snapshot, gather typed
//! input, run the core transform, persist the returned snapshot. A
//! cancelled prompt leaves the store untouched.

use crate::chart::TextChart;
use crate::prompt::{self, StdinPrompter};
use incllab_core::interact::NoClassifier;
use incllab_core::model::{CrossSection, SliceKey};
use incllab_core::repo::InclusionStore;
use incllab_core::service::calibrate_service::{run_recalibration, Recalibrated};
use incllab_core::service::classify_service::{run_classification, SelectionMode};
use incllab_core::service::divide_service::{
    divide_circular, divide_rectangular, division_overview,
};
use incllab_core::service::export_service::export_summary;
use incllab_core::service::import_service::{
    exclude_zone, import_batch, parse_measurement_batch, remove_slice, ExclusionRect,
    ImportRequest, SpecimenDims,
};
use incllab_core::service::stats_service::{slice_stats, specimen_summaries};
use incllab_core::{SqliteStore, Tunables};
use std::error::Error;
use std::path::PathBuf;

pub type FlowResult = Result<(), Box<dyn Error>>;

/// One interactive session: the store plus ambient paths and tunables.
pub struct Session {
    pub store: SqliteStore,
    pub data_dir: PathBuf,
    pub tunables: Tunables,
}

impl Session {
    /// Imports a measurement batch, replacing any prior pass of the
    /// chosen specimen+slice.
    pub fn import(&mut self) -> FlowResult {
        let dataset = self.store.load()?;

        let ids = dataset.specimen_ids();
        let Some(specimen_id) = prompt::select_specimen(&ids, true) else {
            return Ok(());
        };
        let Some(slice) = prompt::select_slice(&dataset, &specimen_id, true) else {
            return Ok(());
        };
        let Some(filename) = prompt::select_batch_file(&self.batch_files()?) else {
            return Ok(());
        };

        println!("If the specimen is circular, enter width 0.");
        let Some(width_um) = prompt::read_f64("Image width (microns) ...: ") else {
            println!("Numerical value needed");
            return Ok(());
        };
        let dims = if width_um < 1.0 {
            let Some(r_outer_um) = prompt::read_f64("Outer radius (microns) ...: ") else {
                println!("Numerical value needed");
                return Ok(());
            };
            let Some(r_inner_um) = prompt::read_f64("Inner radius (microns) ...: ") else {
                println!("Numerical value needed");
                return Ok(());
            };
            SpecimenDims::Circular {
                r_outer_um,
                r_inner_um,
            }
        } else {
            let Some(height_um) = prompt::read_f64("Image height (microns) ...: ") else {
                println!("Numerical value needed");
                return Ok(());
            };
            SpecimenDims::Rectangular {
                width_um,
                height_um,
            }
        };

        let text = std::fs::read_to_string(self.data_dir.join(&filename))?;
        let rows = parse_measurement_batch(&text)?;

        let request = ImportRequest {
            specimen_id,
            slice,
            filename,
            dims,
        };
        let (next, summary) = import_batch(&dataset, &request, &rows)?;
        self.store.save(&next)?;

        println!(
            "Imported {} features into {} ({:.2} mm2 analysed, {} prior rows replaced).",
            summary.rows_imported, summary.key, summary.area_mm2, summary.rows_replaced
        );
        Ok(())
    }

    /// Removes one slice: its metadata row and data rows together.
    pub fn remove(&mut self) -> FlowResult {
        let dataset = self.store.load()?;

        let ids = dataset.specimen_ids();
        let Some(specimen_id) = prompt::select_specimen(&ids, false) else {
            return Ok(());
        };
        let Some(slice) = prompt::select_slice(&dataset, &specimen_id, false) else {
            return Ok(());
        };

        let key = SliceKey::new(specimen_id, slice);
        let (next, summary) = remove_slice(&dataset, &key)?;
        if prompt::confirm(&format!(
            "Remove {} metadata row and {} data rows?",
            summary.meta_rows, summary.data_rows
        )) {
            self.store.save(&next)?;
            println!("Removed {}.", summary.key);
        }
        Ok(())
    }

    /// Excludes a rectangular zone from one slice's analysed area.
    pub fn exclude(&mut self) -> FlowResult {
        let dataset = self.store.load()?;

        let ids = dataset.specimen_ids();
        let Some(specimen_id) = prompt::select_specimen(&ids, false) else {
            return Ok(());
        };
        let Some(slice) = prompt::select_slice(&dataset, &specimen_id, false) else {
            return Ok(());
        };

        println!("Enter bounding rectangle");
        let bounds: Option<[f64; 4]> = (|| {
            Some([
                prompt::read_f64("x_min (microns) ...: ")?,
                prompt::read_f64("x_max (microns) ...: ")?,
                prompt::read_f64("y_min (microns) ...: ")?,
                prompt::read_f64("y_max (microns) ...: ")?,
            ])
        })();
        let Some([x_min, x_max, y_min, y_max]) = bounds else {
            println!("Invalid entry");
            return Ok(());
        };

        let rect = ExclusionRect::new(x_min, x_max, y_min, y_max)?;
        let key = SliceKey::new(specimen_id, slice);
        let (next, summary) = exclude_zone(&dataset, &key, &rect)?;

        if prompt::confirm(&format!(
            "Remove {} features and {:.4} mm2 from {}?",
            summary.rows_removed, summary.area_removed_mm2, summary.key
        )) {
            self.store.save(&next)?;
            println!("Excluded zone from {}.", summary.key);
        }
        Ok(())
    }

    /// Interactive centering/outer-radius recalibration of a circular
    /// slice.
    pub fn recalibrate(&mut self) -> FlowResult {
        let dataset = self.store.load()?;

        let ids = dataset.specimen_ids_with_section(CrossSection::Circular);
        let Some(specimen_id) = prompt::select_specimen(&ids, false) else {
            return Ok(());
        };
        let Some(slice) = prompt::select_slice(&dataset, &specimen_id, false) else {
            return Ok(());
        };
        let key = SliceKey::new(specimen_id, slice);

        let mut prompter = StdinPrompter;
        let mut chart = TextChart;
        match run_recalibration(&dataset, &key, &mut prompter, &mut chart, &self.tunables)? {
            Recalibrated::Committed {
                dataset: next,
                calibration,
                out_of_bounds,
            } => {
                self.store.save(&next)?;
                println!(
                    "Calibrated {key}: center ({:.1}, {:.1}), outer radius {:.1} um, {out_of_bounds} features out of bounds.",
                    calibration.x_c, calibration.y_c, calibration.r_outer
                );
            }
            Recalibrated::Abandoned => println!("No changes."),
        }
        Ok(())
    }

    /// Assigns spatial divisions to every feature of one specimen.
    pub fn divide(&mut self) -> FlowResult {
        let dataset = self.store.load()?;
        let overview = division_overview(&dataset);
        if overview.is_empty() {
            println!("No specimens recorded yet.");
            return Ok(());
        }

        println!("\nAverage dimensions, millimeters");
        println!("Seq. nb\tSpec.\tShape\tWidth\tHeight\tArea\tDivisions\tArea per division");
        for (index, entry) in overview.iter().enumerate() {
            let shape = match entry.cross_section {
                CrossSection::Rectangular => "rect",
                CrossSection::Circular => "circ",
            };
            println!(
                "{}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}\t({}, {})\t{:.2}",
                index + 1,
                entry.specimen_id,
                shape,
                entry.mean_width_um / 1000.0,
                entry.mean_height_um / 1000.0,
                entry.mean_area_mm2,
                entry.n_divis_x,
                entry.n_divis_y,
                entry.area_per_division_mm2
            );
        }

        let Some(choice) = prompt::read_u32("\nWhich specimen? ...: ") else {
            println!("Please enter an integer value");
            return Ok(());
        };
        let Some(entry) = (choice as usize)
            .checked_sub(1)
            .and_then(|index| overview.get(index))
        else {
            println!("No such specimen");
            return Ok(());
        };

        let (next, summary) = match entry.cross_section {
            CrossSection::Rectangular => {
                let Some(n_divis_x) = prompt::read_u32("Divisions in x ...: ") else {
                    println!("Enter a positive integer");
                    return Ok(());
                };
                let Some(n_divis_y) = prompt::read_u32("Divisions in y ...: ") else {
                    println!("Enter a positive integer");
                    return Ok(());
                };
                divide_rectangular(
                    &dataset,
                    &entry.specimen_id,
                    n_divis_x,
                    n_divis_y,
                    &self.tunables,
                )?
            }
            CrossSection::Circular => {
                let Some(n_divis) = prompt::read_u32("Number of divisions ...: ") else {
                    println!("Enter a positive integer");
                    return Ok(());
                };
                divide_circular(&dataset, &entry.specimen_id, n_divis)?
            }
        };

        self.store.save(&next)?;
        println!(
            "Assigned {} features of `{}` to divisions.",
            summary.rows_assigned, summary.specimen_id
        );
        Ok(())
    }

    /// Interactive classification of the unclassified features of one
    /// slice.
    pub fn classify(&mut self) -> FlowResult {
        let dataset = self.store.load()?;

        let mut prompter = StdinPrompter;
        use incllab_core::interact::Prompter as _;
        let mode = match prompter.choose(
            "What mode?",
            &[
                "Largest ones (area)",
                "Largest ones (feret)",
                "Random above a minimum size",
            ],
        ) {
            Some(0) => SelectionMode::LargestArea,
            Some(1) => SelectionMode::LargestFeret,
            Some(2) => {
                let default = self.tunables.random_mode_min_feret_um;
                let min_feret_um = prompter
                    .edit_f64("Minimum feret diameter (microns)", default)
                    .unwrap_or(default);
                SelectionMode::Random { min_feret_um }
            }
            _ => return Ok(()),
        };

        let ids = dataset.specimen_ids();
        let Some(specimen_id) = prompt::select_specimen(&ids, false) else {
            return Ok(());
        };
        let Some(slice) = prompt::select_slice(&dataset, &specimen_id, false) else {
            return Ok(());
        };
        let key = SliceKey::new(specimen_id, slice);

        // The slice photograph sits next to the batch, csv swapped for jpg.
        let image = dataset.meta_for(&key).and_then(|meta| {
            let image = self.data_dir.join(meta.filename.replace(".csv", ".jpg"));
            image.exists().then_some(image)
        });

        let mut classifier = NoClassifier;
        let (next, outcome) = run_classification(
            &dataset,
            &key,
            mode,
            &mut prompter,
            &mut classifier,
            image.as_deref(),
            &self.tunables,
        )?;

        if outcome.assigned > 0 {
            self.store.save(&next)?;
        }
        println!(
            "Classified {} features, skipped {}.",
            outcome.assigned, outcome.skipped
        );
        Ok(())
    }

    /// Prints the per-specimen and per-slice statistics tables.
    pub fn show_stats(&mut self) -> FlowResult {
        let dataset = self.store.load()?;

        println!("\nList of specimens studied");
        println!("Spec.\tNb. of slices\tTotal area (mm2)");
        for summary in specimen_summaries(&dataset) {
            println!(
                "{}\t{}\t\t{:.1}",
                summary.specimen_id, summary.slice_count, summary.total_area_mm2
            );
        }

        println!("\nStats per measurement pass");
        println!("Spec.\tSlice\tArea (mm2)\tNb. incl.\tIncl. per mm2\tArea fract. x1e3\tFile");
        for stats in slice_stats(&dataset, true) {
            println!(
                "{}\t{}\t{:.2}\t\t{}\t\t{:.2}\t\t{:.2}\t\t\t{}",
                stats.specimen_id,
                stats.slice,
                stats.area_mm2,
                stats.inclusion_count,
                stats.count_per_mm2,
                stats.area_fraction_e3,
                stats.filename
            );
        }
        Ok(())
    }

    /// Writes the flattened per-slice summary spreadsheet.
    pub fn export(&mut self) -> FlowResult {
        let dataset = self.store.load()?;

        let path = match prompt::read_line("Output file ...: [stats.csv] ") {
            Some(line) if !line.trim().is_empty() => line.trim().to_string(),
            Some(_) => "stats.csv".to_string(),
            None => return Ok(()),
        };
        export_summary(&dataset, &path, None, true)?;
        println!("Wrote {path}.");
        Ok(())
    }

    fn batch_files(&self) -> Result<Vec<String>, std::io::Error> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".csv") {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }
}
