//! In-memory snapshot of the two tables.
//!
//! # Responsibility
//! - Hold the full Meta/Data content of one load and answer the slice and
//!   specimen queries the services need.
//! - Provide the whole-slice replacement/removal primitives so callers
//!   never mutate across the key boundary.
//!
//! Services take a snapshot by reference and return a new one; the
//! session driver owns the single load-transform-save cycle against the
//! store.

use super::{CrossSection, Inclusion, SliceKey, SliceMeta};

/// One consistent snapshot of the metadata and data tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub meta: Vec<SliceMeta>,
    pub inclusions: Vec<Inclusion>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.inclusions.is_empty()
    }

    /// Distinct specimen ids in first-seen metadata order.
    pub fn specimen_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for meta in &self.meta {
            if !ids.iter().any(|id| id == &meta.specimen_id) {
                ids.push(meta.specimen_id.clone());
            }
        }
        ids
    }

    /// Distinct specimen ids restricted to one cross-section shape.
    pub fn specimen_ids_with_section(&self, section: CrossSection) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for meta in &self.meta {
            if meta.cross_section() == section
                && !ids.iter().any(|id| id == &meta.specimen_id)
            {
                ids.push(meta.specimen_id.clone());
            }
        }
        ids
    }

    pub fn meta_for(&self, key: &SliceKey) -> Option<&SliceMeta> {
        self.meta
            .iter()
            .find(|meta| meta.specimen_id == key.specimen_id && meta.slice == key.slice)
    }

    pub fn meta_for_specimen(&self, specimen_id: &str) -> Vec<&SliceMeta> {
        self.meta
            .iter()
            .filter(|meta| meta.specimen_id == specimen_id)
            .collect()
    }

    /// Slice numbers of one specimen, ascending.
    pub fn slice_numbers(&self, specimen_id: &str) -> Vec<u32> {
        let mut slices: Vec<u32> = self
            .meta
            .iter()
            .filter(|meta| meta.specimen_id == specimen_id)
            .map(|meta| meta.slice)
            .collect();
        slices.sort_unstable();
        slices.dedup();
        slices
    }

    /// Next sequential slice number for an import of this specimen.
    pub fn next_slice(&self, specimen_id: &str) -> u32 {
        self.slice_numbers(specimen_id)
            .last()
            .map_or(1, |last| last + 1)
    }

    pub fn inclusions_for(&self, key: &SliceKey) -> Vec<&Inclusion> {
        self.inclusions
            .iter()
            .filter(|row| row.specimen_id == key.specimen_id && row.slice == key.slice)
            .collect()
    }

    pub fn inclusions_for_specimen(&self, specimen_id: &str) -> Vec<&Inclusion> {
        self.inclusions
            .iter()
            .filter(|row| row.specimen_id == specimen_id)
            .collect()
    }

    /// Removes the meta row and every data row of one slice together.
    /// Returns `(meta_rows_removed, data_rows_removed)`.
    pub fn remove_slice(&mut self, key: &SliceKey) -> (usize, usize) {
        let meta_before = self.meta.len();
        self.meta
            .retain(|meta| !(meta.specimen_id == key.specimen_id && meta.slice == key.slice));

        let data_before = self.inclusions.len();
        self.inclusions
            .retain(|row| !(row.specimen_id == key.specimen_id && row.slice == key.slice));

        (meta_before - self.meta.len(), data_before - self.inclusions.len())
    }

    /// Wholesale slice replacement: drops any prior meta/data rows of the
    /// key, then inserts the new ones.
    pub fn replace_slice(&mut self, meta: SliceMeta, rows: Vec<Inclusion>) -> usize {
        let key = meta.key();
        let (_, replaced) = self.remove_slice(&key);
        self.meta.push(meta);
        self.inclusions.extend(rows);
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::Dataset;
    use crate::model::{CrossSection, Inclusion, InclusionClass, SliceKey, SliceMeta};

    fn meta(specimen: &str, slice: u32, width: f64) -> SliceMeta {
        SliceMeta::new_import(specimen, slice, "batch.csv", width, 1000.0, 2.0)
    }

    fn row(specimen: &str, slice: u32, incl_nb: u32) -> Inclusion {
        Inclusion {
            specimen_id: specimen.to_string(),
            slice,
            incl_nb,
            x: 1.0,
            y: 2.0,
            area: 4.0,
            sqr_area: 2.0,
            feret: 3.0,
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
    fn specimen_listing_keeps_first_seen_order_and_shape_filter() {
        let mut dataset = Dataset::new();
        dataset.meta.push(meta("B", 1, 2000.0));
        dataset.meta.push(meta("A", 1, 0.0));
        dataset.meta.push(meta("B", 2, 2000.0));

        assert_eq!(dataset.specimen_ids(), vec!["B", "A"]);
        assert_eq!(
            dataset.specimen_ids_with_section(CrossSection::Circular),
            vec!["A"]
        );
    }

    #[test]
    fn next_slice_counts_from_existing_passes() {
        let mut dataset = Dataset::new();
        assert_eq!(dataset.next_slice("B"), 1);
        dataset.meta.push(meta("B", 1, 2000.0));
        dataset.meta.push(meta("B", 2, 2000.0));
        assert_eq!(dataset.next_slice("B"), 3);
    }

    #[test]
    fn remove_slice_drops_meta_and_data_together() {
        let mut dataset = Dataset::new();
        dataset.meta.push(meta("B", 1, 2000.0));
        dataset.inclusions.push(row("B", 1, 1));
        dataset.inclusions.push(row("B", 1, 2));
        dataset.inclusions.push(row("B", 2, 1));

        let removed = dataset.remove_slice(&SliceKey::new("B", 1));
        assert_eq!(removed, (1, 2));
        assert!(dataset.meta_for(&SliceKey::new("B", 1)).is_none());
        assert_eq!(dataset.inclusions.len(), 1);
    }

    #[test]
    fn replace_slice_reports_prior_row_count() {
        let mut dataset = Dataset::new();
        dataset.meta.push(meta("B", 1, 2000.0));
        dataset.inclusions.push(row("B", 1, 1));

        let replaced = dataset.replace_slice(meta("B", 1, 2000.0), vec![row("B", 1, 7)]);
        assert_eq!(replaced, 1);
        assert_eq!(dataset.inclusions.len(), 1);
        assert_eq!(dataset.inclusions[0].incl_nb, 7);
    }
}
