//! Store contract and SQLite implementation.
//!
//! # Responsibility
//! - Load the full Meta/Data snapshot and rewrite it on save.
//! - Normalize on save: validate every row, resolve duplicate data keys
//!   in favor of assigned divisions, re-establish canonical key order.
//!
//! # Invariants
//! - Validation failures abort before the first SQL mutation.
//! - The rewrite runs in one transaction; a failure leaves the previous
//!   on-disk state authoritative.
//! - Saving a freshly loaded snapshot is a no-op on the table contents.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::{Dataset, Inclusion, InclusionClass, ModelError, SliceMeta};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use std::cmp::Reverse;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors of the persistence boundary.
#[derive(Debug)]
pub enum StoreError {
    /// The database file does not exist; the caller may offer to
    /// initialize a fresh one.
    NotFound(PathBuf),
    /// A row failed validation during save-time normalization.
    Invalid(ModelError),
    /// A persisted value could not be decoded into the typed schema.
    InvalidData(String),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "database not found at `{}`", path.display()),
            Self::Invalid(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted row: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Invalid(err) => Some(err),
            Self::InvalidData(_) => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ModelError> for StoreError {
    fn from(value: ModelError) -> Self {
        Self::Invalid(value)
    }
}

/// Whole-snapshot persistence contract used by the session driver.
pub trait InclusionStore {
    fn load(&self) -> StoreResult<Dataset>;
    fn save(&mut self, dataset: &Dataset) -> StoreResult<()>;
}

const META_SELECT_SQL: &str = "SELECT
    specimen_id,
    slice,
    filename,
    img_width,
    img_height,
    img_area_mm2,
    x_c,
    y_c,
    r_outer,
    n_divis_x,
    n_divis_y,
    divis_area_mm2
FROM slice_meta
ORDER BY specimen_id ASC, slice ASC";

const DATA_SELECT_SQL: &str = "SELECT
    specimen_id,
    slice,
    incl_nb,
    x,
    y,
    area,
    sqr_area,
    feret,
    min_feret,
    feret_angle,
    circ,
    roundness,
    ar,
    solid,
    class,
    r,
    theta,
    division
FROM inclusion
ORDER BY specimen_id ASC, slice ASC, incl_nb ASC";

/// SQLite-backed store over the two fixed-schema tables.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens an existing database file.
    ///
    /// # Errors
    /// - `NotFound` when the file does not exist yet; use
    ///   [`SqliteStore::create`] to initialize one.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    /// Creates (or opens) a database file and applies the schema.
    pub fn create(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self {
            conn: open_db(path.as_ref())?,
        })
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }
}

impl InclusionStore for SqliteStore {
    fn load(&self) -> StoreResult<Dataset> {
        let mut meta = Vec::new();
        let mut stmt = self.conn.prepare(META_SELECT_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            meta.push(parse_meta_row(row)?);
        }

        let mut inclusions = Vec::new();
        let mut stmt = self.conn.prepare(DATA_SELECT_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            inclusions.push(parse_data_row(row)?);
        }

        Ok(Dataset { meta, inclusions })
    }

    fn save(&mut self, dataset: &Dataset) -> StoreResult<()> {
        let normalized = match normalize(dataset) {
            Ok(normalized) => normalized,
            Err(err) => {
                error!("event=store_save module=repo status=error error={err}");
                return Err(StoreError::Invalid(err));
            }
        };

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM slice_meta;", [])?;
        tx.execute("DELETE FROM inclusion;", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO slice_meta (
                    specimen_id, slice, filename, img_width, img_height,
                    img_area_mm2, x_c, y_c, r_outer, n_divis_x, n_divis_y,
                    divis_area_mm2
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            )?;
            for meta in &normalized.meta {
                stmt.execute(params![
                    meta.specimen_id,
                    meta.slice,
                    meta.filename,
                    meta.img_width,
                    meta.img_height,
                    meta.img_area_mm2,
                    meta.x_c,
                    meta.y_c,
                    meta.r_outer,
                    meta.n_divis_x,
                    meta.n_divis_y,
                    meta.divis_area_mm2,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO inclusion (
                    specimen_id, slice, incl_nb, x, y, area, sqr_area,
                    feret, min_feret, feret_angle, circ, roundness, ar,
                    solid, class, r, theta, division
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                          ?12, ?13, ?14, ?15, ?16, ?17, ?18);",
            )?;
            for row in &normalized.inclusions {
                stmt.execute(params![
                    row.specimen_id,
                    row.slice,
                    row.incl_nb,
                    row.x,
                    row.y,
                    row.area,
                    row.sqr_area,
                    row.feret,
                    row.min_feret,
                    row.feret_angle,
                    row.circ,
                    row.roundness,
                    row.ar,
                    row.solid,
                    row.class.as_label(),
                    row.r,
                    row.theta,
                    row.division,
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "event=store_save module=repo status=ok meta_rows={} data_rows={}",
            normalized.meta.len(),
            normalized.inclusions.len()
        );
        Ok(())
    }
}

/// Save-time normalization: validation, duplicate resolution, canonical
/// order.
///
/// Duplicate data keys keep the row whose `division` is nonzero, which
/// resolves the leftover of a division pass that ran before a partial
/// re-import.
fn normalize(dataset: &Dataset) -> Result<Dataset, ModelError> {
    let mut meta = dataset.meta.clone();
    for row in &meta {
        row.validate()?;
    }
    meta.sort_by(|a, b| {
        (&a.specimen_id, a.slice).cmp(&(&b.specimen_id, b.slice))
    });
    for pair in meta.windows(2) {
        if pair[0].specimen_id == pair[1].specimen_id && pair[0].slice == pair[1].slice {
            return Err(ModelError::DuplicateMeta { key: pair[1].key() });
        }
    }

    let mut inclusions = dataset.inclusions.clone();
    for row in &inclusions {
        row.validate()?;
    }
    inclusions.sort_by(|a, b| {
        (&a.specimen_id, a.slice, a.incl_nb, Reverse(a.division)).cmp(&(
            &b.specimen_id,
            b.slice,
            b.incl_nb,
            Reverse(b.division),
        ))
    });
    inclusions.dedup_by(|next, kept| {
        next.specimen_id == kept.specimen_id
            && next.slice == kept.slice
            && next.incl_nb == kept.incl_nb
    });

    Ok(Dataset { meta, inclusions })
}

fn parse_meta_row(row: &Row<'_>) -> StoreResult<SliceMeta> {
    let meta = SliceMeta {
        specimen_id: row.get("specimen_id")?,
        slice: row.get("slice")?,
        filename: row.get("filename")?,
        img_width: row.get("img_width")?,
        img_height: row.get("img_height")?,
        img_area_mm2: row.get("img_area_mm2")?,
        x_c: row.get("x_c")?,
        y_c: row.get("y_c")?,
        r_outer: row.get("r_outer")?,
        n_divis_x: row.get("n_divis_x")?,
        n_divis_y: row.get("n_divis_y")?,
        divis_area_mm2: row.get("divis_area_mm2")?,
    };
    meta.validate().map_err(StoreError::Invalid)?;
    Ok(meta)
}

fn parse_data_row(row: &Row<'_>) -> StoreResult<Inclusion> {
    let label: String = row.get("class")?;
    let class = InclusionClass::parse_label(&label).ok_or_else(|| {
        StoreError::InvalidData(format!("unknown class label `{label}` in inclusion.class"))
    })?;

    let inclusion = Inclusion {
        specimen_id: row.get("specimen_id")?,
        slice: row.get("slice")?,
        incl_nb: row.get("incl_nb")?,
        x: row.get("x")?,
        y: row.get("y")?,
        area: row.get("area")?,
        sqr_area: row.get("sqr_area")?,
        feret: row.get("feret")?,
        min_feret: row.get("min_feret")?,
        feret_angle: row.get("feret_angle")?,
        circ: row.get("circ")?,
        roundness: row.get("roundness")?,
        ar: row.get("ar")?,
        solid: row.get("solid")?,
        class,
        r: row.get("r")?,
        theta: row.get("theta")?,
        division: row.get("division")?,
    };
    inclusion.validate().map_err(StoreError::Invalid)?;
    Ok(inclusion)
}
