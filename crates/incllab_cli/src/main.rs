//! Interactive entry point of the inclusion database.
//!
//! Thin shell over `incllab_core`: owns the menu loop and the
//! load-transform-save cycle; all invariants live in the core crate.

mod chart;
mod flows;
mod prompt;

use flows::Session;
use incllab_core::{default_log_level, init_logging, SqliteStore, StoreError, Tunables};
use std::error::Error;
use std::path::PathBuf;

const DEFAULT_DB_FILE: &str = "db_incl.sqlite3";
const TUNABLES_FILE: &str = "incllab.toml";

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Err(message) = init_logging(default_log_level(), "logs") {
        eprintln!("warning: logging disabled: {message}");
    }

    let db_path: PathBuf = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DB_FILE.to_string())
        .into();
    let tunables = Tunables::load(TUNABLES_FILE)?;

    let store = match SqliteStore::open(&db_path) {
        Ok(store) => store,
        Err(StoreError::NotFound(path)) => {
            if prompt::confirm("Database not found... create?") {
                SqliteStore::create(&path)?
            } else {
                return Ok(());
            }
        }
        Err(err) => return Err(err.into()),
    };

    let mut session = Session {
        store,
        data_dir: PathBuf::from("data"),
        tunables,
    };

    loop {
        println!("\nInclusion database - {}", db_path.display());
        println!("<1>: Import measurement batch");
        println!("<2>: Remove slice");
        println!("<3>: Exclude rectangular zone");
        println!("<4>: Recalibrate circular specimen");
        println!("<5>: Assign divisions");
        println!("<6>: Classify inclusions");
        println!("<7>: Show statistics");
        println!("<8>: Export summary spreadsheet");
        println!("<q>: Quit");

        let Some(line) = prompt::read_line("...: ") else {
            return Ok(());
        };

        let outcome = match line.trim() {
            "1" => session.import(),
            "2" => session.remove(),
            "3" => session.exclude(),
            "4" => session.recalibrate(),
            "5" => session.divide(),
            "6" => session.classify(),
            "7" => session.show_stats(),
            "8" => session.export(),
            "q" | "Q" => return Ok(()),
            _ => Ok(()),
        };

        // An operation failure never ends the session; the store was
        // left untouched by the failed operation.
        if let Err(err) = outcome {
            println!("Operation failed: {err}");
        }
    }
}
