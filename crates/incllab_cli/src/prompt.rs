//! Stdin prompting: the `Prompter` implementation and the numbered-list
//! selection pattern shared by every entry point.

use incllab_core::interact::Prompter;
use incllab_core::model::Dataset;
use std::io::{self, Write};

/// Blocking stdin/stdout prompter.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn info(&mut self, text: &str) {
        println!("{text}");
    }

    fn choose(&mut self, prompt: &str, options: &[&str]) -> Option<usize> {
        println!("\n{prompt}");
        for (index, option) in options.iter().enumerate() {
            println!("<{}>: {}", index + 1, option);
        }
        println!("Any other entry: cancel");

        let line = read_line("...: ")?;
        match line.trim().parse::<usize>() {
            Ok(choice) if (1..=options.len()).contains(&choice) => Some(choice - 1),
            _ => None,
        }
    }

    fn edit_f64(&mut self, label: &str, current: f64) -> Option<f64> {
        let line = read_line(&format!("{label} ...: [{current:.1}] "))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Some(current);
        }
        trimmed.parse().ok()
    }
}

/// Reads one line from stdin, `None` on EOF or I/O failure.
pub fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    io::stdout().flush().ok()?;

    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

pub fn read_f64(prompt: &str) -> Option<f64> {
    read_line(prompt)?.trim().parse().ok()
}

pub fn read_u32(prompt: &str) -> Option<u32> {
    read_line(prompt)?.trim().parse().ok()
}

/// Asks a y/n question, defaulting to no.
pub fn confirm(prompt: &str) -> bool {
    matches!(read_line(&format!("{prompt} (y/n) ...: [n] ")), Some(line) if line.trim() == "y")
}

/// Numbered specimen selection. With `allow_new`, entry `<0>` creates a
/// new specimen id. Returns `None` when the entry is out of range.
pub fn select_specimen(ids: &[String], allow_new: bool) -> Option<String> {
    println!("\nWhich specimen? Enter sequential number.");
    if allow_new {
        println!("<0>: New specimen");
    }
    println!("Seq. nb\tSpecimen");
    for (index, id) in ids.iter().enumerate() {
        println!("{}\t{}", index + 1, id);
    }

    let line = read_line("...: ")?;
    let choice: usize = line.trim().parse().ok()?;

    if choice == 0 {
        if !allow_new {
            println!("No such specimen");
            return None;
        }
        let id = read_line("New specimen id ...: ")?.trim().to_string();
        if id.is_empty() {
            println!("Invalid name");
            return None;
        }
        return Some(id);
    }

    match ids.get(choice - 1) {
        Some(id) => Some(id.clone()),
        None => {
            println!("No such specimen");
            None
        }
    }
}

/// Slice selection for one specimen. In creation contexts the default is
/// the next sequential slice; otherwise the latest existing one.
pub fn select_slice(dataset: &Dataset, specimen_id: &str, create: bool) -> Option<u32> {
    let slices = dataset.slice_numbers(specimen_id);
    let highest = slices.last().copied().unwrap_or(0);
    let default = if create { highest + 1 } else { highest };
    if default == 0 {
        println!("No slices recorded for `{specimen_id}`");
        return None;
    }

    let line = read_line(&format!("Which slice? [1-{default}] ...: [{default}] "))?;
    let trimmed = line.trim();
    let slice = if trimmed.is_empty() {
        default
    } else {
        trimmed.parse().ok()?
    };

    if slice == 0 || slice > default {
        println!("No such slice");
        return None;
    }
    Some(slice)
}

/// Lists the measurement batches of the data directory and asks for one.
pub fn select_batch_file(files: &[String]) -> Option<String> {
    if files.is_empty() {
        println!("No measurement batches found");
        return None;
    }

    println!("\nWhich batch file? Enter sequential number.");
    println!("Seq. nb\tFile");
    for (index, file) in files.iter().enumerate() {
        println!("{}\t{}", index + 1, file);
    }

    let line = read_line("...: ")?;
    let choice: usize = line.trim().parse().ok()?;
    match choice.checked_sub(1).and_then(|index| files.get(index)) {
        Some(file) => Some(file.clone()),
        None => {
            println!("No such file");
            None
        }
    }
}
