use fiche_core::error::FicheError;
use std::path::PathBuf;

use crate::InputArgs;

pub fn run(input: &InputArgs, output_file: Option<PathBuf>) -> Result<(), FicheError> {
    let report = super::build_report(input)?;
    let json = serde_json::to_string_pretty(&report.quarantines)?;

    match output_file {
        Some(path) => {
            std::fs::write(&path, json)?;
            let total: usize = report.quarantines.values().map(|q| q.len()).sum();
            eprintln!("{total} quarantined record(s) written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
