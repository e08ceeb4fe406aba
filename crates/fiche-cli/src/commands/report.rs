use fiche_core::error::FicheError;
use std::path::PathBuf;

use crate::output;
use crate::InputArgs;

pub fn run(
    input: &InputArgs,
    output_format: &str,
    output_file: Option<PathBuf>,
) -> Result<(), FicheError> {
    let report = super::build_report(input)?;

    match output_file {
        Some(path) => {
            // Files always get JSON
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(&path, json)?;
            eprintln!(
                "Report for {} written to {}",
                report.establishment.siret,
                path.display()
            );
        }
        None => match output_format {
            "json" => output::json::print(&report)?,
            _ => output::table::print(&report),
        },
    }

    Ok(())
}
