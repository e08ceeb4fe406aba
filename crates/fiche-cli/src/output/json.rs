use fiche_core::error::FicheError;
use fiche_core::report::Report;

pub fn print(report: &Report) -> Result<(), FicheError> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    Ok(())
}
