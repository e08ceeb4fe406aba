pub mod config;
pub mod quarantine;
pub mod reference;
pub mod report;

use chrono::{DateTime, NaiveDate, Utc};
use fiche_core::cancel::CancelToken;
use fiche_core::config::schema::EngineConfig;
use fiche_core::error::FicheError;
use fiche_core::report::Report;
use fiche_core::source::{JsonBundleSource, ManifestSource, XlsxWorkbookSource};
use rust_decimal::Decimal;
use std::path::Path;

use crate::InputArgs;

/// Load the records named on the command line and run the engine on them.
pub fn build_report(input: &InputArgs) -> Result<Report, FicheError> {
    let config = effective_config(input)?;
    let as_of = match input.as_of.as_deref() {
        Some(s) => parse_as_of(s)?,
        None => Utc::now(),
    };

    let source: Box<dyn ManifestSource> = if is_workbook(&input.input_file) {
        let Some(path) = input.establishment.as_deref() else {
            return Err(FicheError::ConfigInvalid(
                "--establishment is required for XLSX input".into(),
            ));
        };
        let profile = JsonBundleSource::new(path).load()?;
        Box::new(XlsxWorkbookSource::new(
            &input.input_file,
            profile.establishment,
            profile.authorizations,
        ))
    } else {
        Box::new(JsonBundleSource::new(&input.input_file))
    };

    fiche_core::report_from_source(source.as_ref(), &config, as_of, &CancelToken::new())
}

fn effective_config(input: &InputArgs) -> Result<EngineConfig, FicheError> {
    let mut config = match input.config.as_deref() {
        Some(path) => fiche_core::config::load_config(path)?,
        None => fiche_core::config::builtin::default_config()?,
    };

    if let Some(ref raw) = input.kg_threshold {
        config.kg_threshold = raw.trim().parse::<Decimal>().map_err(|_| {
            FicheError::ConfigInvalid(format!("--kg-threshold: '{raw}' is not a number"))
        })?;
    }
    if let Some(n) = input.top_n {
        config.origin_top_n = n;
    }
    if let Some(level) = input.level {
        config.origin_level = level.into();
    }

    fiche_core::config::validate_config(&config)?;
    Ok(config)
}

/// A bare date means the end of that day.
fn parse_as_of(s: &str) -> Result<DateTime<Utc>, FicheError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            FicheError::ConfigInvalid(format!(
                "--as-of: '{s}' is not a date (expected YYYY-MM-DD or RFC 3339)"
            ))
        })
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm"))
        .unwrap_or(false)
}
