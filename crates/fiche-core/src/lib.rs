pub mod cancel;
pub mod config;
pub mod error;
pub mod model;
pub mod period;
pub mod pipeline;
pub mod reference;
pub mod report;
pub mod source;

use cancel::CancelToken;
use chrono::{DateTime, Utc};
use config::schema::EngineConfig;
use error::FicheError;
use report::Report;
use source::ManifestSource;

pub use pipeline::outcome::{CategoryOutcome, CategoryReport};
pub use report::{generate_report, ReportSession};

/// Main API entry point: load an establishment's records from `source` and
/// build its report against the builtin reference tables.
pub fn report_from_source(
    source: &dyn ManifestSource,
    config: &EngineConfig,
    as_of: DateTime<Utc>,
    cancel: &CancelToken,
) -> Result<Report, FicheError> {
    log::debug!("loading records with the {} source", source.backend_name());
    let input = source.load()?;
    cancel.check()?;
    generate_report(
        input,
        config,
        reference::database::builtin_tables(),
        as_of,
        cancel,
    )
}
