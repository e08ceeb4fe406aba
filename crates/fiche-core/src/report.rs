use crate::cancel::CancelToken;
use crate::config::schema::EngineConfig;
use crate::error::FicheError;
use crate::model::{CompanyType, Establishment, Receipt, ReportInput, WasteCategory};
use crate::period::Window;
use crate::pipeline::outcome::{CategoryOutcome, CategoryRun};
use crate::pipeline::quarantine::Quarantine;
use crate::pipeline::threshold::{self, ThresholdActivity, ThresholdConsumption};
use crate::pipeline::{run_category, RunContext};
use crate::reference::ReferenceTables;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A receipt echoed with its validity at the run date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptStatus {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstablishmentHeader {
    pub siret: String,
    pub name: String,
    pub address: String,
    pub company_types: Vec<CompanyType>,
    pub s3ic_code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub receipts: Vec<ReceiptStatus>,
}

impl EstablishmentHeader {
    fn new(establishment: &Establishment, as_of: DateTime<Utc>) -> EstablishmentHeader {
        EstablishmentHeader {
            siret: establishment.siret.clone(),
            name: establishment.name.clone(),
            address: establishment.address.clone(),
            company_types: establishment.company_types.clone(),
            s3ic_code: establishment.s3ic_code.clone(),
            created_at: establishment.created_at,
            receipts: establishment
                .receipts
                .iter()
                .map(|r| ReceiptStatus {
                    receipt: r.clone(),
                    expired: r.validity_limit.is_some_and(|limit| limit < as_of),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub as_of: DateTime<Utc>,
    /// Trailing window of stock, weight and origin figures.
    pub window: Window,
    /// Current year to date, for threshold consumption.
    pub year: Window,
}

/// Establishment-wide consumption of the declared authorizations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ThresholdReport {
    NoAuthorizations,
    Evaluated { items: Vec<ThresholdConsumption> },
}

/// The merged output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub establishment: EstablishmentHeader,
    pub period: ReportPeriod,
    pub categories: BTreeMap<WasteCategory, CategoryOutcome>,
    pub thresholds: ThresholdReport,
    /// Quarantined records per category, exported on request only.
    #[serde(skip)]
    pub quarantines: BTreeMap<WasteCategory, Quarantine>,
}

/// Reject anything but exactly 14 ASCII digits.
pub fn validate_siret(siret: &str) -> Result<(), FicheError> {
    if siret.len() == 14 && siret.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(FicheError::InvalidSiret(siret.to_string()))
    }
}

/// Run every category pipeline concurrently and merge the results.
///
/// A category whose input is malformed ends up `failed` without affecting
/// the others. Cancellation aborts the whole run.
pub fn generate_report(
    mut input: ReportInput,
    config: &EngineConfig,
    tables: &ReferenceTables,
    as_of: DateTime<Utc>,
    cancel: &CancelToken,
) -> Result<Report, FicheError> {
    let establishment = &input.establishment;
    validate_siret(&establishment.siret)?;
    let siret = establishment.siret.as_str();

    let window = Window::trailing(as_of, config.stock_window_days).ok_or_else(|| {
        FicheError::ConfigInvalid(format!(
            "stock_window_days {} reaches before the earliest supported date",
            config.stock_window_days
        ))
    })?;
    let period = ReportPeriod {
        as_of,
        window,
        year: Window::year_to_date(as_of),
    };
    log::info!(
        "siret={siret} report: generating as of {as_of} (window from {})",
        period.window.start
    );

    let mut inputs: Vec<_> = WasteCategory::ALL
        .into_iter()
        .map(|category| {
            let data = input.categories.remove(&category).unwrap_or_default();
            (category, data)
        })
        .collect();

    let ctx = RunContext {
        establishment,
        authorizations: &input.authorizations,
        config,
        tables,
        window: &period.window,
        year: &period.year,
        cancel,
    };

    let results: Vec<(WasteCategory, Result<CategoryRun, FicheError>)> =
        std::thread::scope(|scope| {
            let handles: Vec<_> = inputs
                .drain(..)
                .map(|(category, data)| {
                    (
                        category,
                        scope.spawn(move || run_category(category, data, ctx)),
                    )
                })
                .collect();
            handles
                .into_iter()
                .map(|(category, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(FicheError::MalformedInput {
                            category,
                            reason: "category pipeline panicked".into(),
                        })
                    });
                    (category, result)
                })
                .collect()
        });

    cancel.check()?;

    let mut categories = BTreeMap::new();
    let mut quarantines = BTreeMap::new();
    let mut activity = ThresholdActivity::default();
    for (category, result) in results {
        let run = match result {
            Ok(run) => run,
            Err(FicheError::Cancelled) => return Err(FicheError::Cancelled),
            Err(e) => {
                log::warn!("siret={siret} {category}: failed: {e}");
                CategoryRun::failed(e.to_string())
            }
        };
        activity.merge(&run.activity);
        categories.insert(category, run.outcome);
        quarantines.insert(category, run.quarantine);
    }

    let thresholds = if input.authorizations.is_empty() {
        ThresholdReport::NoAuthorizations
    } else {
        ThresholdReport::Evaluated {
            items: threshold::evaluate(&input.authorizations, &activity, tables, &period.year),
        }
    };

    let ready = categories
        .values()
        .filter(|o| matches!(o, CategoryOutcome::Ready(_)))
        .count();
    log::info!("siret={siret} report: done, {ready}/{} categories with data", categories.len());

    Ok(Report {
        establishment: EstablishmentHeader::new(&input.establishment, as_of),
        period,
        categories,
        thresholds,
        quarantines,
    })
}

/// One client context. Starting a run cancels the run started before it.
#[derive(Debug, Default)]
pub struct ReportSession {
    current: Mutex<Option<CancelToken>>,
}

impl ReportSession {
    pub fn new() -> ReportSession {
        ReportSession::default()
    }

    /// Cancel the in-flight run, if any, and hand out a token for the next.
    pub fn begin(&self) -> CancelToken {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.take() {
            previous.cancel();
        }
        let token = CancelToken::new();
        *current = Some(token.clone());
        token
    }

    pub fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
    }

    pub fn run(
        &self,
        input: ReportInput,
        config: &EngineConfig,
        tables: &ReferenceTables,
        as_of: DateTime<Utc>,
    ) -> Result<Report, FicheError> {
        let token = self.begin();
        generate_report(input, config, tables, as_of, &token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_siret_validation() {
        assert!(validate_siret("12345678900011").is_ok());
        assert!(validate_siret("1234567890001").is_err());
        assert!(validate_siret("1234567890001A").is_err());
        assert!(validate_siret(" 2345678900011").is_err());
    }

    #[test]
    fn test_session_cancels_previous_run() {
        let session = ReportSession::new();
        let first = session.begin();
        let second = session.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        session.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_overlong_stock_window_is_config_error() {
        let mut config = crate::config::builtin::default_config().unwrap();
        config.stock_window_days = 1_000_000_000;
        let input: ReportInput =
            serde_json::from_str(r#"{ "establishment": { "siret": "12345678900011" } }"#).unwrap();
        let as_of = "2024-06-15T12:00:00Z".parse().unwrap();

        let err = generate_report(
            input,
            &config,
            crate::reference::database::builtin_tables(),
            as_of,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FicheError::ConfigInvalid(_)));
    }

    #[test]
    fn test_expired_receipt_flagged() {
        let establishment: Establishment = serde_json::from_str(
            r#"{ "siret": "12345678900011", "receipts": [
                { "kind": "transporter_receipt", "number": "T-1", "validityLimit": "2024-01-01T00:00:00Z" },
                { "kind": "broker_receipt", "number": "B-1", "validityLimit": "2030-01-01T00:00:00Z" },
                { "kind": "trader_receipt", "number": "N-1" }
            ] }"#,
        )
        .unwrap();
        let as_of = "2024-06-01T00:00:00Z".parse().unwrap();
        let header = EstablishmentHeader::new(&establishment, as_of);
        let expired: Vec<bool> = header.receipts.iter().map(|r| r.expired).collect();
        assert_eq!(expired, vec![true, false, false]);
    }
}
