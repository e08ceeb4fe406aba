pub mod normalize;
pub mod origin;
pub mod outcome;
pub mod quarantine;
pub mod refusal;
pub mod revision;
pub mod stock;
pub mod summary;
pub mod temporal;
pub mod threshold;

use crate::cancel::CancelToken;
use crate::config::schema::{CategoryConfig, EngineConfig};
use crate::error::FicheError;
use crate::model::{
    CategoryInput, DateField, Establishment, RawManifest, RegulatoryAuthorization, WasteCategory,
};
use crate::period::Window;
use crate::reference::ReferenceTables;
use outcome::{CategoryOutcome, CategoryReport, CategoryRun, EmittedRevisedSeries};
use quarantine::{parse_timestamp, ParsedTimestamp};

/// Read-only inputs shared by every category pipeline of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub establishment: &'a Establishment,
    pub authorizations: &'a [RegulatoryAuthorization],
    pub config: &'a EngineConfig,
    pub tables: &'a ReferenceTables,
    /// Trailing window of the stock and weight figures.
    pub window: &'a Window,
    /// Current year up to the run date, for thresholds.
    pub year: &'a Window,
    pub cancel: &'a CancelToken,
}

/// Run the full pipeline over one category.
///
/// Malformed input is an `Err` the caller turns into a failed outcome; an
/// empty clean set is a `NoData` outcome.
pub fn run_category(
    category: WasteCategory,
    input: CategoryInput,
    ctx: RunContext<'_>,
) -> Result<CategoryRun, FicheError> {
    let siret = ctx.establishment.siret.as_str();
    let settings = ctx.config.category(category).ok_or_else(|| {
        FicheError::ConfigInvalid(format!("missing settings for category {category}"))
    })?;

    let CategoryInput {
        mut manifests,
        revisions,
        load_error,
    } = input;
    if let Some(reason) = load_error {
        return Err(FicheError::MalformedInput { category, reason });
    }
    let raw_count = manifests.len();
    log::info!("siret={siret} {category}: {raw_count} manifests received");

    check_required_fields(category, &manifests, settings)?;
    ctx.cancel.check()?;

    // Kilogram correction comes first so the quantity pass sees tons.
    let unit_corrections = manifests
        .iter_mut()
        .map(|m| normalize::normalize_manifest(m, ctx.config.kg_threshold))
        .filter(|corrected| *corrected)
        .count();
    if unit_corrections > 0 {
        log::debug!("siret={siret} {category}: {unit_corrections} weights converted from kg");
    }

    let quarantine::Partition { clean, quarantine } = quarantine::partition(manifests, settings);
    let quarantine_summary = quarantine.summary();
    if !quarantine.is_empty() {
        log::info!(
            "siret={siret} {category}: quarantined {} records ({} quantity, {:?} date)",
            quarantine_summary.total,
            quarantine_summary.quantity,
            quarantine_summary.date
        );
    }
    ctx.cancel.check()?;

    if clean.is_empty() {
        log::info!("siret={siret} {category}: no clean records");
        return Ok(CategoryRun {
            outcome: CategoryOutcome::NoData {
                raw_count,
                quarantine: quarantine_summary,
            },
            quarantine,
            activity: Default::default(),
        });
    }

    let chronology_violations = quarantine::chronology_violations(&clean);
    if !chronology_violations.is_empty() {
        log::warn!(
            "siret={siret} {category}: {} records with out-of-order timestamps",
            chronology_violations.len()
        );
    }

    let monthly = temporal::aggregate(&clean, siret);
    let stock = stock::reconcile(&clean, siret, ctx.window);
    ctx.cancel.check()?;

    let revisions = match (settings.has_revisions, revisions) {
        (true, revisions) => Some(revision::reconcile(
            revisions.as_deref().unwrap_or_default(),
            &clean,
            ctx.establishment,
        )),
        (false, Some(ignored)) if !ignored.is_empty() => {
            log::debug!(
                "siret={siret} {category}: ignoring {} revisions, category has no revision workflow",
                ignored.len()
            );
            None
        }
        (false, _) => None,
    };
    let emitted_and_revised = revisions.as_ref().map(|r| {
        let (emitted, revised) = temporal::align(&monthly.emitted, &r.per_month());
        EmittedRevisedSeries { emitted, revised }
    });

    let refusals = refusal::refusal_rates(&clean, siret);
    let origins = origin::aggregate_origins(
        &clean,
        siret,
        ctx.window,
        ctx.tables,
        ctx.config.origin_level,
        ctx.config.origin_top_n,
    );
    ctx.cancel.check()?;

    let activity = threshold::collect_activity(&clean, siret, ctx.year, ctx.tables);
    let thresholds = threshold::evaluate(ctx.authorizations, &activity, ctx.tables, ctx.year);

    let summary = summary::annual_summary(
        &clean,
        siret,
        ctx.window,
        revisions.as_ref().map_or(0, |r| r.events),
        ctx.config.max_processing_delay_days,
    );
    let flows = summary::waste_flows(&clean, siret);

    log::info!(
        "siret={siret} {category}: {} clean records, stock total {}",
        clean.len(),
        stock.total
    );

    let report = CategoryReport {
        category,
        raw_count,
        clean_count: clean.len(),
        quarantine: quarantine_summary,
        unit_corrections,
        chronology_violations,
        summary,
        monthly,
        stock,
        revisions,
        emitted_and_revised,
        refusals,
        origins,
        flows,
        thresholds,
    };

    Ok(CategoryRun {
        outcome: CategoryOutcome::Ready(Box::new(report)),
        quarantine,
        activity,
    })
}

/// Fail when a required timestamp is absent from every record of a
/// non-empty category.
pub fn check_required_fields(
    category: WasteCategory,
    records: &[RawManifest],
    settings: &CategoryConfig,
) -> Result<(), FicheError> {
    if records.is_empty() {
        return Ok(());
    }
    for field in &settings.required_fields {
        if !records.iter().any(|m| has_value(m, *field)) {
            return Err(FicheError::MissingField {
                category,
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

fn has_value(record: &RawManifest, field: DateField) -> bool {
    record
        .timestamp(field)
        .is_some_and(|raw| parse_timestamp(raw) != ParsedTimestamp::Missing)
}
