use super::origin::OriginDistribution;
use super::quarantine::{Quarantine, QuarantineSummary};
use super::refusal::RefusalSeries;
use super::revision::RevisionSummary;
use super::stock::StockTable;
use super::summary::{AnnualSummary, FlowRow};
use super::temporal::{MonthlyCounts, TemporalAggregates};
use super::threshold::{ThresholdActivity, ThresholdConsumption};
use crate::model::WasteCategory;
use serde::{Deserialize, Serialize};

/// Emitted and revised counts on a shared month axis, zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmittedRevisedSeries {
    pub emitted: MonthlyCounts,
    pub revised: MonthlyCounts,
}

/// Every figure computed for a category with at least one clean record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: WasteCategory,
    pub raw_count: usize,
    pub clean_count: usize,
    pub quarantine: QuarantineSummary,
    /// Records with a weight converted from kilograms.
    pub unit_corrections: usize,
    /// Clean records whose timestamps run backwards.
    pub chronology_violations: Vec<String>,
    pub summary: AnnualSummary,
    pub monthly: TemporalAggregates,
    pub stock: StockTable,
    /// `None` for categories without a revision workflow.
    pub revisions: Option<RevisionSummary>,
    pub emitted_and_revised: Option<EmittedRevisedSeries>,
    pub refusals: RefusalSeries,
    pub origins: OriginDistribution,
    pub flows: Vec<FlowRow>,
    /// Consumption of each authorization by this category alone.
    pub thresholds: Vec<ThresholdConsumption>,
}

/// Result of one category pipeline, as shown in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryOutcome {
    Ready(Box<CategoryReport>),
    /// No clean record left, or none supplied at all.
    NoData {
        raw_count: usize,
        quarantine: QuarantineSummary,
    },
    /// The input could not be processed; sibling categories are unaffected.
    Failed { reason: String },
}

impl CategoryOutcome {
    pub fn report(&self) -> Option<&CategoryReport> {
        match self {
            CategoryOutcome::Ready(report) => Some(report),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            CategoryOutcome::Ready(_) => "ready",
            CategoryOutcome::NoData { .. } => "no_data",
            CategoryOutcome::Failed { .. } => "failed",
        }
    }
}

/// Everything a category pipeline hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct CategoryRun {
    pub outcome: CategoryOutcome,
    /// Quarantined records, kept for export.
    pub quarantine: Quarantine,
    /// Input of the establishment-wide threshold merge.
    pub activity: ThresholdActivity,
}

impl CategoryRun {
    pub fn failed(reason: String) -> CategoryRun {
        CategoryRun {
            outcome: CategoryOutcome::Failed { reason },
            quarantine: Quarantine::default(),
            activity: ThresholdActivity::default(),
        }
    }
}
