use crate::model::{DateField, TransportMode, WasteCategory};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunables of one report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Weights above this value are taken as kilograms and divided by 1000.
    pub kg_threshold: Decimal,
    /// Length of the trailing stock window, rounded back to a month start.
    pub stock_window_days: i64,
    /// Number of origins kept before the remainder is collapsed.
    pub origin_top_n: usize,
    pub origin_level: OriginLevel,
    /// Reception-to-processing delay above which a manifest counts as late.
    pub max_processing_delay_days: Decimal,
    pub categories: BTreeMap<WasteCategory, CategoryConfig>,
}

/// Per-category knobs of the shared pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Timestamp columns parsed by the date quarantine, in check order.
    pub date_fields: Vec<DateField>,
    /// Columns that must be present on at least one record.
    #[serde(default)]
    pub required_fields: Vec<DateField>,
    pub quantity_rule: QuantityRule,
    #[serde(default)]
    pub has_revisions: bool,
}

/// Received quantities above `max_quantity` are implausible, restricted to
/// one transport mode when `transport_mode` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityRule {
    pub max_quantity: Decimal,
    #[serde(default)]
    pub transport_mode: Option<TransportMode>,
}

/// Granularity of the geographic origin breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginLevel {
    #[default]
    Department,
    Region,
}

/// Partial config read from a user file; every field present replaces the
/// builtin value, category entries replace whole categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub kg_threshold: Option<Decimal>,
    #[serde(default)]
    pub stock_window_days: Option<i64>,
    #[serde(default)]
    pub origin_top_n: Option<usize>,
    #[serde(default)]
    pub origin_level: Option<OriginLevel>,
    #[serde(default)]
    pub max_processing_delay_days: Option<Decimal>,
    #[serde(default)]
    pub categories: BTreeMap<WasteCategory, CategoryConfig>,
}

impl EngineConfig {
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(v) = overrides.kg_threshold {
            self.kg_threshold = v;
        }
        if let Some(v) = overrides.stock_window_days {
            self.stock_window_days = v;
        }
        if let Some(v) = overrides.origin_top_n {
            self.origin_top_n = v;
        }
        if let Some(v) = overrides.origin_level {
            self.origin_level = v;
        }
        if let Some(v) = overrides.max_processing_delay_days {
            self.max_processing_delay_days = v;
        }
        self.categories.extend(overrides.categories);
    }

    pub fn category(&self, category: WasteCategory) -> Option<&CategoryConfig> {
        self.categories.get(&category)
    }
}
