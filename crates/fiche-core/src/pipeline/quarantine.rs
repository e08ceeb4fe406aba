use crate::config::schema::{CategoryConfig, QuantityRule};
use crate::model::{DateField, Manifest, RawManifest};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw values that stand for "no timestamp" rather than a broken one.
pub const NO_VALUE_SENTINELS: &[&str] = &["", "None", "NaT", "null", "NULL"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    Missing,
    Valid(DateTime<Utc>),
    Invalid,
}

/// Parse a raw timestamp. Offsets are converted to UTC, naive values are
/// taken as UTC.
pub fn parse_timestamp(raw: &str) -> ParsedTimestamp {
    let s = raw.trim();
    if NO_VALUE_SENTINELS.contains(&s) {
        return ParsedTimestamp::Missing;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return ParsedTimestamp::Valid(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return ParsedTimestamp::Valid(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return ParsedTimestamp::Valid(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return ParsedTimestamp::Valid(Utc.from_utc_datetime(&naive));
        }
    }

    ParsedTimestamp::Invalid
}

/// Records pulled out of a category's working set, kept for audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quarantine {
    /// Records with an unparsable timestamp, keyed by the first offending
    /// field in check order.
    pub date: BTreeMap<DateField, Vec<RawManifest>>,
    /// Records with an implausible received quantity.
    pub quantity: Vec<Manifest>,
}

impl Quarantine {
    pub fn len(&self) -> usize {
        self.date.values().map(Vec::len).sum::<usize>() + self.quantity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> QuarantineSummary {
        QuarantineSummary {
            date: self.date.iter().map(|(f, v)| (*f, v.len())).collect(),
            quantity: self.quantity.len(),
            total: self.len(),
        }
    }

    /// Ids of every quarantined record.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.date
            .values()
            .flatten()
            .map(|m| m.id.as_str())
            .chain(self.quantity.iter().map(|m| m.id.as_str()))
    }
}

/// Counts of a [`Quarantine`], for reports that do not carry the records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineSummary {
    pub date: BTreeMap<DateField, usize>,
    pub quantity: usize,
    pub total: usize,
}

/// Result of both quarantine passes over one category.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub clean: Vec<Manifest>,
    pub quarantine: Quarantine,
}

/// Run the date pass then the quantity pass.
pub fn partition(records: Vec<RawManifest>, config: &CategoryConfig) -> Partition {
    let (parsed, date) = quarantine_dates(records, &config.date_fields);
    let (clean, quantity) = quarantine_quantities(parsed, &config.quantity_rule);
    Partition {
        clean,
        quarantine: Quarantine { date, quantity },
    }
}

/// Separate records with an unparsable value in any of `fields`.
///
/// Exclusion is row-level: one bad field removes the whole record. Fields
/// outside `fields` are parsed leniently, unparsable values becoming `None`.
///
/// A record with several bad fields is listed once, under the first of them
/// in `fields` order, so the per-field counts add up to the number of
/// records set aside. The other bad fields are still visible on the record.
pub fn quarantine_dates(
    records: Vec<RawManifest>,
    fields: &[DateField],
) -> (Vec<Manifest>, BTreeMap<DateField, Vec<RawManifest>>) {
    let mut clean = Vec::with_capacity(records.len());
    let mut outliers: BTreeMap<DateField, Vec<RawManifest>> = BTreeMap::new();

    for record in records {
        let bad_field = fields.iter().copied().find(|field| {
            record
                .timestamp(*field)
                .is_some_and(|raw| parse_timestamp(raw) == ParsedTimestamp::Invalid)
        });

        if let Some(field) = bad_field {
            outliers.entry(field).or_default().push(record);
            continue;
        }

        let parsed = record.try_map_dates(|_, raw| {
            Ok::<_, std::convert::Infallible>(match parse_timestamp(&raw) {
                ParsedTimestamp::Valid(dt) => Some(dt),
                ParsedTimestamp::Missing | ParsedTimestamp::Invalid => None,
            })
        });
        match parsed {
            Ok(manifest) => clean.push(manifest),
            Err(never) => match never {},
        }
    }

    (clean, outliers)
}

/// Separate records whose received quantity breaks the plausibility rule.
pub fn quarantine_quantities(
    records: Vec<Manifest>,
    rule: &QuantityRule,
) -> (Vec<Manifest>, Vec<Manifest>) {
    records
        .into_iter()
        .partition(|m| !is_quantity_outlier(m, rule))
}

pub fn is_quantity_outlier(record: &Manifest, rule: &QuantityRule) -> bool {
    let Some(quantity) = record.quantity_received else {
        return false;
    };
    if quantity <= rule.max_quantity {
        return false;
    }
    match rule.transport_mode {
        Some(mode) => record.transport_mode == Some(mode),
        None => true,
    }
}

/// Ids of records breaking `sentAt <= receivedAt <= processedAt`.
///
/// These stay in the clean set; they are only reported.
pub fn chronology_violations(records: &[Manifest]) -> Vec<String> {
    records
        .iter()
        .filter(|m| {
            let sent_after_received = matches!(
                (m.sent_at, m.received_at),
                (Some(sent), Some(received)) if sent > received
            );
            let received_after_processed = matches!(
                (m.received_at, m.processed_at),
                (Some(received), Some(processed)) if received > processed
            );
            sent_after_received || received_after_processed
        })
        .map(|m| m.id.clone())
        .collect()
}
