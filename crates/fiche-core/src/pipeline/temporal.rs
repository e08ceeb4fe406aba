use crate::model::{Acceptance, DateField, Manifest, ManifestStatus};
use crate::period::YearMonth;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type MonthlyCounts = BTreeMap<YearMonth, u64>;
pub type MonthlyWeights = BTreeMap<YearMonth, Decimal>;

/// Acceptance outcome of an emitted manifest, with "not received yet" for
/// manifests the recipient has not signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceBucket {
    Accepted,
    Refused,
    PartiallyRefused,
    NotReceived,
    /// A status the engine does not know.
    Other,
}

impl From<Option<Acceptance>> for AcceptanceBucket {
    fn from(value: Option<Acceptance>) -> Self {
        match value {
            Some(Acceptance::Accepted) => AcceptanceBucket::Accepted,
            Some(Acceptance::Refused) => AcceptanceBucket::Refused,
            Some(Acceptance::PartiallyRefused) => AcceptanceBucket::PartiallyRefused,
            Some(Acceptance::Other) => AcceptanceBucket::Other,
            None => AcceptanceBucket::NotReceived,
        }
    }
}

/// Monthly series of one category, seen from the establishment.
///
/// Only months holding at least one record appear.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalAggregates {
    /// Manifests emitted, by month of creation.
    pub emitted: MonthlyCounts,
    /// Manifests received, by month of reception.
    pub received: MonthlyCounts,
    /// Emitted manifests by month of creation and lifecycle status.
    pub emitted_by_status: BTreeMap<YearMonth, BTreeMap<ManifestStatus, u64>>,
    /// Emitted manifests by month of sending and acceptance outcome.
    pub emitted_by_acceptance: BTreeMap<YearMonth, BTreeMap<AcceptanceBucket, u64>>,
    /// Received weight in tons, by month of reception.
    pub incoming_weight: MonthlyWeights,
    /// Sent weight in tons, by month of sending.
    pub outgoing_weight: MonthlyWeights,
}

pub fn aggregate(records: &[Manifest], siret: &str) -> TemporalAggregates {
    let emitted: Vec<&Manifest> = records.iter().filter(|m| m.is_emitted_by(siret)).collect();
    let received: Vec<&Manifest> = records.iter().filter(|m| m.is_received_by(siret)).collect();

    let mut out = TemporalAggregates {
        emitted: count_by_month(emitted.iter().copied(), DateField::CreatedAt),
        received: count_by_month(received.iter().copied(), DateField::ReceivedAt),
        incoming_weight: sum_by_month(received.iter().copied(), DateField::ReceivedAt, |m| {
            m.received_weight()
        }),
        outgoing_weight: sum_by_month(emitted.iter().copied(), DateField::SentAt, |m| {
            m.outgoing_weight()
        }),
        ..Default::default()
    };

    for m in &emitted {
        if let Some(month) = month_of(m, DateField::CreatedAt) {
            *out.emitted_by_status
                .entry(month)
                .or_default()
                .entry(m.status)
                .or_default() += 1;
        }
        if let Some(month) = month_of(m, DateField::SentAt) {
            *out.emitted_by_acceptance
                .entry(month)
                .or_default()
                .entry(AcceptanceBucket::from(m.acceptance))
                .or_default() += 1;
        }
    }

    out
}

pub fn month_of(record: &Manifest, field: DateField) -> Option<YearMonth> {
    record.timestamp(field).map(YearMonth::of)
}

/// Count records per calendar month of `field`; records without the
/// timestamp are skipped.
pub fn count_by_month<'a>(
    records: impl IntoIterator<Item = &'a Manifest>,
    field: DateField,
) -> MonthlyCounts {
    let mut counts = MonthlyCounts::new();
    for m in records {
        if let Some(month) = month_of(m, field) {
            *counts.entry(month).or_default() += 1;
        }
    }
    counts
}

/// Sum `weight` per calendar month of `field`.
pub fn sum_by_month<'a>(
    records: impl IntoIterator<Item = &'a Manifest>,
    field: DateField,
    weight: impl Fn(&Manifest) -> Decimal,
) -> MonthlyWeights {
    let mut sums = MonthlyWeights::new();
    for m in records {
        if let Some(month) = month_of(m, field) {
            *sums.entry(month).or_default() += weight(m);
        }
    }
    sums
}

/// Copy of `series` with every month of `first..=last` present, missing
/// months set to the default value.
pub fn fill_months<T: Clone + Default>(
    series: &BTreeMap<YearMonth, T>,
    first: YearMonth,
    last: YearMonth,
) -> BTreeMap<YearMonth, T> {
    first
        .through(last)
        .into_iter()
        .map(|month| (month, series.get(&month).cloned().unwrap_or_default()))
        .collect()
}

/// Fill two series over the union of their month ranges so they can share
/// one chart axis.
pub fn align<A: Clone + Default, B: Clone + Default>(
    a: &BTreeMap<YearMonth, A>,
    b: &BTreeMap<YearMonth, B>,
) -> (BTreeMap<YearMonth, A>, BTreeMap<YearMonth, B>) {
    let first = a.keys().next().into_iter().chain(b.keys().next()).min();
    let last = a.keys().next_back().into_iter().chain(b.keys().next_back()).max();
    match (first, last) {
        (Some(&first), Some(&last)) => (fill_months(a, first, last), fill_months(b, first, last)),
        _ => (BTreeMap::new(), BTreeMap::new()),
    }
}
