use crate::model::{Acceptance, DateField, Manifest};
use crate::period::YearMonth;
use crate::pipeline::temporal::month_of;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of emitted manifests refused at reception.
///
/// `NoData` (a month without emissions) serializes as `null`, distinct from
/// a real `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Decimal>", into = "Option<Decimal>")]
pub enum RefusalRate {
    NoData,
    Rate(Decimal),
}

impl RefusalRate {
    pub fn compute(refused: u64, emitted: u64) -> RefusalRate {
        if emitted == 0 {
            RefusalRate::NoData
        } else {
            RefusalRate::Rate(Decimal::from(refused) / Decimal::from(emitted))
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            RefusalRate::NoData => None,
            RefusalRate::Rate(r) => Some(*r),
        }
    }
}

impl From<Option<Decimal>> for RefusalRate {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(RefusalRate::NoData, RefusalRate::Rate)
    }
}

impl From<RefusalRate> for Option<Decimal> {
    fn from(rate: RefusalRate) -> Self {
        rate.value()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRefusal {
    pub emitted: u64,
    pub refused: u64,
    pub rate: RefusalRate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefusalSeries {
    /// Every month between the first and last emission, gaps included.
    pub months: BTreeMap<YearMonth, MonthlyRefusal>,
    pub overall: Option<RefusalRate>,
}

/// Monthly refusal rate of manifests emitted by `siret`, bucketed by
/// creation month. Partial refusals are not counted as refused.
pub fn refusal_rates(records: &[Manifest], siret: &str) -> RefusalSeries {
    let mut counts: BTreeMap<YearMonth, (u64, u64)> = BTreeMap::new();
    for m in records.iter().filter(|m| m.is_emitted_by(siret)) {
        let Some(month) = month_of(m, DateField::CreatedAt) else {
            continue;
        };
        let entry = counts.entry(month).or_default();
        entry.0 += 1;
        if m.acceptance == Some(Acceptance::Refused) {
            entry.1 += 1;
        }
    }

    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return RefusalSeries::default();
    };

    let months = first
        .through(last)
        .into_iter()
        .map(|month| {
            let (emitted, refused) = counts.get(&month).copied().unwrap_or_default();
            (
                month,
                MonthlyRefusal {
                    emitted,
                    refused,
                    rate: RefusalRate::compute(refused, emitted),
                },
            )
        })
        .collect();

    let (emitted, refused) = counts
        .values()
        .fold((0, 0), |acc, (e, r)| (acc.0 + e, acc.1 + r));

    RefusalSeries {
        months,
        overall: Some(RefusalRate::compute(refused, emitted)),
    }
}
