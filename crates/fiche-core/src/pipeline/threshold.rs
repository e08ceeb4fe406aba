use crate::model::{DateField, Manifest, RegulatoryAuthorization};
use crate::period::{days_elapsed_in_year, Window};
use crate::reference::schema::ThresholdPolicy;
use crate::reference::ReferenceTables;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quantities attributed to one regulatory code through the processing
/// operation of the manifests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubriqueActivity {
    /// Weight received with an operation mapped to the code.
    pub inbound: Decimal,
    /// Weight sent with an operation mapped to the code.
    pub outbound: Decimal,
    /// Weight processed on site with an operation mapped to the code.
    pub processed: Decimal,
    pub daily_inbound: BTreeMap<NaiveDate, Decimal>,
}

impl RubriqueActivity {
    fn absorb(&mut self, other: &RubriqueActivity) {
        self.inbound += other.inbound;
        self.outbound += other.outbound;
        self.processed += other.processed;
        add_daily(&mut self.daily_inbound, &other.daily_inbound);
    }
}

/// Threshold-relevant activity of the establishment over the current year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdActivity {
    pub by_rubrique: BTreeMap<String, RubriqueActivity>,
    /// Everything the establishment sent, per day, whatever the operation.
    pub daily_outbound: BTreeMap<NaiveDate, Decimal>,
}

impl ThresholdActivity {
    /// Add `other` into `self`. Every figure is a sum, so activity of several
    /// categories over the same period merges by addition.
    pub fn merge(&mut self, other: &ThresholdActivity) {
        for (code, activity) in &other.by_rubrique {
            self.by_rubrique
                .entry(code.clone())
                .or_default()
                .absorb(activity);
        }
        add_daily(&mut self.daily_outbound, &other.daily_outbound);
    }

    /// Activity summed over every code `authorization` covers, or `None` when
    /// no covered code saw any manifest.
    fn covered_by(&self, authorization: &RegulatoryAuthorization) -> Option<RubriqueActivity> {
        let mut matched = None;
        for (code, activity) in &self.by_rubrique {
            if authorization.covers(code) {
                matched
                    .get_or_insert_with(RubriqueActivity::default)
                    .absorb(activity);
            }
        }
        matched
    }
}

fn add_daily(into: &mut BTreeMap<NaiveDate, Decimal>, from: &BTreeMap<NaiveDate, Decimal>) {
    for (day, quantity) in from {
        *into.entry(*day).or_default() += *quantity;
    }
}

/// Collect the activity of one category's clean records within `period`.
pub fn collect_activity(
    records: &[Manifest],
    siret: &str,
    period: &Window,
    tables: &ReferenceTables,
) -> ThresholdActivity {
    let mut out = ThresholdActivity::default();
    let in_period = |m: &Manifest, field: DateField| {
        m.timestamp(field)
            .filter(|t| period.contains(t))
            .map(|t| t.date_naive())
    };

    for m in records {
        if m.is_emitted_by(siret) {
            if let Some(day) = in_period(m, DateField::SentAt) {
                *out.daily_outbound.entry(day).or_default() += m.outgoing_weight();
            }
        }

        let Some(operation) = m.processing_operation.as_deref() else {
            continue;
        };
        for code in tables.rubriques_for(operation) {
            let activity = out.by_rubrique.entry(code.clone()).or_default();
            if m.is_received_by(siret) {
                if let Some(day) = in_period(m, DateField::ReceivedAt) {
                    activity.inbound += m.received_weight();
                    *activity.daily_inbound.entry(day).or_default() += m.received_weight();
                }
                if in_period(m, DateField::ProcessedAt).is_some() {
                    activity.processed += m.received_weight();
                }
            }
            if m.is_emitted_by(siret) && in_period(m, DateField::SentAt).is_some() {
                activity.outbound += m.outgoing_weight();
            }
        }
    }

    // Codes touched only by manifests outside the period carry no figure.
    out.by_rubrique.retain(|_, a| {
        a.inbound != Decimal::ZERO
            || a.outbound != Decimal::ZERO
            || a.processed != Decimal::ZERO
            || !a.daily_inbound.is_empty()
    });
    out
}

/// Consumption of one declared authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConsumption {
    pub rubrique: String,
    pub policy: ThresholdPolicy,
    pub authorized_volume: Decimal,
    pub unit: String,
    pub consumption: Decimal,
    /// Highest running total reached, for the running-balance policy.
    pub peak: Option<Decimal>,
    /// `consumption / authorized_volume`; `None` for a zero volume.
    pub ratio: Option<Decimal>,
    /// False when no manifest activity maps to the authorization.
    pub matched: bool,
    pub in_force: bool,
}

/// Evaluate every declared authorization against `activity`.
pub fn evaluate(
    authorizations: &[RegulatoryAuthorization],
    activity: &ThresholdActivity,
    tables: &ReferenceTables,
    period: &Window,
) -> Vec<ThresholdConsumption> {
    let days = Decimal::from(days_elapsed_in_year(period.end));
    let today = period.end.date_naive();

    authorizations
        .iter()
        .map(|auth| {
            let key = auth.key();
            let policy = tables.policy_for(&key);
            let covered = activity.covered_by(auth);
            let matched = covered.is_some();
            let a = covered.unwrap_or_default();

            let (consumption, peak) = match policy {
                ThresholdPolicy::Balance => (a.inbound - a.outbound, None),
                ThresholdPolicy::CumulativeInbound => (a.inbound, None),
                ThresholdPolicy::DailyAverage => (a.processed / days, None),
                ThresholdPolicy::RunningBalance => {
                    let (end, peak) = running_balance(&a.daily_inbound, &activity.daily_outbound);
                    (end, Some(peak))
                }
            };

            let ratio = (auth.authorized_volume > Decimal::ZERO)
                .then(|| consumption / auth.authorized_volume);

            ThresholdConsumption {
                rubrique: key,
                policy,
                authorized_volume: auth.authorized_volume,
                unit: auth.unit.clone(),
                consumption,
                peak,
                ratio,
                matched,
                in_force: auth.in_force_on(today),
            }
        })
        .collect()
}

/// Day-by-day running total of `inbound - outbound`, returning the final
/// value and the highest value reached (never below zero, the start value).
pub fn running_balance(
    inbound: &BTreeMap<NaiveDate, Decimal>,
    outbound: &BTreeMap<NaiveDate, Decimal>,
) -> (Decimal, Decimal) {
    let mut days: Vec<&NaiveDate> = inbound.keys().chain(outbound.keys()).collect();
    days.sort();
    days.dedup();

    let mut running = Decimal::ZERO;
    let mut peak = Decimal::ZERO;
    for day in days {
        running += inbound.get(day).copied().unwrap_or_default();
        running -= outbound.get(day).copied().unwrap_or_default();
        peak = peak.max(running);
    }
    (running, peak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawManifest;
    use crate::pipeline::quarantine::quarantine_dates;
    use crate::reference::database::builtin_tables;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    const SITE: &str = "12345678900011";
    const OTHER: &str = "98765432100019";

    fn period() -> Window {
        // 2024-01-10: ten days into the year.
        Window::year_to_date(Utc.with_ymd_and_hms(2024, 1, 10, 18, 0, 0).unwrap())
    }

    fn manifest(json: String) -> Manifest {
        let raw: RawManifest = serde_json::from_str(&json).unwrap();
        quarantine_dates(vec![raw], &DateField::ALL).0.remove(0)
    }

    fn received(op: &str, day: u32, qty: &str) -> Manifest {
        manifest(format!(
            r#"{{ "id": "in-{op}-{day}", "emitterCompanySiret": "{OTHER}",
                 "recipientCompanySiret": "{SITE}", "receivedAt": "2024-01-{day:02}",
                 "processedAt": "2024-01-{day:02}T12:00:00Z",
                 "quantityReceived": {qty}, "processingOperation": "{op}" }}"#
        ))
    }

    fn sent(op: Option<&str>, day: u32, qty: &str) -> Manifest {
        let op = op
            .map(|o| format!(r#", "processingOperation": "{o}""#))
            .unwrap_or_default();
        manifest(format!(
            r#"{{ "id": "out-{day}-{qty}", "emitterCompanySiret": "{SITE}",
                 "recipientCompanySiret": "{OTHER}", "sentAt": "2024-01-{day:02}",
                 "wasteDetailsQuantity": {qty}{op} }}"#
        ))
    }

    fn auth(rubrique: &str, alinea: Option<&str>, volume: Decimal) -> RegulatoryAuthorization {
        RegulatoryAuthorization {
            rubrique: rubrique.into(),
            alinea: alinea.map(String::from),
            authorized_volume: volume,
            unit: "t".into(),
            valid_from: None,
            valid_until: None,
        }
    }

    fn evaluate_one(records: &[Manifest], authorization: RegulatoryAuthorization) -> ThresholdConsumption {
        let tables = builtin_tables();
        let activity = collect_activity(records, SITE, &period(), tables);
        evaluate(&[authorization], &activity, tables, &period()).remove(0)
    }

    #[test]
    fn test_default_balance_policy() {
        let records = vec![received("R3", 2, "10"), sent(Some("R3"), 3, "4")];
        let c = evaluate_one(&records, auth("2790", None, dec!(100)));
        assert_eq!(c.policy, ThresholdPolicy::Balance);
        assert_eq!(c.consumption, dec!(6));
        assert_eq!(c.ratio, Some(dec!(0.06)));
        assert!(c.matched);
    }

    #[test]
    fn test_cumulative_inbound_policy() {
        let records = vec![received("D5", 2, "10"), received("D5", 4, "5"), sent(Some("D5"), 5, "3")];
        let c = evaluate_one(&records, auth("2760", Some("1"), dec!(1000)));
        assert_eq!(c.policy, ThresholdPolicy::CumulativeInbound);
        assert_eq!(c.consumption, dec!(15));
    }

    #[test]
    fn test_daily_average_policy() {
        let records = vec![received("R1", 2, "20"), received("D10", 5, "30")];
        let c = evaluate_one(&records, auth("2770", None, dec!(10)));
        assert_eq!(c.policy, ThresholdPolicy::DailyAverage);
        assert_eq!(c.consumption, dec!(5));
    }

    #[test]
    fn test_running_balance_counts_every_outbound() {
        // In 10 on day 2, out 4 (no operation) on day 3, in 3 on day 6.
        let records = vec![received("R13", 2, "10"), sent(None, 3, "4"), received("D15", 6, "3")];
        let c = evaluate_one(&records, auth("2718", None, dec!(50)));
        assert_eq!(c.policy, ThresholdPolicy::RunningBalance);
        assert_eq!(c.consumption, dec!(9));
        assert_eq!(c.peak, Some(dec!(10)));
    }

    #[test]
    fn test_unmatched_authorization_reports_zero() {
        let records = vec![received("R3", 2, "10")];
        let c = evaluate_one(&records, auth("2760", Some("1"), dec!(100)));
        assert!(!c.matched);
        assert_eq!(c.consumption, Decimal::ZERO);
        assert_eq!(c.ratio, Some(Decimal::ZERO));
    }

    #[test]
    fn test_outside_year_ignored() {
        let mut old = received("R3", 2, "10");
        old.received_at = Some(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap());
        old.processed_at = None;
        let activity = collect_activity(&[old], SITE, &period(), builtin_tables());
        assert!(activity.by_rubrique.is_empty());
    }

    #[test]
    fn test_merge_is_additive() {
        let tables = builtin_tables();
        let a = collect_activity(&[received("R3", 2, "10")], SITE, &period(), tables);
        let b = collect_activity(&[received("R3", 3, "5"), sent(None, 4, "1")], SITE, &period(), tables);
        let mut merged = ThresholdActivity::default();
        merged.merge(&a);
        merged.merge(&b);
        assert_eq!(merged.by_rubrique["2790"].inbound, dec!(15));
        assert_eq!(merged.by_rubrique["2790"].daily_inbound.len(), 2);
        assert_eq!(merged.daily_outbound.values().copied().sum::<Decimal>(), dec!(1));
    }

    #[test]
    fn test_zero_volume_has_no_ratio() {
        let c = evaluate_one(&[], auth("2790", None, Decimal::ZERO));
        assert_eq!(c.ratio, None);
    }

    #[test]
    fn test_running_balance_peak_not_negative() {
        let mut outbound = BTreeMap::new();
        outbound.insert(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), dec!(5));
        let (end, peak) = running_balance(&BTreeMap::new(), &outbound);
        assert_eq!(end, dec!(-5));
        assert_eq!(peak, Decimal::ZERO);
    }
}
