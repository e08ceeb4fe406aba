use crate::model::{DateField, Manifest};
use crate::period::Window;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SECONDS_PER_DAY: i64 = 86_400;

/// Headline figures of one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub emitted: u64,
    /// Emitted manifests in a final state.
    pub archived: u64,
    /// Revision events.
    pub revised: u64,
    /// Received manifests processed later than the allowed delay.
    pub late_processing: u64,
    /// Weight received in the window.
    pub incoming_weight: Decimal,
    /// Declared weight sent in the window.
    pub outgoing_weight: Decimal,
    /// `incoming - outgoing`, not clamped.
    pub theoretical_stock: Decimal,
    /// Outgoing weight as a whole percentage of incoming; `None` without
    /// incoming weight.
    pub outgoing_percent: Option<i64>,
}

pub fn annual_summary(
    records: &[Manifest],
    siret: &str,
    window: &Window,
    revision_events: u64,
    max_delay_days: Decimal,
) -> AnnualSummary {
    let in_window =
        |m: &Manifest, field: DateField| m.timestamp(field).is_some_and(|t| window.contains(t));

    let mut s = AnnualSummary {
        revised: revision_events,
        ..Default::default()
    };

    for m in records {
        if m.is_emitted_by(siret) {
            s.emitted += 1;
            if m.is_archived() {
                s.archived += 1;
            }
            if in_window(m, DateField::SentAt) {
                s.outgoing_weight += m.outgoing_weight();
            }
        }
        if m.is_received_by(siret) {
            if in_window(m, DateField::ReceivedAt) {
                s.incoming_weight += m.received_weight();
            }
            if processing_delay_days(m).is_some_and(|d| d > max_delay_days) {
                s.late_processing += 1;
            }
        }
    }

    s.theoretical_stock = s.incoming_weight - s.outgoing_weight;
    if !s.incoming_weight.is_zero() {
        s.outgoing_percent = (s.outgoing_weight / s.incoming_weight)
            .round_dp(2)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|p| p.to_i64());
    }
    s
}

/// Days between reception and processing, fractional.
pub fn processing_delay_days(record: &Manifest) -> Option<Decimal> {
    let (received, processed) = (record.received_at?, record.processed_at?);
    let seconds = (processed - received).num_seconds();
    Some(Decimal::from(seconds) / Decimal::from(SECONDS_PER_DAY))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRow {
    pub waste_code: String,
    pub direction: Direction,
    pub quantity: Decimal,
}

/// Received quantity per waste code and direction, positive rows only.
///
/// A manifest the establishment both emitted and received counts as
/// outgoing.
pub fn waste_flows(records: &[Manifest], siret: &str) -> Vec<FlowRow> {
    let mut sums: BTreeMap<(String, Direction), Decimal> = BTreeMap::new();
    for m in records {
        let direction = if m.is_emitted_by(siret) {
            Direction::Outgoing
        } else if m.is_received_by(siret) {
            Direction::Incoming
        } else {
            continue;
        };
        *sums.entry((m.waste_code.clone(), direction)).or_default() += m.received_weight();
    }

    sums.into_iter()
        .filter(|(_, q)| *q > Decimal::ZERO)
        .map(|((waste_code, direction), quantity)| FlowRow {
            waste_code,
            direction,
            quantity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawManifest;
    use crate::pipeline::quarantine::quarantine_dates;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    const SITE: &str = "12345678900011";
    const OTHER: &str = "98765432100019";

    fn records() -> Vec<Manifest> {
        let raw: Vec<RawManifest> = serde_json::from_str(&format!(
            r#"[
                {{ "id": "E1", "wasteCode": "B", "emitterCompanySiret": "{SITE}", "recipientCompanySiret": "{OTHER}",
                   "sentAt": "2024-03-01", "wasteDetailsQuantity": 3, "quantityReceived": 2.5,
                   "status": "PROCESSED" }},
                {{ "id": "E2", "wasteCode": "B", "emitterCompanySiret": "{SITE}", "status": "SENT",
                   "sentAt": "2022-01-01", "wasteDetailsQuantity": 7 }},
                {{ "id": "R1", "wasteCode": "A", "emitterCompanySiret": "{OTHER}", "recipientCompanySiret": "{SITE}",
                   "receivedAt": "2024-02-01", "processedAt": "2024-03-15", "quantityReceived": 12 }},
                {{ "id": "R2", "wasteCode": "B", "emitterCompanySiret": "{OTHER}", "recipientCompanySiret": "{SITE}",
                   "receivedAt": "2024-02-01", "processedAt": "2024-02-10", "quantityReceived": 0 }}
            ]"#
        ))
        .unwrap();
        quarantine_dates(raw, &DateField::ALL).0
    }

    fn window() -> Window {
        Window::trailing(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), 365).unwrap()
    }

    #[test]
    fn test_annual_counts() {
        let s = annual_summary(&records(), SITE, &window(), 4, dec!(30.436875));
        assert_eq!(s.emitted, 2);
        assert_eq!(s.archived, 1);
        assert_eq!(s.revised, 4);
        assert_eq!(s.late_processing, 1);
    }

    #[test]
    fn test_untraced_manifest_counts_as_archived() {
        let mut records = records();
        records[1].no_traceability = true;
        let s = annual_summary(&records, SITE, &window(), 0, dec!(30.436875));
        assert_eq!(s.archived, 2);
    }

    #[test]
    fn test_annual_weights() {
        let s = annual_summary(&records(), SITE, &window(), 0, dec!(30.436875));
        assert_eq!(s.incoming_weight, dec!(12));
        assert_eq!(s.outgoing_weight, dec!(3));
        assert_eq!(s.theoretical_stock, dec!(9));
        assert_eq!(s.outgoing_percent, Some(25));
    }

    #[test]
    fn test_no_incoming_no_percent() {
        let s = annual_summary(&[], SITE, &window(), 0, dec!(30));
        assert_eq!(s.outgoing_percent, None);
        assert_eq!(s.theoretical_stock, Decimal::ZERO);
    }

    #[test]
    fn test_processing_delay() {
        let records = records();
        assert_eq!(processing_delay_days(&records[3]), Some(dec!(9)));
        assert_eq!(processing_delay_days(&records[0]), None);
    }

    #[test]
    fn test_flow_rows_sorted_and_positive() {
        let flows = waste_flows(&records(), SITE);
        let rows: Vec<(&str, Direction)> = flows
            .iter()
            .map(|f| (f.waste_code.as_str(), f.direction))
            .collect();
        assert_eq!(rows, vec![("A", Direction::Incoming), ("B", Direction::Outgoing)]);
        assert_eq!(flows[1].quantity, dec!(2.5));
    }
}
