use crate::model::{DateField, Manifest};
use crate::period::Window;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Movements of one waste code inside the stock window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBalance {
    pub received: Decimal,
    pub emitted: Decimal,
}

impl CodeBalance {
    /// Signed net quantity, before clamping.
    pub fn net(&self) -> Decimal {
        self.received - self.emitted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub waste_code: String,
    pub quantity: Decimal,
}

/// Theoretical on-site stock per waste code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockTable {
    /// Codes with a strictly positive stock, sorted by code.
    pub entries: Vec<StockEntry>,
    /// Sum of `entries`.
    pub total: Decimal,
    /// Every code seen in the window with its unclamped movements.
    pub balances: BTreeMap<String, CodeBalance>,
}

impl StockTable {
    pub fn get(&self, waste_code: &str) -> Option<Decimal> {
        self.entries
            .iter()
            .find(|e| e.waste_code == waste_code)
            .map(|e| e.quantity)
    }
}

/// Reconcile received against emitted quantities per waste code over
/// `window`.
///
/// Received side: the establishment is recipient, dated by `receivedAt`,
/// weighed quantity. Emitted side: the establishment is emitter, dated by
/// `sentAt`, weighed quantity falling back to the declared one.
pub fn reconcile(records: &[Manifest], siret: &str, window: &Window) -> StockTable {
    let in_window =
        |m: &Manifest, field: DateField| m.timestamp(field).is_some_and(|t| window.contains(t));

    let mut balances: BTreeMap<String, CodeBalance> = BTreeMap::new();
    for m in records {
        if m.is_received_by(siret) && in_window(m, DateField::ReceivedAt) {
            balances.entry(m.waste_code.clone()).or_default().received += m.received_weight();
        }
        if m.is_emitted_by(siret) && in_window(m, DateField::SentAt) {
            balances.entry(m.waste_code.clone()).or_default().emitted += m.outgoing_weight();
        }
    }

    let entries: Vec<StockEntry> = balances
        .iter()
        .filter(|(_, b)| b.net() > Decimal::ZERO)
        .map(|(code, b)| StockEntry {
            waste_code: code.clone(),
            quantity: b.net(),
        })
        .collect();
    let total = entries.iter().map(|e| e.quantity).sum();

    StockTable {
        entries,
        total,
        balances,
    }
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

    fn received(code: &str, at: &str, qty: &str) -> Manifest {
        build(&format!(
            r#"{{ "id": "r-{code}-{at}", "wasteCode": "{code}", "emitterCompanySiret": "{OTHER}",
                 "recipientCompanySiret": "{SITE}", "receivedAt": "{at}", "quantityReceived": {qty} }}"#
        ))
    }

    fn emitted(code: &str, at: &str, qty: &str) -> Manifest {
        build(&format!(
            r#"{{ "id": "e-{code}-{at}", "wasteCode": "{code}", "emitterCompanySiret": "{SITE}",
                 "recipientCompanySiret": "{OTHER}", "sentAt": "{at}", "wasteDetailsQuantity": {qty} }}"#
        ))
    }

    fn build(json: &str) -> Manifest {
        let raw: RawManifest = serde_json::from_str(json).unwrap();
        let (mut clean, _) = quarantine_dates(vec![raw], &DateField::ALL);
        clean.remove(0)
    }

    fn window() -> Window {
        Window::trailing(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(), 365).unwrap()
    }

    #[test]
    fn test_received_minus_emitted() {
        let window = window();
        let records = vec![
            received("06 01 01*", "2024-03-01", "10"),
            emitted("06 01 01*", "2024-04-01", "4"),
        ];
        let table = reconcile(&records, SITE, &window);
        assert_eq!(table.get("06 01 01*"), Some(dec!(6)));
        assert_eq!(table.total, dec!(6));
    }

    #[test]
    fn test_negative_balance_suppressed_but_exposed() {
        let window = window();
        let records = vec![
            received("17 06 05*", "2024-03-01", "1"),
            emitted("17 06 05*", "2024-03-02", "3"),
            received("16 01 04*", "2024-03-01", "2"),
        ];
        let table = reconcile(&records, SITE, &window);
        assert_eq!(table.get("17 06 05*"), None);
        assert_eq!(table.balances["17 06 05*"].net(), dec!(-2));
        assert_eq!(table.total, dec!(2));
    }

    #[test]
    fn test_single_direction_codes() {
        let window = window();
        let records = vec![
            received("A", "2024-01-10", "5"),
            emitted("B", "2024-01-10", "5"),
        ];
        let table = reconcile(&records, SITE, &window);
        assert_eq!(table.get("A"), Some(dec!(5)));
        assert_eq!(table.get("B"), None);
        assert_eq!(table.balances["B"].received, Decimal::ZERO);
        assert!(table.entries.iter().all(|e| e.quantity > Decimal::ZERO));
    }

    #[test]
    fn test_outside_window_ignored() {
        let window = window();
        let records = vec![
            received("A", "2023-05-31", "5"),
            received("A", "2023-06-01", "1"),
            received("A", "2024-07-01", "9"),
        ];
        let table = reconcile(&records, SITE, &window);
        assert_eq!(table.get("A"), Some(dec!(1)));
    }

    #[test]
    fn test_emitted_side_uses_declared_quantity() {
        let window = window();
        let mut out = emitted("06 01 01*", "2024-04-01", "4");
        out.quantity_received = Some(dec!(3.2));
        let records = vec![received("06 01 01*", "2024-03-01", "10"), out];

        let table = reconcile(&records, SITE, &window);
        assert_eq!(table.balances["06 01 01*"].emitted, dec!(4));
        assert_eq!(table.get("06 01 01*"), Some(dec!(6)));

        let summary = crate::pipeline::summary::annual_summary(
            &records,
            SITE,
            &window,
            0,
            dec!(30),
        );
        assert_eq!(summary.outgoing_weight, dec!(4));
        assert_eq!(summary.theoretical_stock, table.total);
    }

    #[test]
    fn test_third_party_movements_ignored() {
        let window = window();
        let mut foreign = received("A", "2024-03-01", "5");
        foreign.recipient_siret = Some(OTHER.into());
        let table = reconcile(&[foreign], SITE, &window);
        assert!(table.balances.is_empty());
        assert_eq!(table.total, Decimal::ZERO);
    }
}
