use crate::config::schema::OriginLevel;
use crate::model::{DateField, Manifest};
use crate::period::Window;
use crate::reference::ReferenceTables;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginEntry {
    /// Department code, or region name at region level.
    pub code: String,
    pub label: String,
    pub quantity: Decimal,
}

/// Received weight by place of origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginDistribution {
    pub level: OriginLevel,
    /// Heaviest origins, descending.
    pub top: Vec<OriginEntry>,
    /// Sum of the resolved origins not kept in `top`.
    pub other: Decimal,
    /// Weight whose origin could not be resolved.
    pub unknown: Decimal,
    pub unknown_count: u64,
}

impl OriginDistribution {
    pub fn total(&self) -> Decimal {
        self.top.iter().map(|e| e.quantity).sum::<Decimal>() + self.other + self.unknown
    }
}

/// First standalone run of exactly five digits in `text`.
pub fn extract_postal_code(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate().chain(std::iter::once((bytes.len(), &b' '))) {
        match (b.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s == 5 {
                    return Some(&text[s..i]);
                }
                start = None;
            }
            _ => {}
        }
    }
    None
}

/// Department code of a French postal code.
///
/// Corsica (20xxx) splits into 2A up to 20190 and 2B above; overseas codes
/// keep three digits.
pub fn department_code(postal_code: &str) -> Option<String> {
    if postal_code.len() != 5 || !postal_code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u32 = postal_code.parse().ok()?;
    let code = match value {
        20000..=20190 => "2A".to_string(),
        20191..=20999 => "2B".to_string(),
        v if v > 97000 => postal_code[..3].to_string(),
        _ => postal_code[..2].to_string(),
    };
    Some(code)
}

/// Postal code of the pickup: the declared work-site code when present,
/// otherwise the one found in the emitter address.
fn origin_postal_code(record: &Manifest) -> Option<&str> {
    record
        .emitter_postal_code
        .as_deref()
        .map(str::trim)
        .filter(|pc| department_code(pc).is_some())
        .or_else(|| record.emitter_address.as_deref().and_then(extract_postal_code))
}

/// Sum weight received by `siret` within `window` per origin and keep the
/// `top_n` heaviest.
pub fn aggregate_origins(
    records: &[Manifest],
    siret: &str,
    window: &Window,
    tables: &ReferenceTables,
    level: OriginLevel,
    top_n: usize,
) -> OriginDistribution {
    let mut sums: HashMap<(String, String), Decimal> = HashMap::new();
    let mut unknown = Decimal::ZERO;
    let mut unknown_count = 0;

    let received = records.iter().filter(|m| {
        m.is_received_by(siret)
            && m.timestamp(DateField::ReceivedAt)
                .is_some_and(|t| window.contains(t))
    });

    for m in received {
        let department = origin_postal_code(m)
            .and_then(department_code)
            .and_then(|code| tables.department(&code));
        let Some(dep) = department else {
            unknown += m.received_weight();
            unknown_count += 1;
            continue;
        };
        let key = match level {
            OriginLevel::Department => (dep.code.clone(), dep.name.clone()),
            OriginLevel::Region => (dep.region.clone(), dep.region.clone()),
        };
        *sums.entry(key).or_default() += m.received_weight();
    }

    let mut entries: Vec<OriginEntry> = sums
        .into_iter()
        .map(|((code, label), quantity)| OriginEntry {
            code,
            label,
            quantity,
        })
        .collect();
    entries.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.code.cmp(&b.code)));

    let rest = entries.split_off(top_n.min(entries.len()));
    OriginDistribution {
        level,
        top: entries,
        other: rest.iter().map(|e| e.quantity).sum(),
        unknown,
        unknown_count,
    }
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

    fn window() -> Window {
        Window::trailing(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap(), 365).unwrap()
    }

    fn received_from(address: &str, qty: u32) -> Manifest {
        let raw: RawManifest = serde_json::from_str(&format!(
            r#"{{ "id": "{address}", "recipientCompanySiret": "{SITE}",
                 "emitterCompanyAddress": "{address}",
                 "receivedAt": "2024-03-01", "quantityReceived": {qty} }}"#
        ))
        .unwrap();
        quarantine_dates(vec![raw], &DateField::ALL).0.remove(0)
    }

    #[test]
    fn test_corsica_split() {
        assert_eq!(department_code("20190").as_deref(), Some("2A"));
        assert_eq!(department_code("20200").as_deref(), Some("2B"));
        assert_eq!(department_code("20000").as_deref(), Some("2A"));
    }

    #[test]
    fn test_overseas_and_mainland() {
        assert_eq!(department_code("97411").as_deref(), Some("974"));
        assert_eq!(department_code("75011").as_deref(), Some("75"));
        assert_eq!(department_code("01000").as_deref(), Some("01"));
        assert_eq!(department_code("7501"), None);
    }

    #[test]
    fn test_extract_postal_code() {
        assert_eq!(extract_postal_code("12 rue de la Paix 75002 Paris"), Some("75002"));
        assert_eq!(extract_postal_code("ZI Nord, 69007"), Some("69007"));
        assert_eq!(extract_postal_code("Lieu-dit 123456 Nowhere"), None);
        assert_eq!(extract_postal_code("no digits"), None);
    }

    #[test]
    fn test_top_n_and_remainder() {
        let records = vec![
            received_from("1 rue A 75001 Paris", 10),
            received_from("1 rue B 69001 Lyon", 8),
            received_from("1 rue C 13001 Marseille", 3),
            received_from("1 rue D 33000 Bordeaux", 2),
        ];
        let dist = aggregate_origins(
            &records,
            SITE,
            &window(),
            builtin_tables(),
            OriginLevel::Department,
            2,
        );
        assert_eq!(dist.top.len(), 2);
        assert_eq!(dist.top[0].code, "75");
        assert_eq!(dist.top[1].code, "69");
        assert_eq!(dist.other, dec!(5));
        assert_eq!(dist.total(), dec!(23));
    }

    #[test]
    fn test_unresolved_origin_is_unknown() {
        let records = vec![
            received_from("Somewhere without code", 4),
            received_from("1 rue A 75001 Paris", 1),
        ];
        let dist = aggregate_origins(
            &records,
            SITE,
            &window(),
            builtin_tables(),
            OriginLevel::Department,
            5,
        );
        assert_eq!(dist.unknown, dec!(4));
        assert_eq!(dist.unknown_count, 1);
        assert_eq!(dist.other, Decimal::ZERO);
    }

    #[test]
    fn test_region_level_merges_departments() {
        let records = vec![
            received_from("Ajaccio 20000", 1),
            received_from("Bastia 20200", 2),
        ];
        let dist = aggregate_origins(
            &records,
            SITE,
            &window(),
            builtin_tables(),
            OriginLevel::Region,
            5,
        );
        assert_eq!(dist.top.len(), 1);
        assert_eq!(dist.top[0].code, "Corse");
        assert_eq!(dist.top[0].quantity, dec!(3));
    }

    #[test]
    fn test_work_site_postal_code_preferred() {
        let mut m = received_from("1 rue A 75001 Paris", 1);
        m.emitter_postal_code = Some("13001".into());
        let dist = aggregate_origins(
            &[m],
            SITE,
            &window(),
            builtin_tables(),
            OriginLevel::Department,
            5,
        );
        assert_eq!(dist.top[0].code, "13");
    }
}
