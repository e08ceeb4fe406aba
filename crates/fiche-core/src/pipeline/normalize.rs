use crate::model::ManifestRecord;
use rust_decimal::Decimal;

const KG_PER_TON: Decimal = Decimal::ONE_THOUSAND;

/// Correct a weight entered in kilograms instead of tons.
///
/// Any value strictly above `threshold` is divided by 1000. A genuine
/// shipment heavier than the threshold is misread too; that is the accepted
/// cost of the heuristic.
pub fn normalize_weight(value: Decimal, threshold: Decimal) -> Decimal {
    if value > threshold {
        value / KG_PER_TON
    } else {
        value
    }
}

/// Apply [`normalize_weight`] to both weight fields of a manifest.
///
/// Returns true when at least one field was corrected.
pub fn normalize_manifest<T>(record: &mut ManifestRecord<T>, threshold: Decimal) -> bool {
    let mut corrected = false;
    for field in [&mut record.quantity_received, &mut record.declared_quantity] {
        if let Some(value) = field {
            let normalized = normalize_weight(*value, threshold);
            if normalized != *value {
                *value = normalized;
                corrected = true;
            }
        }
    }
    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawManifest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kilograms_converted() {
        assert_eq!(normalize_weight(dec!(1500), dec!(1000)), dec!(1.5));
    }

    #[test]
    fn test_threshold_itself_kept() {
        assert_eq!(normalize_weight(dec!(1000), dec!(1000)), dec!(1000));
    }

    #[test]
    fn test_small_weight_untouched() {
        assert_eq!(normalize_weight(dec!(12.4), dec!(1000)), dec!(12.4));
    }

    #[test]
    fn test_custom_threshold() {
        assert_eq!(normalize_weight(dec!(600), dec!(500)), dec!(0.6));
    }

    #[test]
    fn test_manifest_both_fields() {
        let mut m: RawManifest = serde_json::from_str(
            r#"{ "id": "A", "quantityReceived": 2500, "wasteDetailsQuantity": 2 }"#,
        )
        .unwrap();
        assert!(normalize_manifest(&mut m, dec!(1000)));
        assert_eq!(m.quantity_received, Some(dec!(2.5)));
        assert_eq!(m.declared_quantity, Some(dec!(2)));
    }

    #[test]
    fn test_manifest_without_weights() {
        let mut m: RawManifest = serde_json::from_str(r#"{ "id": "A" }"#).unwrap();
        assert!(!normalize_manifest(&mut m, dec!(1000)));
    }
}
