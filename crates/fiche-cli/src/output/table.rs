use fiche_core::pipeline::threshold::ThresholdConsumption;
use fiche_core::report::{Report, ThresholdReport};
use fiche_core::{CategoryOutcome, CategoryReport};
use rust_decimal::Decimal;

/// Stock rows shown per category; the JSON output has them all.
const MAX_STOCK_ROWS: usize = 10;

pub fn print(report: &Report) {
    let est = &report.establishment;
    println!("=== {} ({}) ===\n", est.name, est.siret);
    if !est.address.is_empty() {
        println!("  Address:     {}", est.address);
    }
    if let Some(ref code) = est.s3ic_code {
        println!("  S3IC code:   {code}");
    }
    if !est.company_types.is_empty() {
        let types: Vec<String> = est.company_types.iter().map(|t| format!("{t:?}")).collect();
        println!("  Profiles:    {}", types.join(", "));
    }
    for r in &est.receipts {
        let expired = if r.expired { " (expired)" } else { "" };
        println!("  Receipt:     {:?} {}{}", r.receipt.kind, r.receipt.number, expired);
    }
    println!(
        "  Period:      {} -> {}\n",
        report.period.window.start.format("%Y-%m-%d"),
        report.period.as_of.format("%Y-%m-%d")
    );

    for (category, outcome) in &report.categories {
        println!("--- {} ({}) ---\n", category.code(), category.description());
        match outcome {
            CategoryOutcome::Ready(cat) => print_category(cat),
            CategoryOutcome::NoData {
                raw_count,
                quarantine,
            } => {
                println!(
                    "  No data ({raw_count} record(s), {} quarantined)\n",
                    quarantine.total
                );
            }
            CategoryOutcome::Failed { reason } => println!("  FAILED: {reason}\n"),
        }
    }

    println!("=== Authorizations ===\n");
    match &report.thresholds {
        ThresholdReport::NoAuthorizations => println!("  No declared authorizations\n"),
        ThresholdReport::Evaluated { items } => print_thresholds(items),
    }
}

fn print_category(cat: &CategoryReport) {
    let s = &cat.summary;
    println!(
        "  Records:     {} clean of {} ({} quarantined, {} weight(s) converted from kg)",
        cat.clean_count, cat.raw_count, cat.quarantine.total, cat.unit_corrections
    );
    println!(
        "  Emitted:     {} ({} archived, {} revision(s), {} processed late)",
        s.emitted, s.archived, s.revised, s.late_processing
    );
    let percent = s
        .outgoing_percent
        .map(|p| format!(" ({p}% of incoming)"))
        .unwrap_or_default();
    println!(
        "  Weight:      {} t in, {} t out{}",
        s.incoming_weight, s.outgoing_weight, percent
    );
    if !cat.chronology_violations.is_empty() {
        println!(
            "  Chronology:  {} record(s) out of order: {}",
            cat.chronology_violations.len(),
            cat.chronology_violations.join(", ")
        );
    }

    if !cat.stock.entries.is_empty() {
        println!("\n  Stock ({} t):", cat.stock.total);
        let width = cat
            .stock
            .entries
            .iter()
            .map(|e| e.waste_code.len())
            .max()
            .unwrap_or(8);
        for entry in cat.stock.entries.iter().take(MAX_STOCK_ROWS) {
            println!("    {:<width$}  {} t", entry.waste_code, entry.quantity);
        }
        if cat.stock.entries.len() > MAX_STOCK_ROWS {
            println!("    ... {} more", cat.stock.entries.len() - MAX_STOCK_ROWS);
        }
    }

    if let Some(ref revisions) = cat.revisions {
        println!(
            "\n  Revisions:   {} on {} manifest(s), {} unattributed",
            revisions.events, revisions.revised_manifests, revisions.unattributed
        );
    }

    println!(
        "\n  Refusals:    {}",
        cat.refusals
            .overall
            .and_then(|r| r.value())
            .map(format_percent)
            .unwrap_or_else(|| "no data".to_string())
    );

    let origins = &cat.origins;
    if !origins.top.is_empty() {
        println!("\n  Origins:");
        for entry in &origins.top {
            println!("    {:<4} {:<30} {} t", entry.code, entry.label, entry.quantity);
        }
        if origins.other > Decimal::ZERO {
            println!("    {:<35} {} t", "other", origins.other);
        }
        if origins.unknown_count > 0 {
            println!(
                "    {:<35} {} t ({} record(s))",
                "unknown", origins.unknown, origins.unknown_count
            );
        }
    }
    println!();
}

fn print_thresholds(items: &[ThresholdConsumption]) {
    for item in items {
        let ratio = item
            .ratio
            .map(format_percent)
            .unwrap_or_else(|| "-".to_string());
        let peak = item
            .peak
            .map(|p| format!(", peak {p}"))
            .unwrap_or_default();
        let mut notes = Vec::new();
        if !item.matched {
            notes.push("no matching activity");
        }
        if !item.in_force {
            notes.push("not in force");
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!(" [{}]", notes.join(", "))
        };
        println!(
            "  {:<8} {} / {} {} ({}{}){}",
            item.rubrique,
            item.consumption.round_dp(3),
            item.authorized_volume,
            item.unit,
            ratio,
            peak,
            notes
        );
    }
    println!();
}

fn format_percent(fraction: Decimal) -> String {
    format!("{}%", (fraction * Decimal::ONE_HUNDRED).round_dp(1))
}
