use fiche_core::config::{self, builtin};
use fiche_core::error::FicheError;
use std::path::Path;

pub fn show(file: Option<&Path>) -> Result<(), FicheError> {
    let config = match file {
        Some(path) => config::load_config(path)?,
        None => builtin::default_config()?,
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), FicheError> {
    let config = config::load_config(file)?;

    println!("Config '{}' is valid.", file.display());
    println!("  kg threshold:        {} t", config.kg_threshold);
    println!("  stock window:        {} days", config.stock_window_days);
    println!(
        "  origins:             top {} by {:?}",
        config.origin_top_n, config.origin_level
    );
    println!(
        "  late processing:     > {} days",
        config.max_processing_delay_days
    );

    println!("\n  Categories:");
    for (category, cat) in &config.categories {
        let fields: Vec<&str> = cat.date_fields.iter().map(|f| f.as_str()).collect();
        let mode = cat
            .quantity_rule
            .transport_mode
            .map(|m| format!(" ({m:?} only)"))
            .unwrap_or_default();
        println!(
            "    {:<8} dates: {}; max {} t{}{}",
            category.code(),
            fields.join(", "),
            cat.quantity_rule.max_quantity,
            mode,
            if cat.has_revisions { "; revisions" } else { "" }
        );
    }

    Ok(())
}
