pub mod builtin;
pub mod schema;

use crate::error::FicheError;
use crate::model::WasteCategory;
use rust_decimal::Decimal;
use schema::{ConfigOverrides, EngineConfig};
use std::path::Path;

/// One century; longer windows reach past any manifest data.
const MAX_STOCK_WINDOW_DAYS: i64 = 36_525;

/// Load a config file and layer it over the builtin defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig, FicheError> {
    let content = std::fs::read_to_string(path).map_err(|e| FicheError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let overrides: ConfigOverrides =
        serde_json::from_str(&content).map_err(|e| FicheError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    resolve(overrides)
}

/// Parse overrides from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<EngineConfig, FicheError> {
    let overrides: ConfigOverrides = serde_json::from_str(json)?;
    resolve(overrides)
}

fn resolve(overrides: ConfigOverrides) -> Result<EngineConfig, FicheError> {
    let mut config = builtin::default_config()?;
    config.apply(overrides);
    validate_config(&config)?;
    Ok(config)
}

/// Validate that a config is usable for every category.
pub fn validate_config(config: &EngineConfig) -> Result<(), FicheError> {
    if config.kg_threshold <= Decimal::ZERO {
        return Err(FicheError::ConfigInvalid(
            "kg_threshold must be positive".into(),
        ));
    }

    if config.stock_window_days <= 0 {
        return Err(FicheError::ConfigInvalid(
            "stock_window_days must be positive".into(),
        ));
    }

    if config.stock_window_days > MAX_STOCK_WINDOW_DAYS {
        return Err(FicheError::ConfigInvalid(format!(
            "stock_window_days must not exceed {MAX_STOCK_WINDOW_DAYS}"
        )));
    }

    if config.origin_top_n == 0 {
        return Err(FicheError::ConfigInvalid(
            "origin_top_n must be at least 1".into(),
        ));
    }

    if config.max_processing_delay_days < Decimal::ZERO {
        return Err(FicheError::ConfigInvalid(
            "max_processing_delay_days must not be negative".into(),
        ));
    }

    for category in WasteCategory::ALL {
        let Some(cat) = config.category(category) else {
            return Err(FicheError::ConfigInvalid(format!(
                "missing settings for category {category}"
            )));
        };

        if cat.date_fields.is_empty() {
            return Err(FicheError::ConfigInvalid(format!(
                "{category}: date_fields must not be empty"
            )));
        }

        if cat.quantity_rule.max_quantity <= Decimal::ZERO {
            return Err(FicheError::ConfigInvalid(format!(
                "{category}: max_quantity must be positive"
            )));
        }

        for field in &cat.required_fields {
            if !cat.date_fields.contains(field) {
                return Err(FicheError::ConfigInvalid(format!(
                    "{category}: required field '{field}' is not among date_fields"
                )));
            }
        }
    }

    Ok(())
}
