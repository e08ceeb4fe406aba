use crate::config::schema::EngineConfig;
use crate::error::FicheError;

const ENGINE_DEFAULTS_JSON: &str = include_str!("../../../../reference/engine-defaults.json");

/// The builtin configuration: kg threshold 1000, 365-day stock window,
/// top 5 origins by department and the per-category quantity rules.
pub fn default_config() -> Result<EngineConfig, FicheError> {
    let config: EngineConfig = serde_json::from_str(ENGINE_DEFAULTS_JSON)?;
    Ok(config)
}
