use std::path::PathBuf;

use crate::model::WasteCategory;

#[derive(Debug, thiserror::Error)]
pub enum FicheError {
    #[error("invalid SIRET '{0}': expected exactly 14 digits")]
    InvalidSiret(String),

    #[error("{category}: field '{field}' is missing from every record")]
    MissingField {
        category: WasteCategory,
        field: String,
    },

    #[error("{category}: malformed input: {reason}")]
    MalformedInput {
        category: WasteCategory,
        reason: String,
    },

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("invalid reference table: {0}")]
    ReferenceInvalid(String),

    #[error("failed to read workbook: {0}")]
    Workbook(String),

    #[error("report generation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
