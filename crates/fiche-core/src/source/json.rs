use std::path::{Path, PathBuf};

use super::ManifestSource;
use crate::error::FicheError;
use crate::model::ReportInput;

/// A JSON document shaped like [`ReportInput`].
#[derive(Debug, Clone)]
pub struct JsonBundleSource {
    path: PathBuf,
}

impl JsonBundleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestSource for JsonBundleSource {
    fn load(&self) -> Result<ReportInput, FicheError> {
        let content = std::fs::read_to_string(&self.path)?;
        parse_bundle(&content)
    }

    fn backend_name(&self) -> &str {
        "json"
    }
}

pub fn parse_bundle(json: &str) -> Result<ReportInput, FicheError> {
    Ok(serde_json::from_str(json)?)
}
