pub mod json;
pub mod xlsx;

use crate::error::FicheError;
use crate::model::ReportInput;

pub use json::JsonBundleSource;
pub use xlsx::XlsxWorkbookSource;

/// Backend delivering the records of one establishment.
pub trait ManifestSource: Send + Sync {
    /// Load the establishment, its authorizations and every category's
    /// manifests and revisions.
    fn load(&self) -> Result<ReportInput, FicheError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
