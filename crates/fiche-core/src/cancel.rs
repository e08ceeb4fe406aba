use crate::error::FicheError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag asking an in-flight report run to stop.
///
/// Clones observe the same flag. Pipelines poll it between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), FicheError> {
        if self.is_cancelled() {
            Err(FicheError::Cancelled)
        } else {
            Ok(())
        }
    }
}
