//! Progress reporting for batch enrichment.
//!
//! The enricher reports one unit of progress per property through
//! [`ProgressCallback`], which keeps it independent of how (or whether)
//! progress is rendered. The CLI plugs in `indicatif` bars; library callers
//! and tests use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a running batch.
///
/// Implementations must be `Send + Sync` so they can be shared through an
/// `Arc` with the enricher.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of properties in the batch.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` properties.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator (typically the
    /// property being processed).
    fn set_message(&self, msg: String);

    /// Marks the batch as finished with a closing message.
    fn finish(&self, msg: String);
}

/// Discards all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
