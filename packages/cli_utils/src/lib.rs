#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `crime_enrich` binary.
//!
//! [`PropertyProgress`] renders the enricher's per-property progress as an
//! `indicatif` bar, and [`init_logger`] routes `log` output through the same
//! [`MultiProgress`] so log lines never tear the bar.

use std::sync::Arc;
use std::time::Duration;

use crime_enrich::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Filter used when `RUST_LOG` is unset: run summaries and per-property
/// warnings from the enrichment crates, nothing from dependencies.
pub const DEFAULT_LOG_FILTER: &str = "crime_enrich=info";

const BATCH_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {wide_bar:.green/dim} {pos}/{len} properties ({eta} left) {msg}";

/// Progress bar for one enrichment batch.
pub struct PropertyProgress {
    bar: ProgressBar,
}

impl PropertyProgress {
    /// Adds a batch bar to `multi`. Its length is set by the enricher once
    /// the batch size is known.
    #[must_use]
    pub fn batch(multi: &MultiProgress, label: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(Self::styled(ProgressBar::new(0)));
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message(label.to_string());
        Arc::new(Self { bar })
    }

    fn styled(bar: ProgressBar) -> ProgressBar {
        bar.with_style(
            ProgressStyle::with_template(BATCH_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        )
    }
}

impl ProgressCallback for PropertyProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(format!(
            "{msg} in {:.1}s",
            self.bar.elapsed().as_secs_f64()
        ));
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge` and returns
/// the [`MultiProgress`] every progress bar must be added to.
///
/// Filters come from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let filters = log_filters(std::env::var("RUST_LOG").ok());
    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .build();
    let level = logger.filter();

    // A logger is already installed when called twice, e.g. from tests.
    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}

fn log_filters(rust_log: Option<String>) -> String {
    rust_log
        .filter(|filters| !filters.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden() -> (ProgressBar, PropertyProgress) {
        let bar = PropertyProgress::styled(ProgressBar::with_draw_target(
            None,
            ProgressDrawTarget::hidden(),
        ));
        (bar.clone(), PropertyProgress { bar })
    }

    #[test]
    fn tracks_batch_length_position_and_current_property() {
        let (bar, progress) = hidden();

        progress.set_total(3);
        assert_eq!(bar.length(), Some(3));
        assert_eq!(bar.position(), 0);

        progress.inc(1);
        progress.set_message("Property 70123".to_string());
        assert_eq!(bar.message(), "Property 70123");
        progress.inc(2);
        assert_eq!(bar.position(), 3);
    }

    #[test]
    fn finish_appends_elapsed_time() {
        let (bar, progress) = hidden();
        progress.set_total(1);
        progress.inc(1);
        progress.finish("Enriched 1/1 properties".to_string());

        assert!(bar.is_finished());
        let message = bar.message();
        assert!(message.starts_with("Enriched 1/1 properties in "), "{message}");
        assert!(message.ends_with('s'), "{message}");
    }

    #[test]
    fn batch_bar_attaches_to_multi_progress() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let progress = PropertyProgress::batch(&multi, "Enriching properties");
        progress.set_total(2);
        progress.inc(2);
        progress.finish("done".to_string());
    }

    #[test]
    fn rust_log_overrides_default_filter() {
        assert_eq!(log_filters(None), DEFAULT_LOG_FILTER);
        assert_eq!(log_filters(Some("  ".to_string())), DEFAULT_LOG_FILTER);
        assert_eq!(log_filters(Some("debug".to_string())), "debug");
    }
}
