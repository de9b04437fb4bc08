//! Shared application state.

use std::sync::Arc;

use btcd_collector::MetricsRegistry;

/// Shared state held by the HTTP handlers.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// Registry holding the btcd collector.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
