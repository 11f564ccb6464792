//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::ocr::{ExtractionBackend, ExtractionService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    service: ExtractionService,
}

impl AppState {
    /// Create a new application state around an initialized backend
    pub fn new(config: Config, backend: Arc<dyn ExtractionBackend>) -> Self {
        let service = ExtractionService::new(backend, &config.extraction);

        Self {
            inner: Arc::new(AppStateInner { config, service }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the extraction service
    pub fn service(&self) -> &ExtractionService {
        &self.inner.service
    }
}
