//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use scrollmine_core::assistant::AiGateway;
use scrollmine_core::ports::TextGenerationService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Absent when no generation key is configured.
    pub generator: Option<Arc<dyn TextGenerationService>>,
}

impl AppState {
    /// The page-aware assistant, when generation is available.
    pub fn assistant(&self) -> Option<AiGateway> {
        self.generator.clone().map(AiGateway::new)
    }
}
