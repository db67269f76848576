use accounts_core::{Config, Ingestor, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    ingestor: Ingestor,
}

impl AppState {
    pub fn new(config: Config, ingestor: Ingestor) -> Self {
        Self { config, ingestor }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }
}
