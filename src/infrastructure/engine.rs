use crate::config::Settings;
use crate::services::engine::CommandValidationEngine;
use crate::services::runner::ValidationEngine;
use std::sync::Arc;
use tracing::info;

pub fn setup_engine(settings: &Settings) -> Arc<dyn ValidationEngine> {
    info!(
        "🧪 Validation engine: {} (version {}, max errors {})",
        settings.engine_command, settings.engine_version, settings.max_validation_errors
    );
    Arc::new(CommandValidationEngine::new(
        settings.engine_command.clone(),
        settings.engine_version.clone(),
    ))
}
