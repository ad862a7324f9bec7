use crate::config::{ConfigError, Settings};
use crate::services::bus::{InMemoryBus, MessageBus};
use std::sync::Arc;
use tracing::{info, warn};

/// Connection strings with this scheme select the in-process bus
pub const MEMORY_SCHEME: &str = "memory://";

pub fn setup_bus(settings: &Settings) -> Result<Arc<dyn MessageBus>, ConfigError> {
    if settings.queue_connection.starts_with(MEMORY_SCHEME) {
        info!("📬 Message bus: in-process ({})", settings.queue_connection);
        warn!(
            "In-process bus only carries messages published by this process; no external broker is connected"
        );
        return Ok(Arc::new(InMemoryBus::new()));
    }

    Err(ConfigError::UnsupportedQueue(redact(&settings.queue_connection)))
}

/// Keep connection secrets out of logs and errors.
fn redact(connection: &str) -> String {
    match connection.split_once(';') {
        Some((endpoint, _)) => format!("{};...", endpoint),
        None => connection.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_scheme() {
        let settings = Settings::development(std::env::temp_dir());
        assert!(setup_bus(&settings).is_ok());
    }

    #[test]
    fn test_unknown_scheme_is_redacted() {
        let mut settings = Settings::development(std::env::temp_dir());
        settings.queue_connection =
            "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKey=secret".to_string();
        let err = setup_bus(&settings).err().unwrap();
        assert!(!err.to_string().contains("secret"));
        assert!(matches!(err, ConfigError::UnsupportedQueue(_)));
        assert!(err.to_string().contains("only the in-process memory:// bus is built in"));
    }
}
