use crate::config::{AuthProvider, ConfigError, Settings};
use crate::services::authorizer::{Authorizer, HostedAuthorizer, SimulatedAuthorizer};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub fn setup_authorizer(settings: &Settings) -> Result<Arc<dyn Authorizer>, ConfigError> {
    match settings.auth_provider {
        AuthProvider::Simulated => {
            tracing::warn!("⚠️  Authorization is simulated, every request will be permitted");
            Ok(Arc::new(SimulatedAuthorizer))
        }
        AuthProvider::Hosted => {
            let api_url = settings
                .auth_permission_url
                .clone()
                .ok_or(ConfigError::Missing("AUTH_PERMISSION_URL"))?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| ConfigError::Invalid {
                    key: "AUTH_PERMISSION_URL",
                    value: e.to_string(),
                })?;
            info!("🔐 Authorization: {}", api_url);
            Ok(Arc::new(HostedAuthorizer::new(client, api_url)))
        }
    }
}
