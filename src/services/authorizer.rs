use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Roles allowed to submit non-`VALIDATION_ONLY` requests; any one suffices
pub const REQUIRED_ROLES: [&str; 3] = ["tdei-admin", "poc", "osw_data_generator"];

/// Query sent to the authorization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRequest {
    pub user_id: String,
    pub project_group_id: String,
    pub permissions: Vec<String>,
    pub should_satisfy_all: bool,
}

/// Answers whether a subject holds the requested permissions.
///
/// `Ok(None)` means the service gave no verdict.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn has_permission(&self, request: &PermissionRequest) -> Result<Option<bool>>;
}

/// Calls the hosted permission endpoint
pub struct HostedAuthorizer {
    client: reqwest::Client,
    api_url: String,
}

impl HostedAuthorizer {
    pub fn new(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    fn query(request: &PermissionRequest) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("userId", request.user_id.clone()),
            ("projectGroupId", request.project_group_id.clone()),
        ];
        query.extend(
            request
                .permissions
                .iter()
                .map(|p| ("permissions", p.clone())),
        );
        query.push(("affirmative", request.should_satisfy_all.to_string()));
        query
    }
}

#[async_trait]
impl Authorizer for HostedAuthorizer {
    async fn has_permission(&self, request: &PermissionRequest) -> Result<Option<bool>> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&Self::query(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Permission service responded with {}", status));
        }

        let verdict: Option<bool> = response.json().await?;
        Ok(verdict)
    }
}

/// Grants everything; selected when `AUTH_SIMULATE` is set
pub struct SimulatedAuthorizer;

#[async_trait]
impl Authorizer for SimulatedAuthorizer {
    async fn has_permission(&self, request: &PermissionRequest) -> Result<Option<bool>> {
        tracing::warn!(
            "SimulatedAuthorizer: granting {:?} to user {}",
            request.permissions,
            request.user_id
        );
        Ok(Some(true))
    }
}

/// Decision point in front of every non-`VALIDATION_ONLY` request. Fails closed.
#[derive(Clone)]
pub struct AuthorizationGate {
    authorizer: Arc<dyn Authorizer>,
}

impl AuthorizationGate {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }

    /// Allow when the subject holds ANY of `roles`.
    pub async fn check(&self, roles: &[&str], user_id: &str, project_group_id: &str) -> bool {
        let request = PermissionRequest {
            user_id: user_id.to_string(),
            project_group_id: project_group_id.to_string(),
            permissions: roles.iter().map(|r| r.to_string()).collect(),
            should_satisfy_all: false,
        };

        match self.authorizer.has_permission(&request).await {
            Ok(Some(allowed)) => allowed,
            Ok(None) => {
                tracing::warn!("No permission verdict for user {}", user_id);
                false
            }
            Err(e) => {
                tracing::error!("Error validating the request authorization: {:#}", e);
                false
            }
        }
    }
}
