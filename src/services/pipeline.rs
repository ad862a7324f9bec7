use crate::config::Settings;
use crate::error::PipelineError;
use crate::models::{PackageInfo, UploadRequest, ValidationResult};
use crate::services::authorizer::{AuthorizationGate, REQUIRED_ROLES};
use crate::services::bus::{MessageBus, RawMessage};
use crate::services::codec;
use crate::services::runner::ValidationRunner;
use crate::services::workspace::{Workspace, WorkspaceManager};
use crate::utils::locator::decode_locator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::Instrument;

/// Topic and concurrency settings the pipeline needs at runtime
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub request_topic: String,
    pub request_subscription: String,
    pub response_topic: String,
    pub max_concurrent_messages: usize,
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            request_topic: settings.request_topic.clone(),
            request_subscription: settings.request_subscription.clone(),
            response_topic: settings.response_topic.clone(),
            max_concurrent_messages: settings.max_concurrent_messages.max(1),
        }
    }
}

/// Receives upload notifications, validates the referenced file and publishes the outcome
pub struct MessagePipeline {
    config: PipelineConfig,
    bus: Arc<dyn MessageBus>,
    gate: AuthorizationGate,
    workspaces: WorkspaceManager,
    runner: ValidationRunner,
    package: PackageInfo,
}

impl MessagePipeline {
    pub fn new(
        config: PipelineConfig,
        bus: Arc<dyn MessageBus>,
        gate: AuthorizationGate,
        workspaces: WorkspaceManager,
        runner: ValidationRunner,
    ) -> Self {
        let mut package = PackageInfo::new();
        package.insert(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        package.insert("osw-validation-engine".to_string(), runner.engine_version());

        Self {
            config,
            bus,
            gate,
            workspaces,
            runner,
            package,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle one delivery. Returns false only when the envelope could not be decoded.
    pub async fn on_message(&self, raw: RawMessage) -> bool {
        let mut request = match codec::decode(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Dropping undecodable message: {}", e);
                return false;
            }
        };

        let span = tracing::info_span!("validation", message_id = %request.message_id);
        async {
            tracing::info!("Message received for OSW validation");
            let result = self.process(&request).await;
            if let Err(e) = self.publish(&result, &mut request).await {
                tracing::error!("{}", e);
            }
        }
        .instrument(span)
        .await;

        true
    }

    /// Run the request through gate, workspace and runner. Never fails: errors become failure results.
    pub async fn process(&self, request: &UploadRequest) -> ValidationResult {
        match self.try_process(request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    "{} Error occurred while validating OSW request, {}",
                    request.message_id,
                    e
                );
                ValidationResult::failure(format!(
                    "Error occurred while validating OSW request {}",
                    e
                ))
            }
        }
    }

    async fn try_process(&self, request: &UploadRequest) -> Result<ValidationResult, PipelineError> {
        let raw_path = request
            .data
            .file_upload_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(PipelineError::MissingField)?;

        if !request.is_validation_only()
            && !self
                .gate
                .check(
                    &REQUIRED_ROLES,
                    &request.data.user_id,
                    &request.data.tdei_project_group_id,
                )
                .await
        {
            tracing::error!(
                "Unauthorized request for user {} in group {}",
                request.data.user_id,
                request.data.tdei_project_group_id
            );
            return Err(PipelineError::AuthorizationDenied);
        }

        let locator = decode_locator(raw_path);
        if locator.is_empty() {
            return Err(PipelineError::EmptyLocator);
        }

        let workspace = self.workspaces.create_workspace().await?;
        let outcome = self.validate_in(&workspace, &locator).await;

        let workspace_id = workspace.id().to_string();
        if let Err(e) = workspace.release().await {
            tracing::error!("Cleanup of workspace {} failed: {}", workspace_id, e);
        }

        outcome
    }

    async fn validate_in(
        &self,
        workspace: &Workspace,
        locator: &str,
    ) -> Result<ValidationResult, PipelineError> {
        match self.workspaces.download_into(workspace, locator).await {
            Ok(local_path) => self.runner.run(&local_path).await,
            Err(e) => {
                let err = PipelineError::Download(e);
                tracing::error!("Download of {} failed: {:#}", locator, err);
                Ok(ValidationResult::failure(err.to_string()))
            }
        }
    }

    /// Merge the result into the request and send it to the response topic. No retries.
    pub async fn publish(
        &self,
        result: &ValidationResult,
        request: &mut UploadRequest,
    ) -> Result<(), PipelineError> {
        request.apply(result, self.package.clone());

        let envelope = codec::encode(&request.message_id, &request.message_type, &request.data)
            .map_err(|e| PipelineError::Publish(e.into()))?;

        self.bus
            .publish(&self.config.response_topic, envelope)
            .await
            .map_err(PipelineError::Publish)?;

        tracing::info!("Publishing message for : {}", request.message_id);
        Ok(())
    }

    /// Start the subscriber loop on its own task.
    pub fn spawn(self: Arc<Self>) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.listen(shutdown_rx));
        ListenerHandle { shutdown_tx, task }
    }

    async fn listen(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinSet<()> {
        let mut in_flight = JoinSet::new();

        let mut subscription = match self
            .bus
            .subscribe(&self.config.request_topic, &self.config.request_subscription)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!(
                    "Failed to subscribe to '{}': {:#}",
                    self.config.request_topic,
                    e
                );
                return in_flight;
            }
        };

        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_messages));
        tracing::info!(
            "🚀 Listening on '{}' (max {} concurrent messages)",
            self.config.request_topic,
            self.config.max_concurrent_messages
        );

        loop {
            // Reap finished work so the set does not grow without bound
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!("Message task failed: {}", e);
                }
            }

            let permit = tokio::select! {
                _ = shutdown.changed() => break,
                permit = limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let message = tokio::select! {
                _ = shutdown.changed() => break,
                message = subscription.recv() => match message {
                    Some(message) => message,
                    None => {
                        tracing::warn!("Subscription closed by the bus");
                        break;
                    }
                },
            };

            let pipeline = self.clone();
            in_flight.spawn(async move {
                pipeline.on_message(message).await;
                drop(permit);
            });
        }

        tracing::info!("🛑 Listener stopped accepting messages");
        in_flight
    }
}

/// Controls a running subscriber loop
pub struct ListenerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<JoinSet<()>>,
}

impl ListenerHandle {
    /// Stop accepting messages, then wait up to `drain` for in-flight work.
    ///
    /// Work still running after the drain period is aborted. Returns the number aborted.
    pub async fn stop(self, drain: Duration) -> usize {
        let _ = self.shutdown_tx.send(true);

        let mut in_flight = match self.task.await {
            Ok(set) => set,
            Err(e) => {
                tracing::error!("Listener task failed: {}", e);
                return 0;
            }
        };

        let drained = tokio::time::timeout(drain, async {
            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Message task failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_ok() {
            tracing::info!("✅ All in-flight messages completed");
            return 0;
        }

        let remaining = in_flight.len();
        tracing::warn!(
            "Drain period of {:?} elapsed, aborting {} in-flight messages",
            drain,
            remaining
        );
        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}
        remaining
    }
}
