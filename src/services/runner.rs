use crate::error::PipelineError;
use crate::models::{ValidationIssue, ValidationResult};
use crate::utils::locator::has_zip_extension;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Error ceiling used when the caller does not pick one
pub const DEFAULT_MAX_ERRORS: usize = 20;

/// What the validation engine reports for one archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineReport {
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
}

/// External component that inspects archive contents
#[async_trait]
pub trait ValidationEngine: Send + Sync {
    async fn validate(&self, zip_path: &Path, max_errors: usize) -> Result<EngineReport>;

    /// Version tag reported in outbound package metadata
    fn version(&self) -> String {
        "unknown".to_string()
    }
}

/// Runs the format gate and the engine, and maps the engine output to a [`ValidationResult`]
#[derive(Clone)]
pub struct ValidationRunner {
    engine: Arc<dyn ValidationEngine>,
    max_errors: usize,
}

impl ValidationRunner {
    pub fn new(engine: Arc<dyn ValidationEngine>, max_errors: Option<usize>) -> Self {
        Self {
            engine,
            max_errors: max_errors.unwrap_or(DEFAULT_MAX_ERRORS),
        }
    }

    pub fn engine_version(&self) -> String {
        self.engine.version()
    }

    /// Engine errors are returned as [`PipelineError::Engine`] for the pipeline to contain.
    pub async fn run(&self, local_path: &Path) -> Result<ValidationResult, PipelineError> {
        let started = Instant::now();
        let outcome = self.run_inner(local_path).await;
        tracing::info!(
            "Validation completed in {:.3} seconds",
            started.elapsed().as_secs_f64()
        );
        outcome
    }

    async fn run_inner(&self, local_path: &Path) -> Result<ValidationResult, PipelineError> {
        if !has_zip_extension(local_path) {
            tracing::error!("Failed to validate because unknown file format");
            return Ok(ValidationResult::failure(
                PipelineError::UnsupportedFormat.to_string(),
            ));
        }

        let report = self
            .engine
            .validate(local_path, self.max_errors)
            .await
            .map_err(PipelineError::Engine)?;

        if report.is_valid {
            return Ok(ValidationResult::valid());
        }

        let message = if report.issues.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&report.issues)
                .map_err(|e| PipelineError::Engine(e.into()))?
        };
        tracing::error!("Error While Validating File: {}", message);

        Ok(ValidationResult::failure(message))
    }
}
