use crate::services::runner::{EngineReport, ValidationEngine};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Runs an external validator executable.
///
/// Invoked as `<program> <zip path> --max-errors <n>`; stdout must hold a JSON
/// object `{"is_valid": bool, "issues": [...]}`.
pub struct CommandValidationEngine {
    program: String,
    version: String,
}

impl CommandValidationEngine {
    pub fn new(program: String, version: String) -> Self {
        Self { program, version }
    }
}

#[async_trait]
impl ValidationEngine for CommandValidationEngine {
    async fn validate(&self, zip_path: &Path, max_errors: usize) -> Result<EngineReport> {
        let output = Command::new(&self.program)
            .arg(zip_path)
            .arg("--max-errors")
            .arg(max_errors.to_string())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start validation engine '{}'", self.program))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!("Validation engine stderr: {}", stderr.trim());
        }

        // The engine may exit non-zero for invalid archives, so a parseable report wins over the exit code
        match parse_report(&output.stdout) {
            Ok(report) => Ok(report),
            Err(e) if output.status.success() => Err(e),
            Err(_) => Err(anyhow!(
                "Validation engine exited with {}: {}",
                output.status,
                stderr.trim()
            )),
        }
    }

    fn version(&self) -> String {
        self.version.clone()
    }
}

fn parse_report(stdout: &[u8]) -> Result<EngineReport> {
    serde_json::from_slice(stdout).context("Validation engine produced an unreadable report")
}
