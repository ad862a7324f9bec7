use thiserror::Error;

/// Observable text for both unsupported formats and failed downloads
pub const UNKNOWN_FORMAT_MESSAGE: &str = "Failed to validate because unknown file format";

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create workspace at {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Cleanup {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures below the decoding stage. Each one still ends in a published result.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Request does not have valid file path specified.")]
    MissingField,

    #[error("File entity not found")]
    EmptyLocator,

    #[error("Unauthorized request !")]
    AuthorizationDenied,

    #[error("Failed to validate because unknown file format")]
    Download(#[source] anyhow::Error),

    #[error("Failed to validate because unknown file format")]
    UnsupportedFormat,

    #[error("{0}")]
    Engine(#[source] anyhow::Error),

    #[error("Failed to publish result: {0}")]
    Publish(#[source] anyhow::Error),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}
