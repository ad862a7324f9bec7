use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use std::pin::Pin;
use tokio::io::AsyncRead;
use url::Url;

/// Read access to the blob store holding uploaded files
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Open a stream over the blob named by `locator` inside `container`.
    async fn get_file(
        &self,
        container: &str,
        locator: &str,
    ) -> Result<Pin<Box<dyn AsyncRead + Send>>>;
}

pub struct S3BlobStorage {
    client: Client,
}

impl S3BlobStorage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobStorage for S3BlobStorage {
    async fn get_file(
        &self,
        container: &str,
        locator: &str,
    ) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        let key = object_key(container, locator)?;
        tracing::debug!("Fetching s3://{}/{}", container, key);

        let output = self
            .client
            .get_object()
            .bucket(container)
            .key(&key)
            .send()
            .await
            .map_err(|e| anyhow!(e.into_service_error()))?;

        Ok(Box::pin(output.body.into_async_read()))
    }
}

/// Resolve a locator to an object key.
///
/// Full URLs (`https://account.host/<container>/<key>`) keep only the part after the
/// container segment; bare paths drop a leading `<container>/` if present.
pub fn object_key(container: &str, locator: &str) -> Result<String> {
    let path = match Url::parse(locator) {
        Ok(url) => url.path().to_string(),
        Err(_) => locator.to_string(),
    };

    let trimmed = path.trim_start_matches('/');
    let key = match trimmed.split_once('/') {
        Some((first, rest)) if first == container => rest,
        _ => trimmed,
    };

    if key.is_empty() {
        return Err(anyhow!("Locator '{}' does not name a file", locator));
    }
    Ok(key.to_string())
}
