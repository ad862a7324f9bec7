use crate::config::StorageSettings;
use crate::services::storage::{BlobStorage, S3BlobStorage};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(settings: &StorageSettings) -> Arc<dyn BlobStorage> {
    let mut loader = aws_config::from_env().region(Region::new(settings.region.clone()));

    if let Some(endpoint_url) = &settings.endpoint {
        info!("☁️  Blob Storage: {} (Region: {})", endpoint_url, settings.region);
        loader = loader.endpoint_url(endpoint_url);
    } else {
        info!("☁️  Blob Storage: default endpoint (Region: {})", settings.region);
    }

    if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key) {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(settings.endpoint.is_some())
        .build();

    Arc::new(S3BlobStorage::new(aws_sdk_s3::Client::from_conf(s3_config)))
}
