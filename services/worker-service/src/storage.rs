use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Credentials, config::Region, presigning::PresigningConfig, Client};

use crate::config::StorageConfig;
use crate::error::AssetError;

#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub path: String,
    pub url: String,
}

/// Object storage capability: persist image bytes under a key, fetch bytes
/// from a URL, and mint time-limited access URLs.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn store(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
        metadata: &[(String, String)],
    ) -> Result<StoredAsset, AssetError>;

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError>;

    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, AssetError>;
}

#[derive(Clone)]
pub struct S3AssetStore {
    client: Client,
    http: reqwest::Client,
    bucket: String,
    signed_url_ttl_secs: u64,
}

impl S3AssetStore {
    pub async fn new(config: StorageConfig) -> Result<Self, AssetError> {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "concept",
        );
        let region = Region::new(config.region);
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Ok(Self {
            client: Client::from_conf(s3_config),
            http: reqwest::Client::new(),
            bucket: config.bucket,
            signed_url_ttl_secs: config.signed_url_ttl_secs,
        })
    }

    async fn ensure_bucket(&self) -> Result<(), AssetError> {
        let exists = self
            .client
            .head_bucket()
            .bucket(self.bucket.as_str())
            .send()
            .await
            .is_ok();
        if !exists {
            self.client
                .create_bucket()
                .bucket(self.bucket.as_str())
                .send()
                .await
                .map_err(|err| AssetError::Upload(format!("create bucket failed: {err}")))?;
        }
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl_secs: u64) -> Result<String, AssetError> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(ttl_secs))
            .map_err(|err| AssetError::Sign(format!("presign config failed: {err}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| AssetError::Sign(format!("presign failed: {err}")))?;
        Ok(presigned.uri().to_string())
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn store(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
        metadata: &[(String, String)],
    ) -> Result<StoredAsset, AssetError> {
        self.ensure_bucket().await?;

        let mut request = self
            .client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(path)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes));
        for (key, value) in metadata {
            request = request.metadata(key.as_str(), value.as_str());
        }
        request
            .send()
            .await
            .map_err(|err| AssetError::Upload(format!("put object failed: {err}")))?;

        let url = self.presign_get(path, self.signed_url_ttl_secs).await?;
        Ok(StoredAsset {
            path: path.to_string(),
            url,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| AssetError::Download(format!("download failed: {err}")))?;
        if !response.status().is_success() {
            return Err(AssetError::Download(format!(
                "download failed: status {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| AssetError::Download(format!("read body failed: {err}")))?;
        Ok(bytes.to_vec())
    }

    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, AssetError> {
        self.presign_get(path, ttl_secs).await
    }
}
