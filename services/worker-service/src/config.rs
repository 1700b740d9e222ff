use std::{env, time::Duration};

use concept_common::env_or;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub palette_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub image_width: u32,
    pub image_height: u32,
    pub refine_strength: f32,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub force_path_style: bool,
    pub signed_url_ttl_secs: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Database is required for task claims and concept writes.
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is required".to_string())?;

        let gateway = GatewayConfig {
            base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8090".to_string()),
            api_key: env::var("GATEWAY_API_KEY").unwrap_or_default(),
            image_width: env_or("GATEWAY_IMAGE_WIDTH", 512u32),
            image_height: env_or("GATEWAY_IMAGE_HEIGHT", 512u32),
            refine_strength: env_or("GATEWAY_REFINE_STRENGTH", 0.7f32),
        };

        let storage = StorageConfig {
            endpoint: env::var("S3_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            access_key: env::var("S3_ACCESS_KEY").unwrap_or_default(),
            secret_key: env::var("S3_SECRET_KEY").unwrap_or_default(),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "concept-images".to_string()),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            force_path_style: env_or("S3_FORCE_PATH_STYLE", true),
            signed_url_ttl_secs: env_or("SIGNED_URL_TTL_SECS", 3600u64),
        };

        Ok(Self {
            database_url,
            poll_interval: Duration::from_secs(env_or("POLL_INTERVAL_SECS", 2u64)),
            batch_size: env_or("POLL_BATCH_SIZE", 5i64),
            gateway,
            storage,
            palette_concurrency: env_or("PALETTE_CONCURRENCY", 4usize).max(1),
        })
    }
}
