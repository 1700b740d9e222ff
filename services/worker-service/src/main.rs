mod config;
mod db;
mod dispatcher;
mod error;
mod gateway;
mod generation;
mod models;
mod processor;
mod refinement;
mod services;
mod stages;
mod storage;
#[cfg(test)]
mod testing;
mod worker;

use std::sync::Arc;

use concept_common::init_tracing;
use tokio::sync::Mutex;
use tokio_postgres::NoTls;

use crate::config::WorkerConfig;
use crate::db::{PgConceptStore, PgTaskStore};
use crate::gateway::HttpGenerationGateway;
use crate::services::{PipelineSettings, Services};
use crate::storage::S3AssetStore;

#[tokio::main]
async fn main() {
    let _guards = init_tracing("worker-service");

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load config");
            return;
        }
    };

    let (client, connection) = match tokio_postgres::connect(&config.database_url, NoTls).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(error = %err, "connect db failed");
            return;
        }
    };
    tokio::spawn(async move {
        // Drive the connection in the background.
        if let Err(err) = connection.await {
            tracing::error!(error = %err, "database connection error");
        }
    });

    let assets = match S3AssetStore::new(config.storage.clone()).await {
        Ok(assets) => assets,
        Err(err) => {
            tracing::error!(error = %err, "storage client init failed");
            return;
        }
    };

    let db = Arc::new(Mutex::new(client));
    let services = Arc::new(Services {
        tasks: Arc::new(PgTaskStore::new(db.clone())),
        concepts: Arc::new(PgConceptStore::new(db)),
        gateway: Arc::new(HttpGenerationGateway::new(config.gateway.clone())),
        assets: Arc::new(assets),
        settings: PipelineSettings::from_config(&config),
    });

    tracing::info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        batch_size = config.batch_size,
        "worker started"
    );
    worker::run(services, &config).await;
}
