use std::sync::Arc;

use crate::config::WorkerConfig;
use crate::db::{ConceptStore, TaskStore};
use crate::gateway::GenerationGateway;
use crate::storage::AssetStore;

/// Tunables the processors need beyond the capability handles.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub image_width: u32,
    pub image_height: u32,
    pub refine_strength: f32,
    pub palette_concurrency: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            image_width: config.gateway.image_width,
            image_height: config.gateway.image_height,
            refine_strength: config.gateway.refine_strength,
            palette_concurrency: config.palette_concurrency,
        }
    }
}

/// The capability bundle handed to the dispatcher and processors. Built once
/// at startup; tests substitute in-memory implementations.
#[derive(Clone)]
pub struct Services {
    pub tasks: Arc<dyn TaskStore>,
    pub gateway: Arc<dyn GenerationGateway>,
    pub assets: Arc<dyn AssetStore>,
    pub concepts: Arc<dyn ConceptStore>,
    pub settings: PipelineSettings,
}
