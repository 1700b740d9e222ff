use std::sync::Arc;

use serde_json::{json, Value};
use tokio::time::sleep;

use crate::config::WorkerConfig;
use crate::dispatcher;
use crate::models::Task;
use crate::services::Services;

/// Consume pending tasks until shutdown. Delivery is at-least-once: another
/// worker may pick up the same row, and the claim gate decides who executes.
pub async fn run(services: Arc<Services>, config: &WorkerConfig) {
    let shutdown = concept_common::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let batch = match services.tasks.list_pending(config.batch_size).await {
            Ok(batch) => batch,
            Err(err) => {
                tracing::error!(error = %err, "poll for pending tasks failed");
                Vec::new()
            }
        };
        if !batch.is_empty() {
            tracing::info!(count = batch.len(), "picked up pending tasks");
        }
        for task in batch {
            dispatcher::handle_message(&services, inbound_message(&task)).await;
        }

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
            _ = sleep(config.poll_interval) => {}
        }
    }
}

// Rebuild the queued message from the envelope columns plus stored metadata.
// Envelope fields win over anything metadata happens to contain.
fn inbound_message(task: &Task) -> Value {
    let mut payload = match &task.metadata {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    payload.insert("task_id".to_string(), json!(task.id));
    payload.insert("user_id".to_string(), json!(task.user_id));
    payload.insert("task_type".to_string(), json!(task.task_type.as_str()));
    Value::Object(payload)
}
