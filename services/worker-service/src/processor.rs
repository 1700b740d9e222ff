use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::db::{SetStatusOutcome, TaskStore};
use crate::error::{truncate_message, PipelineError, TaskStoreError, ERROR_MESSAGE_LIMIT};
use crate::models::{TaskStatus, TaskType};

/// Shared claim/complete/fail protocol for one task. All writes delegate to
/// the task store; terminal no-ops are logged, never raised.
pub struct TaskLifecycle {
    tasks: Arc<dyn TaskStore>,
    task_id: Uuid,
    user_id: Uuid,
}

impl TaskLifecycle {
    pub fn new(tasks: Arc<dyn TaskStore>, task_id: Uuid, user_id: Uuid) -> Self {
        Self {
            tasks,
            task_id,
            user_id,
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub async fn claim(&self) -> Result<bool, TaskStoreError> {
        let claimed = self
            .tasks
            .claim_if_pending(self.task_id, self.user_id)
            .await?;
        Ok(claimed.is_some())
    }

    pub async fn complete(&self, concept_id: Uuid) {
        self.finalize(TaskStatus::Completed, Some(concept_id), None)
            .await;
    }

    pub async fn fail(&self, message: &str) {
        let message = truncate_message(message, ERROR_MESSAGE_LIMIT);
        self.finalize(TaskStatus::Failed, None, Some(&message)).await;
    }

    async fn finalize(
        &self,
        status: TaskStatus,
        result_id: Option<Uuid>,
        error_message: Option<&str>,
    ) {
        let outcome = self
            .tasks
            .set_status(self.task_id, self.user_id, status, result_id, error_message)
            .await;
        match outcome {
            Ok(SetStatusOutcome::Applied(_)) => {
                tracing::info!(task_id = %self.task_id, status = status.as_str(), "task finalized");
            }
            Ok(SetStatusOutcome::AlreadyTerminal(task)) => {
                tracing::warn!(
                    task_id = %self.task_id,
                    current = task.status.as_str(),
                    attempted = status.as_str(),
                    "status write ignored; task already terminal"
                );
            }
            Err(err) => {
                tracing::error!(task_id = %self.task_id, error = %err, "status write failed");
            }
        }
    }
}

/// Lifecycle skeleton shared by both processors: claim the task, run the
/// type-specific stages, and convert the outcome into a terminal write. A
/// failed claim means another delivery of the same message won the race, so
/// we stop before any side effects.
pub async fn run_claimed<F, Fut>(lifecycle: &TaskLifecycle, task_type: TaskType, execute: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Uuid, PipelineError>>,
{
    match lifecycle.claim().await {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(
                task_id = %lifecycle.task_id(),
                task_type = task_type.as_str(),
                "task not pending; skipping duplicate delivery"
            );
            return;
        }
        Err(err) => {
            // Leave the task pending; a later delivery retries the claim.
            tracing::error!(task_id = %lifecycle.task_id(), error = %err, "claim failed");
            return;
        }
    }

    tracing::info!(
        task_id = %lifecycle.task_id(),
        task_type = task_type.as_str(),
        "task claimed"
    );

    match execute().await {
        Ok(concept_id) => lifecycle.complete(concept_id).await,
        Err(err) => {
            tracing::error!(
                task_id = %lifecycle.task_id(),
                task_type = task_type.as_str(),
                error = %err,
                "task execution failed"
            );
            lifecycle.fail(&err.to_string()).await;
        }
    }
}
