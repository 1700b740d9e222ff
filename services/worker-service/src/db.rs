use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_postgres::{Client, Row};
use uuid::Uuid;

use crate::error::{ConceptError, TaskStoreError};
use crate::models::{NewConcept, Task, TaskStatus, TaskType};

const TASK_COLUMNS: &str = "id, user_id, task_type, status, result_id, error_message, metadata, \
created_at::text AS created_at, updated_at::text AS updated_at";

/// Outcome of a status write: either the transition applied, or the task was
/// already terminal and the row is unchanged.
#[derive(Debug)]
pub enum SetStatusOutcome {
    Applied(Task),
    AlreadyTerminal(Task),
}

/// Shared record of task identity, status and result reference. The claim is
/// a single conditional update enforced by the store, never by in-process
/// locking, so redelivered messages are safe across worker instances.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        task_type: TaskType,
        metadata: &serde_json::Value,
    ) -> Result<Task, TaskStoreError>;

    /// Atomically move `pending -> processing`. Returns `None` when the task
    /// is no longer pending (claimed elsewhere or already finished).
    async fn claim_if_pending(
        &self,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Task>, TaskStoreError>;

    async fn set_status(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        status: TaskStatus,
        result_id: Option<Uuid>,
        error_message: Option<&str>,
    ) -> Result<SetStatusOutcome, TaskStoreError>;

    async fn get(&self, task_id: Uuid, user_id: Uuid) -> Result<Task, TaskStoreError>;

    /// Oldest pending tasks, for the worker poll loop.
    async fn list_pending(&self, limit: i64) -> Result<Vec<Task>, TaskStoreError>;
}

/// Durable concept writes: one concept row plus its palette variations in a
/// single transaction.
#[async_trait]
pub trait ConceptStore: Send + Sync {
    async fn store_concept(&self, concept: &NewConcept) -> Result<Uuid, ConceptError>;
}

fn sql_insert_task() -> String {
    format!(
        "INSERT INTO tasks (id, user_id, task_type, status, metadata) \
         VALUES ($1, $2, $3, 'pending', $4) RETURNING {TASK_COLUMNS}"
    )
}

fn sql_claim_task() -> String {
    // The claim gate: succeeds for at most one caller per task.
    format!(
        "UPDATE tasks SET status = 'processing', updated_at = NOW() \
         WHERE id = $1 AND user_id = $2 AND status = 'pending' RETURNING {TASK_COLUMNS}"
    )
}

fn sql_set_status() -> String {
    // Terminal statuses are guarded in SQL; a lost race updates zero rows.
    format!(
        "UPDATE tasks SET status = $3, result_id = $4, error_message = $5, updated_at = NOW() \
         WHERE id = $1 AND user_id = $2 AND status IN ('pending', 'processing') \
         RETURNING {TASK_COLUMNS}"
    )
}

fn sql_select_task() -> String {
    format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND user_id = $2")
}

fn sql_list_pending() -> String {
    format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'pending' \
         ORDER BY created_at, id LIMIT $1"
    )
}

const SQL_INSERT_CONCEPT: &str = "INSERT INTO concepts \
(id, user_id, logo_description, theme_description, image_path, image_url, is_anonymous, \
original_image_url, refinement_prompt) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";

const SQL_INSERT_VARIATION: &str = "INSERT INTO color_variations \
(id, concept_id, palette_name, colors, description, image_path, image_url) \
VALUES ($1, $2, $3, $4, $5, $6, $7)";

fn task_from_row(row: &Row) -> Result<Task, TaskStoreError> {
    let task_type: String = row.get("task_type");
    let task_type = task_type
        .parse::<TaskType>()
        .map_err(|_| TaskStoreError::Database(format!("unknown task type: {task_type}")))?;
    let status: String = row.get("status");
    let status = status
        .parse::<TaskStatus>()
        .map_err(|_| TaskStoreError::Database(format!("unknown task status: {status}")))?;

    Ok(Task {
        id: row.get("id"),
        user_id: row.get("user_id"),
        task_type,
        status,
        result_id: row.get("result_id"),
        error_message: row.get("error_message"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub struct PgTaskStore {
    db: Arc<Mutex<Client>>,
}

impl PgTaskStore {
    pub fn new(db: Arc<Mutex<Client>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(
        &self,
        user_id: Uuid,
        task_type: TaskType,
        metadata: &serde_json::Value,
    ) -> Result<Task, TaskStoreError> {
        let db = self.db.lock().await;
        let row = db
            .query_one(
                sql_insert_task().as_str(),
                &[&Uuid::new_v4(), &user_id, &task_type.as_str(), metadata],
            )
            .await
            .map_err(|err| TaskStoreError::Database(format!("insert task failed: {err}")))?;
        task_from_row(&row)
    }

    async fn claim_if_pending(
        &self,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Task>, TaskStoreError> {
        let db = self.db.lock().await;
        let row = db
            .query_opt(sql_claim_task().as_str(), &[&task_id, &user_id])
            .await
            .map_err(|err| TaskStoreError::Database(format!("claim failed: {err}")))?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn set_status(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        status: TaskStatus,
        result_id: Option<Uuid>,
        error_message: Option<&str>,
    ) -> Result<SetStatusOutcome, TaskStoreError> {
        let db = self.db.lock().await;
        let row = db
            .query_opt(
                sql_set_status().as_str(),
                &[
                    &task_id,
                    &user_id,
                    &status.as_str(),
                    &result_id,
                    &error_message,
                ],
            )
            .await
            .map_err(|err| TaskStoreError::Database(format!("set status failed: {err}")))?;

        if let Some(row) = row {
            return Ok(SetStatusOutcome::Applied(task_from_row(&row)?));
        }

        // Zero rows updated: either unknown task or a terminal status won.
        let current = db
            .query_opt(sql_select_task().as_str(), &[&task_id, &user_id])
            .await
            .map_err(|err| TaskStoreError::Database(format!("select task failed: {err}")))?
            .ok_or(TaskStoreError::NotFound { task_id, user_id })?;
        Ok(SetStatusOutcome::AlreadyTerminal(task_from_row(&current)?))
    }

    async fn get(&self, task_id: Uuid, user_id: Uuid) -> Result<Task, TaskStoreError> {
        let db = self.db.lock().await;
        let row = db
            .query_opt(sql_select_task().as_str(), &[&task_id, &user_id])
            .await
            .map_err(|err| TaskStoreError::Database(format!("select task failed: {err}")))?
            .ok_or(TaskStoreError::NotFound { task_id, user_id })?;
        task_from_row(&row)
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Task>, TaskStoreError> {
        let db = self.db.lock().await;
        let rows = db
            .query(sql_list_pending().as_str(), &[&limit])
            .await
            .map_err(|err| TaskStoreError::Database(format!("list pending failed: {err}")))?;
        rows.iter().map(task_from_row).collect()
    }
}

pub struct PgConceptStore {
    db: Arc<Mutex<Client>>,
}

impl PgConceptStore {
    pub fn new(db: Arc<Mutex<Client>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConceptStore for PgConceptStore {
    async fn store_concept(&self, concept: &NewConcept) -> Result<Uuid, ConceptError> {
        let mut db = self.db.lock().await;
        let transaction = db
            .transaction()
            .await
            .map_err(|err| ConceptError::Database(format!("start transaction failed: {err}")))?;

        let concept_id = Uuid::new_v4();
        let (original_image_url, refinement_prompt) = match &concept.provenance {
            Some(provenance) => (
                Some(provenance.original_image_url.as_str()),
                Some(provenance.refinement_prompt.as_str()),
            ),
            None => (None, None),
        };
        transaction
            .execute(
                SQL_INSERT_CONCEPT,
                &[
                    &concept_id,
                    &concept.user_id,
                    &concept.logo_description,
                    &concept.theme_description,
                    &concept.image_path,
                    &concept.image_url,
                    &concept.is_anonymous,
                    &original_image_url,
                    &refinement_prompt,
                ],
            )
            .await
            .map_err(|err| ConceptError::Database(format!("insert concept failed: {err}")))?;

        for variation in &concept.variations {
            transaction
                .execute(
                    SQL_INSERT_VARIATION,
                    &[
                        &Uuid::new_v4(),
                        &concept_id,
                        &variation.palette_name,
                        &json!(variation.colors),
                        &variation.description,
                        &variation.image_path,
                        &variation.image_url,
                    ],
                )
                .await
                .map_err(|err| ConceptError::Database(format!("insert variation failed: {err}")))?;
        }

        transaction
            .commit()
            .await
            .map_err(|err| ConceptError::Database(format!("commit failed: {err}")))?;
        Ok(concept_id)
    }
}
