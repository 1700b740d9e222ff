//! In-memory capability fakes for processor and dispatcher tests. They mirror
//! the store-enforced semantics (atomic claim, terminal guard) without a
//! database or network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::{ConceptStore, SetStatusOutcome, TaskStore};
use crate::error::{AssetError, ConceptError, GatewayError, TaskStoreError};
use crate::gateway::GenerationGateway;
use crate::models::{
    GeneratedImage, NewConcept, Palette, Task, TaskStatus, TaskType,
};
use crate::services::{PipelineSettings, Services};
use crate::storage::{AssetStore, StoredAsset};

pub fn test_png() -> Vec<u8> {
    let pixels = image::RgbaImage::from_pixel(2, 2, image::Rgba([30, 60, 90, 255]));
    let mut out = Vec::new();
    pixels
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode test png");
    out
}

pub fn palette_named(name: &str) -> Palette {
    Palette {
        name: name.to_string(),
        colors: vec![
            "#112233".to_string(),
            "#445566".to_string(),
            "#778899".to_string(),
        ],
        description: format!("{name} palette"),
    }
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_pending(&self, task_type: TaskType, metadata: serde_json::Value) -> Task {
        let task = Task {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            task_type,
            status: TaskStatus::Pending,
            result_id: None,
            error_message: None,
            metadata,
            created_at: "2026-01-01 00:00:00".to_string(),
            updated_at: "2026-01-01 00:00:00".to_string(),
        };
        self.tasks.lock().unwrap().insert(task.id, task.clone());
        task
    }

    pub fn snapshot(&self, task_id: Uuid) -> Task {
        self.tasks
            .lock()
            .unwrap()
            .get(&task_id)
            .cloned()
            .expect("task exists")
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(
        &self,
        user_id: Uuid,
        task_type: TaskType,
        metadata: &serde_json::Value,
    ) -> Result<Task, TaskStoreError> {
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            task_type,
            status: TaskStatus::Pending,
            result_id: None,
            error_message: None,
            metadata: metadata.clone(),
            created_at: "2026-01-01 00:00:00".to_string(),
            updated_at: "2026-01-01 00:00:00".to_string(),
        };
        self.tasks.lock().unwrap().insert(task.id, task.clone());
        Ok(task)
    }

    async fn claim_if_pending(
        &self,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Task>, TaskStoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&task_id) {
            Some(task)
                if task.user_id == user_id && task.status == TaskStatus::Pending =>
            {
                task.status = TaskStatus::Processing;
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_status(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        status: TaskStatus,
        result_id: Option<Uuid>,
        error_message: Option<&str>,
    ) -> Result<SetStatusOutcome, TaskStoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(&task_id)
            .filter(|task| task.user_id == user_id)
            .ok_or(TaskStoreError::NotFound { task_id, user_id })?;
        if task.status.is_terminal() {
            return Ok(SetStatusOutcome::AlreadyTerminal(task.clone()));
        }
        task.status = status;
        task.result_id = result_id;
        task.error_message = error_message.map(str::to_string);
        Ok(SetStatusOutcome::Applied(task.clone()))
    }

    async fn get(&self, task_id: Uuid, user_id: Uuid) -> Result<Task, TaskStoreError> {
        self.tasks
            .lock()
            .unwrap()
            .get(&task_id)
            .filter(|task| task.user_id == user_id)
            .cloned()
            .ok_or(TaskStoreError::NotFound { task_id, user_id })
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Task>, TaskStoreError> {
        let tasks = self.tasks.lock().unwrap();
        let mut pending: Vec<Task> = tasks
            .values()
            .filter(|task| task.status == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }
}

#[derive(Default)]
pub struct StubGateway {
    image_bytes: Mutex<Option<Vec<u8>>>,
    image_url: Mutex<Option<String>>,
    palette_override: Mutex<Option<usize>>,
    generate_error: Mutex<Option<String>>,
    refine_error: Mutex<Option<String>>,
    palette_error: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_url(self, url: &str) -> Self {
        *self.image_url.lock().unwrap() = Some(url.to_string());
        self
    }

    pub fn set_image_bytes(&self, bytes: Vec<u8>) {
        *self.image_bytes.lock().unwrap() = Some(bytes);
    }

    pub fn set_palette_count(&self, count: usize) {
        *self.palette_override.lock().unwrap() = Some(count);
    }

    pub fn fail_generate(&self, message: &str) {
        *self.generate_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_refine(&self, message: &str) {
        *self.refine_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_palettes(&self, message: &str) {
        *self.palette_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn image_result(&self) -> GeneratedImage {
        if let Some(url) = self.image_url.lock().unwrap().clone() {
            return GeneratedImage {
                bytes: None,
                url: Some(url),
            };
        }
        let bytes = self
            .image_bytes
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(test_png);
        GeneratedImage {
            bytes: Some(bytes),
            url: None,
        }
    }
}

#[async_trait]
impl GenerationGateway for StubGateway {
    async fn generate_image(
        &self,
        _prompt: &str,
        _width: u32,
        _height: u32,
    ) -> Result<GeneratedImage, GatewayError> {
        self.record("generate_image");
        if let Some(message) = self.generate_error.lock().unwrap().clone() {
            return Err(GatewayError::Generation(message));
        }
        Ok(self.image_result())
    }

    async fn refine_image(
        &self,
        _prompt: &str,
        _image_url: &str,
        _strength: f32,
    ) -> Result<GeneratedImage, GatewayError> {
        self.record("refine_image");
        if let Some(message) = self.refine_error.lock().unwrap().clone() {
            return Err(GatewayError::Generation(message));
        }
        Ok(self.image_result())
    }

    async fn generate_palettes(
        &self,
        _prompt: &str,
        count: u32,
    ) -> Result<Vec<Palette>, GatewayError> {
        self.record("generate_palettes");
        if let Some(message) = self.palette_error.lock().unwrap().clone() {
            return Err(GatewayError::Generation(message));
        }
        let count = self
            .palette_override
            .lock()
            .unwrap()
            .unwrap_or(count as usize);
        Ok((1..=count)
            .map(|index| palette_named(&format!("palette-{index}")))
            .collect())
    }
}

struct StoredObject {
    content_type: String,
    metadata: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MemoryAssetStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    fetch_bodies: Mutex<HashMap<String, Vec<u8>>>,
    fail_store: Option<String>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_store(message: &str) -> Self {
        Self {
            fail_store: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn put_fetch_body(&self, url: &str, bytes: Vec<u8>) {
        self.fetch_bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes);
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn content_type_of(&self, path: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|object| object.content_type.clone())
    }

    pub fn metadata_of(&self, path: &str) -> Option<Vec<(String, String)>> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|object| object.metadata.clone())
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn store(
        &self,
        _bytes: Vec<u8>,
        path: &str,
        content_type: &str,
        metadata: &[(String, String)],
    ) -> Result<StoredAsset, AssetError> {
        if let Some(message) = &self.fail_store {
            return Err(AssetError::Upload(message.clone()));
        }
        self.objects.lock().unwrap().insert(
            path.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                metadata: metadata.to_vec(),
            },
        );
        Ok(StoredAsset {
            path: path.to_string(),
            url: format!("https://assets.test/{path}"),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        self.fetch_bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AssetError::Download(format!("download failed: {url} not found")))
    }

    async fn signed_url(&self, path: &str, _ttl_secs: u64) -> Result<String, AssetError> {
        Ok(format!("https://assets.test/{path}"))
    }
}

#[derive(Default)]
pub struct MemoryConceptStore {
    concepts: Mutex<Vec<(Uuid, NewConcept)>>,
    fail: Option<String>,
}

impl MemoryConceptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Vec<(Uuid, NewConcept)> {
        self.concepts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConceptStore for MemoryConceptStore {
    async fn store_concept(&self, concept: &NewConcept) -> Result<Uuid, ConceptError> {
        if let Some(message) = &self.fail {
            return Err(ConceptError::Database(message.clone()));
        }
        let concept_id = Uuid::new_v4();
        self.concepts
            .lock()
            .unwrap()
            .push((concept_id, concept.clone()));
        Ok(concept_id)
    }
}

pub struct TestHarness {
    pub tasks: Arc<InMemoryTaskStore>,
    pub gateway: Arc<StubGateway>,
    pub assets: Arc<MemoryAssetStore>,
    pub concepts: Arc<MemoryConceptStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(InMemoryTaskStore::new()),
            gateway: Arc::new(StubGateway::new()),
            assets: Arc::new(MemoryAssetStore::new()),
            concepts: Arc::new(MemoryConceptStore::new()),
        }
    }

    pub fn with_failing_assets(message: &str) -> Self {
        Self {
            assets: Arc::new(MemoryAssetStore::failing_store(message)),
            ..Self::new()
        }
    }

    pub fn with_failing_concepts(message: &str) -> Self {
        Self {
            concepts: Arc::new(MemoryConceptStore::failing(message)),
            ..Self::new()
        }
    }

    pub fn services(&self) -> Services {
        Services {
            tasks: self.tasks.clone(),
            gateway: self.gateway.clone(),
            assets: self.assets.clone(),
            concepts: self.concepts.clone(),
            settings: PipelineSettings {
                image_width: 512,
                image_height: 512,
                refine_strength: 0.7,
                palette_concurrency: 2,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_honors_the_task_store_contract() {
        let store = InMemoryTaskStore::new();
        let user_id = Uuid::new_v4();
        let task = store
            .create(user_id, TaskType::Generation, &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let claimed = store.claim_if_pending(task.id, user_id).await.unwrap();
        assert!(claimed.is_some());
        assert!(store
            .claim_if_pending(task.id, user_id)
            .await
            .unwrap()
            .is_none());

        let concept_id = Uuid::new_v4();
        let outcome = store
            .set_status(task.id, user_id, TaskStatus::Completed, Some(concept_id), None)
            .await
            .unwrap();
        assert!(matches!(outcome, SetStatusOutcome::Applied(_)));

        let task = store.get(task.id, user_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result_id, Some(concept_id));

        let wrong_owner = store.get(task.id, Uuid::new_v4()).await;
        assert!(matches!(wrong_owner, Err(TaskStoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_pending_skips_claimed_tasks() {
        let store = InMemoryTaskStore::new();
        let first = store.seed_pending(TaskType::Generation, serde_json::json!({}));
        let second = store.seed_pending(TaskType::Refinement, serde_json::json!({}));
        store
            .claim_if_pending(first.id, first.user_id)
            .await
            .unwrap();

        let pending = store.list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
    }
}
