use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Ceiling for persisted task error messages.
pub const ERROR_MESSAGE_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown task type: {0}")]
    UnknownTaskType(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("generation service unreachable: {0}")]
    Connection(String),
    #[error("generation service rejected credentials")]
    Auth,
    #[error("generation request failed: {0}")]
    Generation(String),
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset download failed: {0}")]
    Download(String),
    #[error("asset upload failed: {0}")]
    Upload(String),
    #[error("invalid image payload: {0}")]
    InvalidImage(String),
    #[error("signed url failed: {0}")]
    Sign(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid palette color '{0}'")]
    InvalidColor(String),
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image encode failed: {0}")]
    Encode(String),
    #[error("palette render interrupted")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("task {task_id} not found for owner {user_id}")]
    NotFound { task_id: Uuid, user_id: Uuid },
    #[error("task store query failed: {0}")]
    Database(String),
}

#[derive(Debug, Error)]
pub enum ConceptError {
    #[error("concept persistence failed: {0}")]
    Database(String),
}

/// Failure of the concurrent store-image / generate-palettes stage,
/// preserving which side (or both) failed.
#[derive(Debug)]
pub struct FanOutError {
    pub image_store: Option<String>,
    pub palette_generation: Option<String>,
}

impl fmt::Display for FanOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(error) = &self.image_store {
            parts.push(format!("image storage failed: {error}"));
        }
        if let Some(error) = &self.palette_generation {
            parts.push(format!("palette generation failed: {error}"));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FanOutError {}

/// Stage-level error caught at the processor boundary and converted into a
/// failed-task write.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Persistence(#[from] ConceptError),
    #[error(transparent)]
    FanOut(#[from] FanOutError),
}

/// Truncate to the storage ceiling without splitting a UTF-8 character.
pub fn truncate_message(message: &str, limit: usize) -> String {
    if message.len() <= limit {
        return message.to_string();
    }
    let mut end = limit;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
