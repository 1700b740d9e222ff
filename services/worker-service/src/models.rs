use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Generation,
    Refinement,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Generation => "generation",
            TaskType::Refinement => "refinement",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generation" => Ok(TaskType::Generation),
            "refinement" => Ok(TaskType::Refinement),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    // Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub result_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

/// Inbound queued message for one task. Envelope fields are always present;
/// type-specific fields are validated per task type by the dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskMessage {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub task_type: String,
    #[serde(default)]
    pub logo_description: Option<String>,
    #[serde(default)]
    pub theme_description: Option<String>,
    #[serde(default)]
    pub num_palettes: Option<i64>,
    #[serde(default)]
    pub is_anonymous: Option<bool>,
    #[serde(default)]
    pub refinement_prompt: Option<String>,
    #[serde(default)]
    pub original_image_url: Option<String>,
}

pub const DEFAULT_NUM_PALETTES: i64 = 7;
pub const MAX_NUM_PALETTES: i64 = 10;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub logo_description: String,
    pub theme_description: String,
    pub num_palettes: u32,
    pub is_anonymous: bool,
}

impl GenerationRequest {
    pub fn from_message(message: &TaskMessage) -> Result<Self, ValidationError> {
        let logo_description = required_field(&message.logo_description, "logo_description")?;
        let theme_description = required_field(&message.theme_description, "theme_description")?;
        let num_palettes = message
            .num_palettes
            .unwrap_or(DEFAULT_NUM_PALETTES)
            .clamp(1, MAX_NUM_PALETTES) as u32;

        Ok(Self {
            task_id: message.task_id,
            user_id: message.user_id,
            logo_description,
            theme_description,
            num_palettes,
            is_anonymous: message.is_anonymous.unwrap_or(false),
        })
    }

    pub fn image_prompt(&self) -> String {
        format!("{}, {}", self.logo_description, self.theme_description)
    }
}

#[derive(Debug, Clone)]
pub struct RefinementRequest {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub refinement_prompt: String,
    pub original_image_url: String,
    pub logo_description: String,
    pub theme_description: String,
}

impl RefinementRequest {
    pub fn from_message(message: &TaskMessage) -> Result<Self, ValidationError> {
        let refinement_prompt = required_field(&message.refinement_prompt, "refinement_prompt")?;
        let original_image_url =
            required_field(&message.original_image_url, "original_image_url")?;

        Ok(Self {
            task_id: message.task_id,
            user_id: message.user_id,
            refinement_prompt,
            original_image_url,
            logo_description: optional_field(&message.logo_description),
            theme_description: optional_field(&message.theme_description),
        })
    }

    pub fn refine_prompt(&self) -> String {
        // Carry the original descriptions so the gateway refines in context.
        let mut prompt = self.refinement_prompt.clone();
        if !self.logo_description.is_empty() || !self.theme_description.is_empty() {
            prompt.push_str(&format!(
                " (original concept: {}, {})",
                self.logo_description, self.theme_description
            ));
        }
        prompt
    }
}

fn required_field(value: &Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ValidationError::MissingField(field))
}

fn optional_field(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// One palette returned by the generation gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Palette {
    pub name: String,
    pub colors: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Image produced by the gateway: inline bytes, or a URL to download.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Option<Vec<u8>>,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewVariation {
    pub palette_name: String,
    pub colors: Vec<String>,
    pub description: String,
    pub image_path: String,
    pub image_url: String,
}

#[derive(Debug, Clone)]
pub struct RefinementProvenance {
    pub original_image_url: String,
    pub refinement_prompt: String,
}

#[derive(Debug, Clone)]
pub struct NewConcept {
    pub user_id: Uuid,
    pub logo_description: String,
    pub theme_description: String,
    pub image_path: String,
    pub image_url: String,
    pub is_anonymous: bool,
    pub variations: Vec<NewVariation>,
    pub provenance: Option<RefinementProvenance>,
}
