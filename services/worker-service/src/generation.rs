use uuid::Uuid;

use crate::error::{FanOutError, PipelineError};
use crate::models::{GenerationRequest, NewConcept, TaskType};
use crate::processor::{run_claimed, TaskLifecycle};
use crate::services::Services;
use crate::stages::{image, palette, store};

/// Owns the full lifecycle of one `generation` task: base image from the
/// gateway, concurrent store + palette fan-out, per-palette variations, and
/// the final concept write.
pub struct GenerationProcessor<'a> {
    services: &'a Services,
    request: GenerationRequest,
}

impl<'a> GenerationProcessor<'a> {
    pub fn new(services: &'a Services, request: GenerationRequest) -> Self {
        Self { services, request }
    }

    pub async fn run(&self) {
        let lifecycle = TaskLifecycle::new(
            self.services.tasks.clone(),
            self.request.task_id,
            self.request.user_id,
        );
        run_claimed(&lifecycle, TaskType::Generation, || self.execute()).await;
    }

    async fn execute(&self) -> Result<Uuid, PipelineError> {
        let settings = &self.services.settings;

        let generated = self
            .services
            .gateway
            .generate_image(
                &self.request.image_prompt(),
                settings.image_width,
                settings.image_height,
            )
            .await?;
        let base_bytes = image::normalize_image(self.services.assets.as_ref(), generated).await?;

        // Base-image upload and palette generation are independent and both
        // I/O-bound; run them together and report which side broke.
        let store_base = store::store_base_image(
            self.services.assets.as_ref(),
            self.request.user_id,
            base_bytes.clone(),
        );
        let request_palettes = palette::generate_palettes(
            self.services.gateway.as_ref(),
            &self.request.theme_description,
            self.request.num_palettes,
        );
        let (stored_base, palettes) = match tokio::join!(store_base, request_palettes) {
            (Ok(stored_base), Ok(palettes)) => (stored_base, palettes),
            (store_result, palette_result) => {
                return Err(FanOutError {
                    image_store: store_result.err().map(|err| err.to_string()),
                    palette_generation: palette_result.err().map(|err| err.to_string()),
                }
                .into())
            }
        };

        let variations = store::store_variations(
            self.services.assets.as_ref(),
            self.request.user_id,
            &base_bytes,
            palettes,
            settings.palette_concurrency,
        )
        .await?;

        let concept = NewConcept {
            user_id: self.request.user_id,
            logo_description: self.request.logo_description.clone(),
            theme_description: self.request.theme_description.clone(),
            image_path: stored_base.path,
            image_url: stored_base.url,
            is_anonymous: self.request.is_anonymous,
            variations,
            provenance: None,
        };
        let concept_id = self.services.concepts.store_concept(&concept).await?;
        Ok(concept_id)
    }
}
