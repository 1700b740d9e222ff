use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{NewConcept, RefinementProvenance, RefinementRequest, TaskType};
use crate::processor::{run_claimed, TaskLifecycle};
use crate::services::Services;
use crate::stages::{image, refine, store};

/// Owns the full lifecycle of one `refinement` task. Every stage consumes the
/// previous stage's output, so the pipeline is strictly sequential.
pub struct RefinementProcessor<'a> {
    services: &'a Services,
    request: RefinementRequest,
}

impl<'a> RefinementProcessor<'a> {
    pub fn new(services: &'a Services, request: RefinementRequest) -> Self {
        Self { services, request }
    }

    pub async fn run(&self) {
        let lifecycle = TaskLifecycle::new(
            self.services.tasks.clone(),
            self.request.task_id,
            self.request.user_id,
        );
        run_claimed(&lifecycle, TaskType::Refinement, || self.execute()).await;
    }

    async fn execute(&self) -> Result<Uuid, PipelineError> {
        let assets = self.services.assets.as_ref();

        // Validate the source image before handing it to the gateway.
        refine::download_original(assets, &self.request.original_image_url).await?;

        let refined_bytes = refine::refine_image(
            self.services.gateway.as_ref(),
            assets,
            &self.request.refine_prompt(),
            &self.request.original_image_url,
            self.services.settings.refine_strength,
        )
        .await?;

        let content_type = image::content_type(&refined_bytes);
        let key = store::image_key(self.request.user_id, image::extension(content_type));
        let metadata = vec![
            (
                "refinement-prompt".to_string(),
                self.request.refinement_prompt.clone(),
            ),
            (
                "logo-description".to_string(),
                self.request.logo_description.clone(),
            ),
            (
                "theme-description".to_string(),
                self.request.theme_description.clone(),
            ),
        ];
        let stored = assets
            .store(refined_bytes, &key, content_type, &metadata)
            .await?;

        let concept = NewConcept {
            user_id: self.request.user_id,
            logo_description: self.request.logo_description.clone(),
            theme_description: self.request.theme_description.clone(),
            image_path: stored.path,
            image_url: stored.url,
            is_anonymous: false,
            // Refinements never re-derive palettes.
            variations: Vec::new(),
            provenance: Some(RefinementProvenance {
                original_image_url: self.request.original_image_url.clone(),
                refinement_prompt: self.request.refinement_prompt.clone(),
            }),
        };
        let concept_id = self.services.concepts.store_concept(&concept).await?;
        Ok(concept_id)
    }
}
