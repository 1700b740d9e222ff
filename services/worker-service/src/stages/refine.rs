use crate::error::{AssetError, PipelineError};
use crate::gateway::GenerationGateway;
use crate::stages::image;
use crate::storage::AssetStore;

/// Fetch and validate the image a refinement starts from. A bad URL or a
/// non-image payload is fatal to the task.
pub async fn download_original(
    assets: &dyn AssetStore,
    url: &str,
) -> Result<Vec<u8>, AssetError> {
    let bytes = assets.fetch(url).await?;
    image::ensure_image_bytes(&bytes)?;
    Ok(bytes)
}

/// Run the gateway refine call and normalize the result to raw bytes.
pub async fn refine_image(
    gateway: &dyn GenerationGateway,
    assets: &dyn AssetStore,
    prompt: &str,
    image_url: &str,
    strength: f32,
) -> Result<Vec<u8>, PipelineError> {
    let generated = gateway.refine_image(prompt, image_url, strength).await?;
    let bytes = image::normalize_image(assets, generated).await?;
    Ok(bytes)
}
