use futures::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::error::{AssetError, PipelineError};
use crate::models::{NewVariation, Palette};
use crate::stages::{image, palette};
use crate::storage::{AssetStore, StoredAsset};

pub fn image_key(user_id: Uuid, extension: &str) -> String {
    format!("{user_id}/{}.{extension}", Uuid::new_v4())
}

pub async fn store_base_image(
    assets: &dyn AssetStore,
    user_id: Uuid,
    bytes: Vec<u8>,
) -> Result<StoredAsset, AssetError> {
    let content_type = image::content_type(&bytes);
    let key = image_key(user_id, image::extension(content_type));
    assets.store(bytes, &key, content_type, &[]).await
}

/// Render and store one variation per palette. Rendering is fanned out with
/// bounded parallelism; results keep the palette order.
pub async fn store_variations(
    assets: &dyn AssetStore,
    user_id: Uuid,
    base: &[u8],
    palettes: Vec<Palette>,
    concurrency: usize,
) -> Result<Vec<NewVariation>, PipelineError> {
    stream::iter(palettes.into_iter().map(|entry| async move {
        let rendered = palette::apply_palette(base, &entry.colors).await?;
        let key = image_key(user_id, "png");
        let stored = assets.store(rendered, &key, "image/png", &[]).await?;
        Ok::<NewVariation, PipelineError>(NewVariation {
            palette_name: entry.name,
            colors: entry.colors,
            description: entry.description,
            image_path: stored.path,
            image_url: stored.url,
        })
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await
}
