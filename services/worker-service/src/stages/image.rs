use image::ImageFormat;

use crate::error::AssetError;
use crate::models::GeneratedImage;
use crate::storage::AssetStore;

/// Turn a gateway result into validated raw image bytes, downloading when the
/// service answered with a URL instead of an inline body.
pub async fn normalize_image(
    assets: &dyn AssetStore,
    generated: GeneratedImage,
) -> Result<Vec<u8>, AssetError> {
    let bytes = match (generated.bytes, generated.url) {
        (Some(bytes), _) => bytes,
        (None, Some(url)) => assets.fetch(&url).await?,
        (None, None) => {
            return Err(AssetError::InvalidImage(
                "generation result carried neither bytes nor a url".to_string(),
            ))
        }
    };
    ensure_image_bytes(&bytes)?;
    Ok(bytes)
}

pub fn ensure_image_bytes(bytes: &[u8]) -> Result<(), AssetError> {
    if bytes.is_empty() {
        return Err(AssetError::InvalidImage("empty image payload".to_string()));
    }
    image::guess_format(bytes)
        .map_err(|_| AssetError::InvalidImage("unrecognized image format".to_string()))?;
    Ok(())
}

pub fn content_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        _ => "application/octet-stream",
    }
}

pub fn extension(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        _ => "png",
    }
}
