use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::models::{GeneratedImage, Palette};

/// Remote generation capability: image generation, image refinement and
/// palette generation against the third-party AI service.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, GatewayError>;

    async fn refine_image(
        &self,
        prompt: &str,
        image_url: &str,
        strength: f32,
    ) -> Result<GeneratedImage, GatewayError>;

    async fn generate_palettes(
        &self,
        prompt: &str,
        count: u32,
    ) -> Result<Vec<Palette>, GatewayError>;
}

pub struct HttpGenerationGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Deserialize)]
struct ImageResponse {
    url: Option<String>,
}

#[derive(Deserialize)]
struct PalettesResponse {
    palettes: Vec<Palette>,
}

impl HttpGenerationGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayError::Connection(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, body))
    }
}

fn classify_failure(status: StatusCode, body: String) -> GatewayError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return GatewayError::Auth;
    }
    GatewayError::Generation(format!("status {status}: {body}"))
}

// The service answers image endpoints with either the binary image itself or
// a JSON body pointing at a hosted URL.
async fn image_from_response(response: reqwest::Response) -> Result<GeneratedImage, GatewayError> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("image/") {
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Connection(err.to_string()))?;
        return Ok(GeneratedImage {
            bytes: Some(bytes.to_vec()),
            url: None,
        });
    }

    let body: ImageResponse = response
        .json()
        .await
        .map_err(|err| GatewayError::Generation(format!("unexpected response body: {err}")))?;
    match body.url {
        Some(url) => Ok(GeneratedImage {
            bytes: None,
            url: Some(url),
        }),
        None => Err(GatewayError::Generation(
            "response carried neither image bytes nor a url".to_string(),
        )),
    }
}

#[async_trait]
impl GenerationGateway for HttpGenerationGateway {
    async fn generate_image(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, GatewayError> {
        let response = self
            .post(
                "/v1/images/generations",
                json!({ "prompt": prompt, "width": width, "height": height }),
            )
            .await?;
        image_from_response(response).await
    }

    async fn refine_image(
        &self,
        prompt: &str,
        image_url: &str,
        strength: f32,
    ) -> Result<GeneratedImage, GatewayError> {
        let response = self
            .post(
                "/v1/images/refinements",
                json!({ "prompt": prompt, "image_url": image_url, "strength": strength }),
            )
            .await?;
        image_from_response(response).await
    }

    async fn generate_palettes(
        &self,
        prompt: &str,
        count: u32,
    ) -> Result<Vec<Palette>, GatewayError> {
        let response = self
            .post("/v1/palettes", json!({ "prompt": prompt, "count": count }))
            .await?;
        let body: PalettesResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::Generation(format!("unexpected response body: {err}")))?;
        Ok(body.palettes)
    }
}
