use super::capability::{
    Capabilities, CascadeParams, EmotionClassifier, FaceDetector, FaceRegion, NsfwClassifier,
    ObjectDetector, ScoredLabel, SentimentClassifier, TextRecognizer,
};
use super::host::CapabilityLoader;
use crate::config::InferenceSettings;
use crate::error::CapabilityError;
use async_trait::async_trait;
use image::{GrayImage, ImageFormat};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Deserialize)]
struct DetectionsResponse {
    detections: Vec<ScoredLabel>,
}

#[derive(Deserialize)]
struct LabelsResponse {
    labels: Vec<ScoredLabel>,
}

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

#[derive(Deserialize)]
struct FacesResponse {
    faces: Vec<FaceRegion>,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

/// Serves every capability from an inference server speaking JSON over HTTP.
pub struct RemoteBackend {
    client: Client,
    base_url: String,
}

impl RemoteBackend {
    pub fn new(settings: &InferenceSettings) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| CapabilityError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<(), CapabilityError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CapabilityError::Unavailable(format!(
                "inference server health check returned {}",
                response.status()
            )))
        }
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, CapabilityError> {
        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Inference(format!("{}: {}", status, body)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| CapabilityError::MalformedResponse(e.to_string()))
    }

    async fn post_image<R: DeserializeOwned>(
        &self,
        path: &str,
        image: &[u8],
    ) -> Result<R, CapabilityError> {
        debug!("POST {} ({} bytes)", path, image.len());
        let request = self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec());
        self.send(request).await
    }

    async fn post_text<R: DeserializeOwned>(&self, path: &str, text: &str) -> Result<R, CapabilityError> {
        debug!("POST {} ({} chars)", path, text.len());
        let request = self.client.post(self.url(path)).json(&TextRequest { text });
        self.send(request).await
    }
}

#[async_trait]
impl ObjectDetector for RemoteBackend {
    async fn detect(&self, image: &[u8]) -> Result<Vec<ScoredLabel>, CapabilityError> {
        let response: DetectionsResponse = self.post_image("/v1/objects", image).await?;
        Ok(response.detections)
    }
}

#[async_trait]
impl NsfwClassifier for RemoteBackend {
    async fn classify(&self, image: &[u8]) -> Result<Vec<ScoredLabel>, CapabilityError> {
        let response: LabelsResponse = self.post_image("/v1/nsfw", image).await?;
        Ok(response.labels)
    }
}

#[async_trait]
impl TextRecognizer for RemoteBackend {
    async fn recognize(&self, image: &[u8]) -> Result<String, CapabilityError> {
        let response: TextResponse = self.post_image("/v1/ocr", image).await?;
        Ok(response.text)
    }
}

#[async_trait]
impl FaceDetector for RemoteBackend {
    async fn detect_faces(
        &self,
        gray: &GrayImage,
        params: CascadeParams,
    ) -> Result<Vec<FaceRegion>, CapabilityError> {
        let mut png = Vec::new();
        gray.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| CapabilityError::Decode(e.to_string()))?;

        let request = self
            .client
            .post(self.url("/v1/faces"))
            .query(&[
                ("scale_factor", params.scale_factor.to_string()),
                ("min_neighbors", params.min_neighbors.to_string()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(png);
        let response: FacesResponse = self.send(request).await?;
        Ok(response.faces)
    }
}

#[async_trait]
impl EmotionClassifier for RemoteBackend {
    async fn classify(&self, text: &str) -> Result<Vec<ScoredLabel>, CapabilityError> {
        let response: LabelsResponse = self.post_text("/v1/emotion", text).await?;
        Ok(response.labels)
    }
}

#[async_trait]
impl SentimentClassifier for RemoteBackend {
    async fn classify(&self, text: &str) -> Result<Vec<ScoredLabel>, CapabilityError> {
        let response: LabelsResponse = self.post_text("/v1/sentiment", text).await?;
        Ok(response.labels)
    }
}

/// Connects to the inference server once it answers its health check.
pub struct RemoteLoader {
    settings: InferenceSettings,
}

impl RemoteLoader {
    pub fn new(settings: InferenceSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl CapabilityLoader for RemoteLoader {
    async fn load(&self) -> Result<Capabilities, CapabilityError> {
        let backend = RemoteBackend::new(&self.settings)?;
        backend.health().await?;
        info!("Inference server reachable at {}", self.settings.base_url);
        Ok(Capabilities::from_backend(Arc::new(backend)))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
