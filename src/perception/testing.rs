//! In-memory capabilities for tests.
use super::capability::{
    Capabilities, CascadeParams, EmotionClassifier, FaceDetector, FaceRegion, NsfwClassifier,
    ObjectDetector, ScoredLabel, SentimentClassifier, TextRecognizer,
};
use crate::error::CapabilityError;
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend returning canned outputs and recording every text it was asked to
/// classify.
#[derive(Default)]
pub struct StubBackend {
    pub detections: Vec<ScoredLabel>,
    pub nsfw: Vec<ScoredLabel>,
    pub text: String,
    pub faces: usize,
    pub emotions: Vec<ScoredLabel>,
    pub sentiment: Vec<ScoredLabel>,
    pub delay: Option<Duration>,
    pub emotion_calls: Mutex<Vec<String>>,
    pub sentiment_calls: Mutex<Vec<String>>,
    pub face_params: Mutex<Vec<CascadeParams>>,
}

impl StubBackend {
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_detections(mut self, detections: &[(&str, f32)]) -> Self {
        self.detections = labels(detections);
        self
    }

    pub fn with_sentiment(mut self, sentiment: &[(&str, f32)]) -> Self {
        self.sentiment = labels(sentiment);
        self
    }

    pub fn with_emotions(mut self, emotions: &[(&str, f32)]) -> Self {
        self.emotions = labels(emotions);
        self
    }

    pub fn with_nsfw(mut self, nsfw: &[(&str, f32)]) -> Self {
        self.nsfw = labels(nsfw);
        self
    }

    pub fn with_faces(mut self, faces: usize) -> Self {
        self.faces = faces;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn emotion_calls(&self) -> Vec<String> {
        self.emotion_calls.lock().unwrap().clone()
    }

    pub fn sentiment_calls(&self) -> Vec<String> {
        self.sentiment_calls.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn labels(pairs: &[(&str, f32)]) -> Vec<ScoredLabel> {
    pairs
        .iter()
        .map(|(label, score)| ScoredLabel::new(*label, *score))
        .collect()
}

#[async_trait]
impl ObjectDetector for StubBackend {
    async fn detect(&self, _image: &[u8]) -> Result<Vec<ScoredLabel>, CapabilityError> {
        self.pause().await;
        Ok(self.detections.clone())
    }
}

#[async_trait]
impl NsfwClassifier for StubBackend {
    async fn classify(&self, _image: &[u8]) -> Result<Vec<ScoredLabel>, CapabilityError> {
        self.pause().await;
        Ok(self.nsfw.clone())
    }
}

#[async_trait]
impl TextRecognizer for StubBackend {
    async fn recognize(&self, _image: &[u8]) -> Result<String, CapabilityError> {
        self.pause().await;
        Ok(self.text.clone())
    }
}

#[async_trait]
impl FaceDetector for StubBackend {
    async fn detect_faces(
        &self,
        _gray: &GrayImage,
        params: CascadeParams,
    ) -> Result<Vec<FaceRegion>, CapabilityError> {
        self.pause().await;
        self.face_params.lock().unwrap().push(params);
        Ok((0..self.faces as u32)
            .map(|i| FaceRegion {
                x: i * 10,
                y: 0,
                width: 10,
                height: 10,
            })
            .collect())
    }
}

#[async_trait]
impl EmotionClassifier for StubBackend {
    async fn classify(&self, text: &str) -> Result<Vec<ScoredLabel>, CapabilityError> {
        self.emotion_calls.lock().unwrap().push(text.to_string());
        Ok(self.emotions.clone())
    }
}

#[async_trait]
impl SentimentClassifier for StubBackend {
    async fn classify(&self, text: &str) -> Result<Vec<ScoredLabel>, CapabilityError> {
        self.sentiment_calls.lock().unwrap().push(text.to_string());
        Ok(self.sentiment.clone())
    }
}

/// Backend where every capability fails.
pub struct FailingBackend;

fn failure() -> CapabilityError {
    CapabilityError::Inference("model crashed".to_string())
}

#[async_trait]
impl ObjectDetector for FailingBackend {
    async fn detect(&self, _image: &[u8]) -> Result<Vec<ScoredLabel>, CapabilityError> {
        Err(failure())
    }
}

#[async_trait]
impl NsfwClassifier for FailingBackend {
    async fn classify(&self, _image: &[u8]) -> Result<Vec<ScoredLabel>, CapabilityError> {
        Err(failure())
    }
}

#[async_trait]
impl TextRecognizer for FailingBackend {
    async fn recognize(&self, _image: &[u8]) -> Result<String, CapabilityError> {
        Err(failure())
    }
}

#[async_trait]
impl FaceDetector for FailingBackend {
    async fn detect_faces(
        &self,
        _gray: &GrayImage,
        _params: CascadeParams,
    ) -> Result<Vec<FaceRegion>, CapabilityError> {
        Err(failure())
    }
}

#[async_trait]
impl EmotionClassifier for FailingBackend {
    async fn classify(&self, _text: &str) -> Result<Vec<ScoredLabel>, CapabilityError> {
        Err(failure())
    }
}

#[async_trait]
impl SentimentClassifier for FailingBackend {
    async fn classify(&self, _text: &str) -> Result<Vec<ScoredLabel>, CapabilityError> {
        Err(failure())
    }
}

pub fn stub_capabilities(backend: Arc<StubBackend>) -> Capabilities {
    Capabilities::from_backend(backend)
}

pub fn failing_capabilities() -> Capabilities {
    Capabilities::from_backend(Arc::new(FailingBackend))
}

pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(
        width,
        height,
        Rgb(color),
    ))
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
