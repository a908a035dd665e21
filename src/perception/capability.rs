//! Contracts for the external perception capabilities.
//!
//! Implementations report failures as `CapabilityError`; deciding what to do
//! about a failure belongs to the `PerceptionGateway`.
use crate::error::CapabilityError;
use async_trait::async_trait;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A label with the raw confidence reported by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLabel {
    pub label: String,
    pub score: f32,
}

impl ScoredLabel {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Rectangle reported by a face detector, in grayscale image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Parameters for the frontal-face cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f32,
    pub min_neighbors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ObjectDetection,
    NsfwDetection,
    TextExtraction,
    FaceCounting,
    EmotionClassification,
    SentimentClassification,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::ObjectDetection => "object_detection",
            Capability::NsfwDetection => "nsfw_detection",
            Capability::TextExtraction => "text_extraction",
            Capability::FaceCounting => "face_counting",
            Capability::EmotionClassification => "emotion_classification",
            Capability::SentimentClassification => "sentiment_classification",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Every detection the model produced, in any order.
    async fn detect(&self, image: &[u8]) -> Result<Vec<ScoredLabel>, CapabilityError>;
}

#[async_trait]
pub trait NsfwClassifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<Vec<ScoredLabel>, CapabilityError>;
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Raw recognized text, untokenized.
    async fn recognize(&self, image: &[u8]) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect_faces(
        &self,
        gray: &GrayImage,
        params: CascadeParams,
    ) -> Result<Vec<FaceRegion>, CapabilityError>;
}

#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<ScoredLabel>, CapabilityError>;
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<ScoredLabel>, CapabilityError>;
}

/// The full set of capabilities, loaded once and shared read-only by every
/// request.
#[derive(Clone)]
pub struct Capabilities {
    pub objects: Arc<dyn ObjectDetector>,
    pub nsfw: Arc<dyn NsfwClassifier>,
    pub text: Arc<dyn TextRecognizer>,
    pub faces: Arc<dyn FaceDetector>,
    pub emotion: Arc<dyn EmotionClassifier>,
    pub sentiment: Arc<dyn SentimentClassifier>,
}

impl Capabilities {
    /// Bundle where a single backend serves every capability.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ObjectDetector
            + NsfwClassifier
            + TextRecognizer
            + FaceDetector
            + EmotionClassifier
            + SentimentClassifier
            + 'static,
    {
        Self {
            objects: backend.clone(),
            nsfw: backend.clone(),
            text: backend.clone(),
            faces: backend.clone(),
            emotion: backend.clone(),
            sentiment: backend,
        }
    }
}
