use crate::error::AppError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "ASSET_INSIGHT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub max_concurrent_analyses: usize,
    pub analysis: AnalysisSettings,
    pub perception: PerceptionSettings,
    pub inference: InferenceSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub worker_pool_size: usize,
}

/// Normalization rules and limits applied by the perception gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerceptionSettings {
    /// No timeout when absent.
    pub timeout_ms: Option<u64>,
    pub object_confidence_threshold: f32,
    pub max_object_labels: usize,
    pub max_text_tokens: usize,
    pub min_token_length: usize,
    pub max_emotion_labels: usize,
    pub face: FaceDetectionSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaceDetectionSettings {
    pub scale_factor: f32,
    pub min_neighbors: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_concurrent_analyses: 8,
            analysis: AnalysisSettings::default(),
            perception: PerceptionSettings::default(),
            inference: InferenceSettings::default(),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
        }
    }
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            object_confidence_threshold: 0.5,
            max_object_labels: 10,
            max_text_tokens: 10,
            min_token_length: 3,
            max_emotion_labels: 3,
            face: FaceDetectionSettings::default(),
        }
    }
}

impl Default for FaceDetectionSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
        }
    }
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl PerceptionSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl InferenceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Settings {
    /// Loads settings from an optional file, then overlays `ASSET_INSIGHT_*`
    /// environment variables (`__` separates nested keys).
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate().map_err(AppError::Config)?;
        Ok(settings)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_analyses == 0 {
            return Err("Max concurrent analyses must be greater than 0".to_string());
        }

        if self.analysis.worker_pool_size == 0 {
            return Err("Worker pool size must be greater than 0".to_string());
        }

        let threshold = self.perception.object_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err("Object confidence threshold must be between 0.0 and 1.0".to_string());
        }

        if self.perception.face.scale_factor <= 1.0 {
            return Err("Face scale factor must be greater than 1.0".to_string());
        }

        if self.inference.base_url.trim().is_empty() {
            return Err("Inference base URL must not be empty".to_string());
        }

        Ok(())
    }
}
