use serde::{Deserialize, Serialize};

/// Verdict of the NSFW capability. `score` is 1.0 for certainly safe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NsfwVerdict {
    #[serde(rename = "isSafe")]
    pub is_safe: bool,
    pub score: f32,
}

/// Sentiment scores. Values are independent and need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub positive: f32,
    pub negative: f32,
    pub neutral: f32,
}

impl Default for Sentiment {
    fn default() -> Self {
        Self {
            positive: 0.5,
            negative: 0.3,
            neutral: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrandSafety {
    pub nsfw: bool,
    pub violent: bool,
    pub sensitive: bool,
    pub score: f32,
}

/// Everything learned about one asset. Built by the aggregator, never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "faces")]
    pub face_count: usize,
    #[serde(rename = "objects")]
    pub object_labels: Vec<String>,
    #[serde(rename = "emotions")]
    pub emotion_labels: Vec<String>,
    #[serde(rename = "textDensity")]
    pub text_density: f32,
    #[serde(rename = "logoVisibility")]
    pub logo_visibility: f32,
    #[serde(rename = "colorHarmony")]
    pub color_harmony: f32,
    pub detected_text: Vec<String>,
    pub sentiment: Sentiment,
    pub brand_safety: BrandSafety,
}

impl FeatureRecord {
    /// The complete record used when an asset cannot be analyzed at all.
    pub fn fallback() -> Self {
        Self {
            face_count: 1,
            object_labels: vec!["person".to_string(), "object".to_string()],
            emotion_labels: vec!["neutral".to_string()],
            text_density: 0.2,
            logo_visibility: 0.5,
            color_harmony: 0.7,
            detected_text: Vec::new(),
            sentiment: Sentiment::default(),
            brand_safety: BrandSafety {
                nsfw: false,
                violent: false,
                sensitive: false,
                score: 0.9,
            },
        }
    }

    pub fn joined_text(&self) -> String {
        self.detected_text.join(" ")
    }
}

/// Results of the four independent first-stage capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOneOutput {
    pub objects: Vec<String>,
    pub nsfw: NsfwVerdict,
    pub detected_text: Vec<String>,
    pub face_count: usize,
}

/// Results of the text-dependent second stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTwoOutput {
    pub emotions: Vec<String>,
    pub sentiment: Sentiment,
}

impl Default for StageTwoOutput {
    fn default() -> Self {
        Self {
            emotions: vec!["neutral".to_string()],
            sentiment: Sentiment::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_record_serializes_every_key() {
        let value = serde_json::to_value(FeatureRecord::fallback()).unwrap();
        for key in [
            "faces",
            "objects",
            "emotions",
            "textDensity",
            "logoVisibility",
            "colorHarmony",
            "detected_text",
            "sentiment",
            "brand_safety",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(value["brand_safety"]["nsfw"], false);
        assert_eq!(value["objects"][0], "person");
    }

    #[test]
    fn default_sentiment_matches_fallback_values() {
        let sentiment = Sentiment::default();
        assert_eq!(
            (sentiment.positive, sentiment.negative, sentiment.neutral),
            (0.5, 0.3, 0.2)
        );
    }
}
