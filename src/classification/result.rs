use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "Ad Copy")]
    AdCopy,
    Meme,
    Educational,
    Entertainment,
    #[serde(rename = "Professional Post")]
    ProfessionalPost,
}

impl ContentType {
    pub fn name(&self) -> &'static str {
        match self {
            ContentType::AdCopy => "Ad Copy",
            ContentType::Meme => "Meme",
            ContentType::Educational => "Educational",
            ContentType::Entertainment => "Entertainment",
            ContentType::ProfessionalPost => "Professional Post",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub confidence: f32,
    pub reasoning: String,
}

impl ClassificationResult {
    pub fn new(content_type: ContentType, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            content_type,
            confidence,
            reasoning: reasoning.into(),
        }
    }

    /// Returned when the rules themselves could not be evaluated.
    pub fn fallback() -> Self {
        Self::new(ContentType::Entertainment, 0.5, "Fallback classification")
    }
}
