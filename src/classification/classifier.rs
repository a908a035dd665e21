use super::result::{ClassificationResult, ContentType};
use crate::analysis::FeatureRecord;
use crate::error::ClassificationError;
use tracing::{debug, error};

const AD_KEYWORDS: [&str; 6] = ["sale", "buy", "click", "now", "offer", "discount"];
const INFORMATIVE_EMOTIONS: [&str; 2] = ["calm", "serious"];
const UPBEAT_EMOTIONS: [&str; 3] = ["joy", "happy", "excited"];
const PROFESSIONAL_WORDS: [&str; 2] = ["professional", "business"];
const EDUCATIONAL_MIN_TOKENS: usize = 5;
const POSITIVE_SENTIMENT: f32 = 0.7;

/// Lowercased views of a record, computed once per classification.
struct Evidence<'a> {
    record: &'a FeatureRecord,
    text: String,
    objects: String,
}

impl<'a> Evidence<'a> {
    fn new(record: &'a FeatureRecord) -> Self {
        Self {
            record,
            text: record.joined_text().to_lowercase(),
            objects: record.object_labels.join(" ").to_lowercase(),
        }
    }

    fn has_emotion(&self, wanted: &[&str]) -> bool {
        self.record
            .emotion_labels
            .iter()
            .any(|emotion| wanted.contains(&emotion.as_str()))
    }
}

struct Rule {
    content_type: ContentType,
    confidence: f32,
    reasoning: &'static str,
    matches: fn(&Evidence) -> bool,
}

// Evaluated in order; the first match wins.
const RULES: [Rule; 5] = [
    Rule {
        content_type: ContentType::AdCopy,
        confidence: 0.9,
        reasoning: "Commercial keywords detected in text",
        matches: |e| AD_KEYWORDS.iter().any(|keyword| e.text.contains(keyword)),
    },
    Rule {
        content_type: ContentType::Meme,
        confidence: 0.8,
        reasoning: "Person with text overlay detected",
        matches: |e| {
            e.record.object_labels.iter().any(|label| label == "person")
                && !e.record.detected_text.is_empty()
        },
    },
    Rule {
        content_type: ContentType::Educational,
        confidence: 0.7,
        reasoning: "Substantial text content with informative tone",
        matches: |e| {
            e.record.detected_text.len() > EDUCATIONAL_MIN_TOKENS
                && e.has_emotion(&INFORMATIVE_EMOTIONS)
        },
    },
    Rule {
        content_type: ContentType::Entertainment,
        confidence: 0.8,
        reasoning: "Positive emotions and sentiment detected",
        matches: |e| {
            e.has_emotion(&UPBEAT_EMOTIONS) || e.record.sentiment.positive > POSITIVE_SENTIMENT
        },
    },
    Rule {
        content_type: ContentType::ProfessionalPost,
        confidence: 0.7,
        reasoning: "Professional elements detected",
        matches: |e| {
            e.objects.contains("logo")
                || e
                    .record
                    .detected_text
                    .iter()
                    .any(|token| PROFESSIONAL_WORDS.contains(&token.as_str()))
        },
    },
];

const DEFAULT_TYPE: ContentType = ContentType::Entertainment;
const DEFAULT_CONFIDENCE: f32 = 0.6;
const DEFAULT_REASONING: &str = "General content classification based on AI analysis";

/// Assigns a content type to a feature record with a fixed, ordered rule list.
pub struct ContentClassifier;

impl ContentClassifier {
    /// Never fails; records that cannot be evaluated get
    /// `ClassificationResult::fallback()`.
    pub fn classify(record: &FeatureRecord) -> ClassificationResult {
        match Self::try_classify(record) {
            Ok(result) => result,
            Err(e) => {
                error!("Content classification failed, using fallback: {}", e);
                ClassificationResult::fallback()
            }
        }
    }

    pub fn try_classify(record: &FeatureRecord) -> Result<ClassificationResult, ClassificationError> {
        validate(record)?;

        let evidence = Evidence::new(record);
        let result = match RULES.iter().find(|rule| (rule.matches)(&evidence)) {
            Some(rule) => ClassificationResult::new(rule.content_type, rule.confidence, rule.reasoning),
            None => ClassificationResult::new(DEFAULT_TYPE, DEFAULT_CONFIDENCE, DEFAULT_REASONING),
        };

        debug!(
            "Classified asset as {} ({:.2}): {}",
            result.content_type, result.confidence, result.reasoning
        );
        Ok(result)
    }
}

fn validate(record: &FeatureRecord) -> Result<(), ClassificationError> {
    let sentiment = &record.sentiment;
    for (field, value) in [
        ("sentiment.positive", sentiment.positive),
        ("sentiment.negative", sentiment.negative),
        ("sentiment.neutral", sentiment.neutral),
    ] {
        if !value.is_finite() {
            return Err(ClassificationError::NonFinite { field, value });
        }
    }
    Ok(())
}
