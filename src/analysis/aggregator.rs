use super::record::{BrandSafety, FeatureRecord, Sentiment, StageOneOutput, StageTwoOutput};
use crate::error::AggregationError;

const MAX_OBJECT_LABELS: usize = 5;
const MAX_EMOTION_LABELS: usize = 3;
const MAX_DETECTED_TEXT: usize = 10;
const VIOLENCE_TERMS: [&str; 4] = ["weapon", "gun", "knife", "violence"];
const LOGO_VISIBLE: f32 = 0.8;
const LOGO_HIDDEN: f32 = 0.3;
const SENSITIVE_NEGATIVITY: f32 = 0.7;

/// Merges stage outputs into a `FeatureRecord` and derives the secondary
/// metrics. Pure: no I/O, no logging.
pub struct FeatureAggregator;

impl FeatureAggregator {
    pub fn aggregate(
        stage_one: StageOneOutput,
        stage_two: StageTwoOutput,
        color_harmony: f32,
    ) -> Result<FeatureRecord, AggregationError> {
        unit_interval("nsfw score", stage_one.nsfw.score)?;
        unit_interval("color harmony", color_harmony)?;
        finite_sentiment(&stage_two.sentiment)?;

        // Derived fields look at every detected object, not just the ones kept.
        let logo_visibility = if any_label_contains(&stage_one.objects, &["logo"]) {
            LOGO_VISIBLE
        } else {
            LOGO_HIDDEN
        };

        let brand_safety = BrandSafety {
            nsfw: !stage_one.nsfw.is_safe,
            violent: any_label_contains(&stage_one.objects, &VIOLENCE_TERMS),
            sensitive: stage_two.sentiment.negative > SENSITIVE_NEGATIVITY,
            score: stage_one.nsfw.score,
        };

        let mut detected_text = stage_one.detected_text;
        detected_text.truncate(MAX_DETECTED_TEXT);
        let mut object_labels = stage_one.objects;
        object_labels.truncate(MAX_OBJECT_LABELS);
        let mut emotion_labels = stage_two.emotions;
        emotion_labels.truncate(MAX_EMOTION_LABELS);

        Ok(FeatureRecord {
            face_count: stage_one.face_count,
            object_labels,
            emotion_labels,
            text_density: text_density(detected_text.len()),
            logo_visibility,
            color_harmony,
            detected_text,
            sentiment: stage_two.sentiment,
            brand_safety,
        })
    }
}

pub fn text_density(tokens: usize) -> f32 {
    (tokens as f32 / 10.0).min(1.0)
}

fn any_label_contains(labels: &[String], terms: &[&str]) -> bool {
    labels.iter().any(|label| {
        let label = label.to_lowercase();
        terms.iter().any(|term| label.contains(term))
    })
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), AggregationError> {
    if !value.is_finite() {
        return Err(AggregationError::NonFinite { field, value });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(AggregationError::OutOfRange { field, value });
    }
    Ok(())
}

fn finite_sentiment(sentiment: &Sentiment) -> Result<(), AggregationError> {
    for (field, value) in [
        ("sentiment.positive", sentiment.positive),
        ("sentiment.negative", sentiment.negative),
        ("sentiment.neutral", sentiment.neutral),
    ] {
        if !value.is_finite() {
            return Err(AggregationError::NonFinite { field, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::record::NsfwVerdict;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn stage_one(objects: &[&str], text: &[&str]) -> StageOneOutput {
        StageOneOutput {
            objects: words(objects),
            nsfw: NsfwVerdict {
                is_safe: true,
                score: 0.95,
            },
            detected_text: words(text),
            face_count: 2,
        }
    }

    #[test]
    fn text_density_scales_and_saturates() {
        for n in 0..10 {
            assert_eq!(text_density(n), n as f32 / 10.0);
        }
        assert_eq!(text_density(10), 1.0);
        assert_eq!(text_density(25), 1.0);
    }

    #[test]
    fn weapon_label_marks_violent() {
        let record = FeatureAggregator::aggregate(
            stage_one(&["weapon"], &[]),
            StageTwoOutput::default(),
            0.8,
        )
        .unwrap();
        assert!(record.brand_safety.violent);

        let record = FeatureAggregator::aggregate(
            stage_one(&["person", "product"], &[]),
            StageTwoOutput::default(),
            0.8,
        )
        .unwrap();
        assert!(!record.brand_safety.violent);
    }

    #[test]
    fn violence_terms_match_by_substring_ignoring_case() {
        let record = FeatureAggregator::aggregate(
            stage_one(&["Handgun"], &[]),
            StageTwoOutput::default(),
            0.8,
        )
        .unwrap();
        assert!(record.brand_safety.violent);
    }

    #[test]
    fn logo_visibility_checks_every_detected_object() {
        let objects = ["person", "car", "tree", "dog", "cat", "Brand Logo"];
        let record =
            FeatureAggregator::aggregate(stage_one(&objects, &[]), StageTwoOutput::default(), 0.8)
                .unwrap();
        assert_eq!(record.logo_visibility, 0.8);
        assert_eq!(record.object_labels.len(), 5);
        assert!(!record.object_labels.contains(&"Brand Logo".to_string()));

        let record = FeatureAggregator::aggregate(
            stage_one(&["person"], &[]),
            StageTwoOutput::default(),
            0.8,
        )
        .unwrap();
        assert_eq!(record.logo_visibility, 0.3);
    }

    #[test]
    fn nsfw_and_sentiment_drive_brand_safety() {
        let mut one = stage_one(&[], &["hello"]);
        one.nsfw = NsfwVerdict {
            is_safe: false,
            score: 0.2,
        };
        let two = StageTwoOutput {
            emotions: words(&["anger"]),
            sentiment: Sentiment {
                positive: 0.1,
                negative: 0.75,
                neutral: 0.15,
            },
        };

        let record = FeatureAggregator::aggregate(one, two, 0.8).unwrap();
        assert!(record.brand_safety.nsfw);
        assert!(record.brand_safety.sensitive);
        assert_eq!(record.brand_safety.score, 0.2);
        assert_eq!(record.text_density, 0.1);
        assert_eq!(record.face_count, 2);
    }

    #[test]
    fn emotions_are_capped_at_three() {
        let two = StageTwoOutput {
            emotions: words(&["joy", "surprise", "fear", "anger"]),
            sentiment: Sentiment::default(),
        };
        let record = FeatureAggregator::aggregate(stage_one(&[], &[]), two, 0.8).unwrap();
        assert_eq!(record.emotion_labels, words(&["joy", "surprise", "fear"]));
    }

    #[test]
    fn rejects_non_finite_inputs() {
        let two = StageTwoOutput {
            emotions: Vec::new(),
            sentiment: Sentiment {
                positive: f32::NAN,
                negative: 0.0,
                neutral: 0.0,
            },
        };
        let result = FeatureAggregator::aggregate(stage_one(&[], &[]), two, 0.8);
        assert!(matches!(result, Err(AggregationError::NonFinite { .. })));

        let result =
            FeatureAggregator::aggregate(stage_one(&[], &[]), StageTwoOutput::default(), 1.5);
        assert!(matches!(result, Err(AggregationError::OutOfRange { .. })));
    }
}
