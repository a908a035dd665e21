use super::capability::{Capabilities, Capability, CascadeParams, ScoredLabel};
use super::host::CapabilityHost;
use crate::analysis::record::{NsfwVerdict, Sentiment};
use crate::config::PerceptionSettings;
use crate::error::CapabilityError;
use image::DynamicImage;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const FALLBACK_OBJECTS: [&str; 2] = ["person", "object"];
pub const FALLBACK_EMOTIONS: [&str; 1] = ["neutral"];
pub const FALLBACK_FACE_COUNT: usize = 1;
pub const FALLBACK_NSFW: NsfwVerdict = NsfwVerdict {
    is_safe: true,
    score: 0.9,
};

/// Outcome of one capability call. Both variants carry a usable value.
#[derive(Debug, Clone, PartialEq)]
pub enum PerceptionResult<T> {
    Ok(T),
    Fallback(T),
}

impl<T> PerceptionResult<T> {
    pub fn into_inner(self) -> T {
        match self {
            PerceptionResult::Ok(value) | PerceptionResult::Fallback(value) => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            PerceptionResult::Ok(value) | PerceptionResult::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PerceptionResult::Fallback(_))
    }
}

/// Single entry point to the perception capabilities.
///
/// Every call returns a value: when the capability (or loading it) fails or
/// exceeds the configured timeout, the capability's fallback is substituted
/// and the failure is logged. Outputs are normalized to the limits in
/// `PerceptionSettings`.
pub struct PerceptionGateway {
    host: Arc<CapabilityHost>,
    settings: PerceptionSettings,
}

impl PerceptionGateway {
    pub fn new(host: Arc<CapabilityHost>, settings: PerceptionSettings) -> Self {
        Self { host, settings }
    }

    pub fn settings(&self) -> &PerceptionSettings {
        &self.settings
    }

    /// Labels with confidence at or above the threshold, most confident
    /// first, truncated to `max_object_labels`.
    pub async fn detect_objects(&self, image: &[u8]) -> PerceptionResult<Vec<String>> {
        let threshold = self.settings.object_confidence_threshold;
        let limit = self.settings.max_object_labels;

        self.invoke(
            Capability::ObjectDetection,
            || FALLBACK_OBJECTS.iter().map(|s| s.to_string()).collect(),
            |caps| async move {
                let detections = caps.objects.detect(image).await?;
                Ok(confident_labels(detections, threshold, limit))
            },
        )
        .await
    }

    pub async fn detect_nsfw(&self, image: &[u8]) -> PerceptionResult<NsfwVerdict> {
        self.invoke(
            Capability::NsfwDetection,
            || FALLBACK_NSFW,
            |caps| async move {
                let scores = caps.nsfw.classify(image).await?;
                nsfw_verdict(&scores)
            },
        )
        .await
    }

    /// Whitespace tokens longer than the minimum, first `max_text_tokens`.
    pub async fn extract_text(&self, image: &[u8]) -> PerceptionResult<Vec<String>> {
        let min_len = self.settings.min_token_length;
        let limit = self.settings.max_text_tokens;

        self.invoke(
            Capability::TextExtraction,
            Vec::new,
            |caps| async move {
                let text = caps.text.recognize(image).await?;
                Ok(tokenize(&text, min_len, limit))
            },
        )
        .await
    }

    pub async fn count_faces(&self, image: Arc<DynamicImage>) -> PerceptionResult<usize> {
        let params = CascadeParams {
            scale_factor: self.settings.face.scale_factor,
            min_neighbors: self.settings.face.min_neighbors,
        };

        self.invoke(
            Capability::FaceCounting,
            || FALLBACK_FACE_COUNT,
            |caps| async move {
                let gray = tokio::task::spawn_blocking(move || image.to_luma8())
                    .await
                    .map_err(|e| CapabilityError::Decode(e.to_string()))?;
                let faces = caps.faces.detect_faces(&gray, params).await?;
                Ok(faces.len())
            },
        )
        .await
    }

    pub async fn classify_emotion(&self, text: &str) -> PerceptionResult<Vec<String>> {
        if text.trim().is_empty() {
            return PerceptionResult::Fallback(fallback_emotions());
        }
        let limit = self.settings.max_emotion_labels;

        self.invoke(
            Capability::EmotionClassification,
            fallback_emotions,
            |caps| async move {
                let scores = caps.emotion.classify(text).await?;
                Ok(scores.into_iter().take(limit).map(|s| s.label).collect())
            },
        )
        .await
    }

    pub async fn classify_sentiment(&self, text: &str) -> PerceptionResult<Sentiment> {
        if text.trim().is_empty() {
            return PerceptionResult::Fallback(Sentiment::default());
        }

        self.invoke(
            Capability::SentimentClassification,
            Sentiment::default,
            |caps| async move {
                let scores = caps.sentiment.classify(text).await?;
                sentiment_from_labels(&scores)
            },
        )
        .await
    }

    async fn invoke<'a, T, F, Fut>(
        &'a self,
        capability: Capability,
        fallback: impl FnOnce() -> T,
        call: F,
    ) -> PerceptionResult<T>
    where
        F: FnOnce(&'a Capabilities) -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>> + 'a,
    {
        let start = Instant::now();
        let result = match self.host.capabilities().await {
            Ok(caps) => self.bounded(call(caps)).await,
            Err(e) => Err(e),
        };
        let duration_us = start.elapsed().as_micros() as u64;

        match result {
            Ok(value) => {
                debug!("{} completed in {}us", capability, duration_us);
                PerceptionResult::Ok(value)
            }
            Err(e) => {
                warn!(
                    capability = capability.name(),
                    "{} failed after {}us, using fallback: {}", capability, duration_us, e
                );
                PerceptionResult::Fallback(fallback())
            }
        }
    }

    async fn bounded<T, Fut>(&self, call: Fut) -> Result<T, CapabilityError>
    where
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        match self.settings.timeout() {
            Some(limit) => timeout_or_error(limit, call).await,
            None => call.await,
        }
    }
}

async fn timeout_or_error<T, Fut>(limit: Duration, call: Fut) -> Result<T, CapabilityError>
where
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(CapabilityError::Timeout(limit)))
}

fn fallback_emotions() -> Vec<String> {
    FALLBACK_EMOTIONS.iter().map(|s| s.to_string()).collect()
}

fn confident_labels(mut detections: Vec<ScoredLabel>, threshold: f32, limit: usize) -> Vec<String> {
    detections.retain(|d| d.score >= threshold);
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    detections.into_iter().take(limit).map(|d| d.label).collect()
}

fn nsfw_verdict(scores: &[ScoredLabel]) -> Result<NsfwVerdict, CapabilityError> {
    let nsfw_score = scores
        .iter()
        .find(|s| s.label.eq_ignore_ascii_case("nsfw"))
        .map(|s| s.score)
        .unwrap_or(0.0);

    if !nsfw_score.is_finite() || !(0.0..=1.0).contains(&nsfw_score) {
        return Err(CapabilityError::MalformedResponse(format!(
            "nsfw score {} outside [0, 1]",
            nsfw_score
        )));
    }

    Ok(NsfwVerdict {
        is_safe: nsfw_score < 0.5,
        score: 1.0 - nsfw_score,
    })
}

fn tokenize(text: &str, min_len: usize, limit: usize) -> Vec<String> {
    text.split_whitespace()
        .filter(|word| word.chars().count() >= min_len)
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn sentiment_from_labels(scores: &[ScoredLabel]) -> Result<Sentiment, CapabilityError> {
    let mut sentiment = Sentiment {
        positive: 0.0,
        negative: 0.0,
        neutral: 0.0,
    };

    for scored in scores {
        if !scored.score.is_finite() {
            return Err(CapabilityError::MalformedResponse(format!(
                "sentiment score for '{}' is not finite",
                scored.label
            )));
        }
        let label = scored.label.to_lowercase();
        if label.contains("pos") {
            sentiment.positive = scored.score;
        } else if label.contains("neg") {
            sentiment.negative = scored.score;
        } else {
            sentiment.neutral = scored.score;
        }
    }

    Ok(sentiment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::testing::{
        failing_capabilities, labels, solid_image, stub_capabilities, StubBackend,
    };

    fn gateway_with(backend: StubBackend) -> (PerceptionGateway, Arc<StubBackend>) {
        let backend = Arc::new(backend);
        let host = CapabilityHost::preloaded(stub_capabilities(backend.clone()));
        (
            PerceptionGateway::new(Arc::new(host), PerceptionSettings::default()),
            backend,
        )
    }

    fn failing_gateway() -> PerceptionGateway {
        let host = CapabilityHost::preloaded(failing_capabilities());
        PerceptionGateway::new(Arc::new(host), PerceptionSettings::default())
    }

    #[test]
    fn confident_labels_filters_sorts_and_truncates() {
        let mut detections = labels(&[("dog", 0.6), ("cat", 0.3), ("person", 0.99)]);
        for i in 0..12 {
            detections.push(ScoredLabel::new(format!("thing{}", i), 0.7));
        }

        let result = confident_labels(detections, 0.5, 10);
        assert_eq!(result.len(), 10);
        assert_eq!(result[0], "person");
        assert!(!result.contains(&"cat".to_string()));
        assert!(!result.contains(&"dog".to_string()));
    }

    #[test]
    fn confidence_threshold_is_inclusive() {
        let result = confident_labels(labels(&[("edge", 0.5), ("below", 0.49)]), 0.5, 10);
        assert_eq!(result, vec!["edge".to_string()]);
    }

    #[test]
    fn tokenize_drops_short_words_and_truncates() {
        let text = "a an the quick brown fox jumps over lazy dogs and cats run far away today";
        let tokens = tokenize(text, 3, 10);
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[0], "the");
        assert!(tokens.iter().all(|t| t.len() > 2));
    }

    #[test]
    fn nsfw_verdict_uses_nsfw_label() {
        let verdict = nsfw_verdict(&labels(&[("normal", 0.2), ("NSFW", 0.8)])).unwrap();
        assert!(!verdict.is_safe);
        assert!((verdict.score - 0.2).abs() < 1e-6);

        let verdict = nsfw_verdict(&labels(&[("normal", 0.99)])).unwrap();
        assert!(verdict.is_safe);
        assert_eq!(verdict.score, 1.0);
    }

    #[test]
    fn nsfw_scores_outside_unit_interval_are_malformed() {
        for score in [1.0000001, -0.1, f32::NAN] {
            let result = nsfw_verdict(&labels(&[("nsfw", score)]));
            assert!(matches!(result, Err(CapabilityError::MalformedResponse(_))));
        }
    }

    #[test]
    fn non_finite_sentiment_is_malformed() {
        let result = sentiment_from_labels(&labels(&[("positive", f32::INFINITY)]));
        assert!(matches!(result, Err(CapabilityError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn out_of_range_nsfw_score_falls_back_for_that_capability_only() {
        let (gateway, _) = gateway_with(
            StubBackend::default()
                .with_nsfw(&[("nsfw", 1.0000001)])
                .with_detections(&[("logo", 0.9)]),
        );

        let nsfw = gateway.detect_nsfw(b"img").await;
        assert!(nsfw.is_fallback());
        assert_eq!(nsfw.into_inner(), FALLBACK_NSFW);

        let objects = gateway.detect_objects(b"img").await;
        assert!(!objects.is_fallback());
        assert_eq!(objects.into_inner(), vec!["logo"]);
    }

    #[test]
    fn sentiment_labels_are_mapped_by_substring() {
        let sentiment =
            sentiment_from_labels(&labels(&[("Positive", 0.7), ("negative", 0.2), ("other", 0.1)]))
                .unwrap();
        assert_eq!(sentiment.positive, 0.7);
        assert_eq!(sentiment.negative, 0.2);
        assert_eq!(sentiment.neutral, 0.1);
    }

    #[tokio::test]
    async fn failing_capabilities_yield_documented_fallbacks() {
        let gateway = failing_gateway();
        let image = Arc::new(solid_image(8, 8, [10, 20, 30]));

        let objects = gateway.detect_objects(b"img").await;
        assert!(objects.is_fallback());
        assert_eq!(objects.into_inner(), vec!["person", "object"]);

        let nsfw = gateway.detect_nsfw(b"img").await;
        assert_eq!(nsfw, PerceptionResult::Fallback(FALLBACK_NSFW));

        let text = gateway.extract_text(b"img").await;
        assert_eq!(text, PerceptionResult::Fallback(Vec::new()));

        let faces = gateway.count_faces(image).await;
        assert_eq!(faces, PerceptionResult::Fallback(1));

        let emotions = gateway.classify_emotion("hello world").await;
        assert_eq!(emotions.into_inner(), vec!["neutral"]);

        let sentiment = gateway.classify_sentiment("hello world").await;
        assert_eq!(sentiment.into_inner(), Sentiment::default());
    }

    #[tokio::test]
    async fn blank_text_skips_text_capabilities() {
        let (gateway, backend) = gateway_with(StubBackend::default());

        assert!(gateway.classify_emotion("   ").await.is_fallback());
        assert!(gateway.classify_sentiment("").await.is_fallback());
        assert!(backend.emotion_calls().is_empty());
        assert!(backend.sentiment_calls().is_empty());
    }

    #[tokio::test]
    async fn faces_are_counted_with_cascade_params() {
        let (gateway, backend) = gateway_with(StubBackend::default().with_faces(3));

        let faces = gateway.count_faces(Arc::new(solid_image(32, 32, [0, 0, 0]))).await;
        assert_eq!(faces, PerceptionResult::Ok(3));

        let params = backend.face_params.lock().unwrap().clone();
        assert_eq!(
            params,
            vec![CascadeParams {
                scale_factor: 1.1,
                min_neighbors: 4
            }]
        );
    }

    #[tokio::test]
    async fn emotions_keep_model_order_up_to_limit() {
        let (gateway, _) = gateway_with(StubBackend::default().with_emotions(&[
            ("joy", 0.5),
            ("surprise", 0.3),
            ("anger", 0.1),
            ("fear", 0.1),
        ]));

        let emotions = gateway.classify_emotion("great day").await;
        assert_eq!(emotions.into_inner(), vec!["joy", "surprise", "anger"]);
    }

    #[tokio::test]
    async fn slow_capability_times_out_to_fallback() {
        let backend = Arc::new(
            StubBackend::default()
                .with_detections(&[("logo", 0.9)])
                .with_delay(Duration::from_secs(2)),
        );
        let host = CapabilityHost::preloaded(stub_capabilities(backend));
        let settings = PerceptionSettings {
            timeout_ms: Some(50),
            ..PerceptionSettings::default()
        };
        let gateway = PerceptionGateway::new(Arc::new(host), settings);

        let objects = gateway.detect_objects(b"img").await;
        assert!(objects.is_fallback());
        assert_eq!(objects.into_inner(), vec!["person", "object"]);
    }

    #[tokio::test]
    async fn unavailable_host_falls_back() {
        let host = CapabilityHost::preloaded(failing_capabilities());
        let gateway = PerceptionGateway::new(Arc::new(host), PerceptionSettings::default());
        assert!(gateway.detect_nsfw(b"img").await.is_fallback());

        struct BrokenLoader;

        #[async_trait::async_trait]
        impl crate::perception::host::CapabilityLoader for BrokenLoader {
            async fn load(&self) -> Result<Capabilities, CapabilityError> {
                Err(CapabilityError::Unavailable("models missing".to_string()))
            }

            fn name(&self) -> &'static str {
                "broken"
            }
        }

        let host = CapabilityHost::new(Box::new(BrokenLoader));
        let gateway = PerceptionGateway::new(Arc::new(host), PerceptionSettings::default());
        let text = gateway.extract_text(b"img").await;
        assert_eq!(text, PerceptionResult::Fallback(Vec::new()));
    }
}
