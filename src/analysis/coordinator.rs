use super::aggregator::FeatureAggregator;
use super::color_harmony::ColorHarmonyAnalyzer;
use super::metrics::{AnalysisMetrics, AnalysisPhase};
use super::record::{FeatureRecord, StageOneOutput, StageTwoOutput};
use crate::config::AnalysisSettings;
use crate::error::AnalysisError;
use crate::perception::gateway::{FALLBACK_FACE_COUNT, FALLBACK_NSFW, FALLBACK_OBJECTS};
use crate::perception::{Capability, PerceptionGateway, PerceptionResult};
use image::DynamicImage;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Runs the perception capabilities for one asset and merges the results.
///
/// Stage one fans the four image capabilities (objects, NSFW, text, faces)
/// out over a bounded worker pool and waits for all of them. Stage two runs
/// emotion and sentiment classification, in order, on the text stage one
/// found. A capability that fails, or whose task dies, only loses its own
/// slot to the fallback value. Failures outside the capabilities (decoding,
/// aggregation) replace the whole result with `FeatureRecord::fallback()`.
pub struct AnalysisCoordinator {
    gateway: Arc<PerceptionGateway>,
    worker_pool_size: usize,
}

impl AnalysisCoordinator {
    pub fn new(gateway: Arc<PerceptionGateway>, settings: &AnalysisSettings) -> Self {
        Self {
            gateway,
            worker_pool_size: settings.worker_pool_size.max(1),
        }
    }

    pub async fn analyze(&self, image: &[u8]) -> FeatureRecord {
        self.analyze_with_metrics(Uuid::new_v4(), image).await.0
    }

    /// `analysis_id` tags every log line of this analysis.
    #[instrument(skip(self, analysis_id, image), fields(analysis_id = %analysis_id, bytes = image.len()))]
    pub async fn analyze_with_metrics(
        &self,
        analysis_id: Uuid,
        image: &[u8],
    ) -> (FeatureRecord, AnalysisMetrics) {
        let start = Instant::now();
        let mut metrics = AnalysisMetrics::new();

        let record = match self.try_analyze(image, &mut metrics).await {
            Ok(record) => record,
            Err(e) => {
                error!("Asset analysis failed, using fallback record: {}", e);
                metrics.mark_fallback();
                FeatureRecord::fallback()
            }
        };

        metrics.finalize(start);
        info!(
            "Asset analysis completed in {}us ({} capability fallbacks)",
            start.elapsed().as_micros(),
            metrics.capability_fallbacks()
        );
        (record, metrics)
    }

    async fn try_analyze(
        &self,
        image: &[u8],
        metrics: &mut AnalysisMetrics,
    ) -> Result<FeatureRecord, AnalysisError> {
        let bytes: Arc<[u8]> = Arc::from(image);

        let phase_start = Instant::now();
        let decoded = {
            let bytes = bytes.clone();
            tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??
        };
        metrics.record(AnalysisPhase::Decode, phase_start.elapsed());
        let decoded = Arc::new(decoded);

        let phase_start = Instant::now();
        let (stage_one, fallbacks) = self.run_stage_one(bytes, decoded.clone()).await;
        metrics.record(AnalysisPhase::StageOne, phase_start.elapsed());
        metrics.add_capability_fallbacks(fallbacks);
        debug!(
            "Stage one completed in {}us: {} objects, {} text tokens, {} faces",
            phase_start.elapsed().as_micros(),
            stage_one.objects.len(),
            stage_one.detected_text.len(),
            stage_one.face_count
        );

        let phase_start = Instant::now();
        let (stage_two, fallbacks) = self.run_stage_two(&stage_one.detected_text).await;
        metrics.record(AnalysisPhase::StageTwo, phase_start.elapsed());
        metrics.add_capability_fallbacks(fallbacks);

        let phase_start = Instant::now();
        let color_harmony =
            tokio::task::spawn_blocking(move || ColorHarmonyAnalyzer::score(&decoded)).await?;
        metrics.record(AnalysisPhase::ColorHarmony, phase_start.elapsed());

        let record = metrics.time(AnalysisPhase::Aggregation, || {
            FeatureAggregator::aggregate(stage_one, stage_two, color_harmony)
        })?;
        Ok(record)
    }

    /// Fan-out of the four image capabilities. Returns only once every task
    /// has finished; a task that died contributes its fallback value.
    async fn run_stage_one(
        &self,
        bytes: Arc<[u8]>,
        image: Arc<DynamicImage>,
    ) -> (StageOneOutput, usize) {
        let pool = Arc::new(Semaphore::new(self.worker_pool_size));

        let objects = {
            let gateway = self.gateway.clone();
            let bytes = bytes.clone();
            spawn_worker(&pool, async move { gateway.detect_objects(&bytes).await })
        };
        let nsfw = {
            let gateway = self.gateway.clone();
            let bytes = bytes.clone();
            spawn_worker(&pool, async move { gateway.detect_nsfw(&bytes).await })
        };
        let text = {
            let gateway = self.gateway.clone();
            spawn_worker(&pool, async move { gateway.extract_text(&bytes).await })
        };
        let faces = {
            let gateway = self.gateway.clone();
            spawn_worker(&pool, async move { gateway.count_faces(image).await })
        };

        let (objects, nsfw, text, faces) = tokio::join!(objects, nsfw, text, faces);
        let objects = settle(Capability::ObjectDetection, objects, || {
            FALLBACK_OBJECTS.iter().map(|s| s.to_string()).collect()
        });
        let nsfw = settle(Capability::NsfwDetection, nsfw, || FALLBACK_NSFW);
        let text = settle(Capability::TextExtraction, text, Vec::new);
        let faces = settle(Capability::FaceCounting, faces, || FALLBACK_FACE_COUNT);

        let fallbacks = [
            objects.is_fallback(),
            nsfw.is_fallback(),
            text.is_fallback(),
            faces.is_fallback(),
        ]
        .into_iter()
        .filter(|used| *used)
        .count();

        (
            StageOneOutput {
                objects: objects.into_inner(),
                nsfw: nsfw.into_inner(),
                detected_text: text.into_inner(),
                face_count: faces.into_inner(),
            },
            fallbacks,
        )
    }

    /// Emotion then sentiment on the joined text. Neither capability is
    /// called when there is no text.
    async fn run_stage_two(&self, tokens: &[String]) -> (StageTwoOutput, usize) {
        let text = tokens.join(" ");
        if text.is_empty() {
            debug!("No text detected, skipping emotion and sentiment classification");
            return (StageTwoOutput::default(), 0);
        }

        let emotions = self.gateway.classify_emotion(&text).await;
        let sentiment = self.gateway.classify_sentiment(&text).await;
        let fallbacks = usize::from(emotions.is_fallback()) + usize::from(sentiment.is_fallback());

        (
            StageTwoOutput {
                emotions: emotions.into_inner(),
                sentiment: sentiment.into_inner(),
            },
            fallbacks,
        )
    }
}

fn spawn_worker<T, Fut>(pool: &Arc<Semaphore>, task: Fut) -> JoinHandle<PerceptionResult<T>>
where
    T: Send + 'static,
    Fut: Future<Output = PerceptionResult<T>> + Send + 'static,
{
    let pool = pool.clone();
    tokio::spawn(async move {
        // The pool is never closed, so acquiring only waits for a free slot.
        let _permit = pool.acquire_owned().await.ok();
        task.await
    })
}

/// Result of a joined stage-one task, with the capability's fallback when
/// the task panicked or was cancelled.
fn settle<T>(
    capability: Capability,
    joined: Result<PerceptionResult<T>, JoinError>,
    fallback: impl FnOnce() -> T,
) -> PerceptionResult<T> {
    match joined {
        Ok(result) => result,
        Err(e) => {
            warn!(
                capability = capability.name(),
                "{} task died, using fallback: {}", capability, e
            );
            PerceptionResult::Fallback(fallback())
        }
    }
}
