use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::task::{Context, Poll};
use futures::Future;
use indexmap::IndexMap;
use serde::Serialize;
use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::analysis::{AnalysisCoordinator, AnalysisPhase, AssetProperties, FeatureRecord};
use crate::classification::{ClassificationResult, ContentClassifier};

#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub bytes: Arc<[u8]>,
    pub filename: Option<String>,
}

impl AssetRequest {
    pub fn new(bytes: impl Into<Arc<[u8]>>, filename: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename,
        }
    }
}

/// Everything produced for one asset.
#[derive(Debug, Clone, Serialize)]
pub struct AssetReport {
    pub request_id: Uuid,
    pub filename: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub properties: AssetProperties,
    pub features: FeatureRecord,
    pub classification: ClassificationResult,
    /// Phase name to microseconds.
    pub timings: IndexMap<String, u64>,
    pub capability_fallbacks: usize,
}

pub type BoxAnalysisService = BoxCloneService<AssetRequest, AssetReport, Infallible>;

/// Analyzes and classifies one asset per call. Never fails: every error is
/// absorbed into fallback values inside the report.
#[derive(Clone)]
pub struct AnalysisService {
    coordinator: Arc<AnalysisCoordinator>,
}

impl AnalysisService {
    pub fn new(coordinator: Arc<AnalysisCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn builder(coordinator: Arc<AnalysisCoordinator>) -> AnalysisServiceBuilder {
        AnalysisServiceBuilder {
            coordinator,
            max_concurrent_analyses: None,
        }
    }

    #[instrument(skip(coordinator, request), fields(filename = request.filename.as_deref().unwrap_or("-")))]
    async fn process(coordinator: Arc<AnalysisCoordinator>, request: AssetRequest) -> AssetReport {
        let properties = AssetProperties::inspect(&request.bytes, request.filename.as_deref());
        let request_id = Uuid::new_v4();
        let (features, mut metrics) = coordinator
            .analyze_with_metrics(request_id, &request.bytes)
            .await;

        let start = Instant::now();
        let classification = ContentClassifier::classify(&features);
        metrics.record(AnalysisPhase::Classification, start.elapsed());

        info!(
            "Asset classified as {} ({:.2})",
            classification.content_type, classification.confidence
        );

        AssetReport {
            request_id,
            filename: request.filename,
            analyzed_at: Utc::now(),
            properties,
            features,
            classification,
            timings: metrics.to_micros(),
            capability_fallbacks: metrics.capability_fallbacks(),
        }
    }
}

impl Service<AssetRequest> for AnalysisService {
    type Response = AssetReport;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: AssetRequest) -> Self::Future {
        let coordinator = self.coordinator.clone();
        Box::pin(async move { Ok(Self::process(coordinator, req).await) })
    }
}

pub struct AnalysisServiceBuilder {
    coordinator: Arc<AnalysisCoordinator>,
    max_concurrent_analyses: Option<usize>,
}

impl AnalysisServiceBuilder {
    /// Bounds how many assets are analyzed at once across all clones of the
    /// built service.
    pub fn max_concurrent_analyses(mut self, max: usize) -> Self {
        self.max_concurrent_analyses = Some(max.max(1));
        self
    }

    pub fn build(self) -> BoxAnalysisService {
        let service = AnalysisService::new(self.coordinator);
        match self.max_concurrent_analyses {
            Some(max) => BoxCloneService::new(
                ServiceBuilder::new()
                    .concurrency_limit(max)
                    .service(service),
            ),
            None => BoxCloneService::new(service),
        }
    }
}

/// Unwraps a result that cannot hold an error.
pub fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}
