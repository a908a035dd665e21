pub mod aggregator;
pub mod color_harmony;
pub mod coordinator;
pub mod metrics;
pub mod properties;
pub mod record;

pub use aggregator::{text_density, FeatureAggregator};
pub use color_harmony::ColorHarmonyAnalyzer;
pub use coordinator::AnalysisCoordinator;
pub use metrics::{AnalysisMetrics, AnalysisPhase};
pub use properties::AssetProperties;
pub use record::{BrandSafety, FeatureRecord, NsfwVerdict, Sentiment, StageOneOutput, StageTwoOutput};
