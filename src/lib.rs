pub mod analysis;
pub mod classification;
pub mod config;
pub mod error;
pub mod perception;
pub mod service;

pub use analysis::{AnalysisCoordinator, FeatureRecord};
pub use classification::{ClassificationResult, ContentClassifier, ContentType};
pub use config::Settings;
pub use error::AppError;
pub use service::{AnalysisService, AssetReport, AssetRequest};
