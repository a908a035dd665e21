pub mod classifier;
pub mod result;

pub use classifier::ContentClassifier;
pub use result::{ClassificationResult, ContentType};
