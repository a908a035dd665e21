pub mod capability;
pub mod gateway;
pub mod host;
pub mod remote;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{
    Capabilities, Capability, CascadeParams, EmotionClassifier, FaceDetector, FaceRegion,
    NsfwClassifier, ObjectDetector, ScoredLabel, SentimentClassifier, TextRecognizer,
};
pub use gateway::{PerceptionGateway, PerceptionResult};
pub use host::{CapabilityHost, CapabilityLoader};
pub use remote::{RemoteBackend, RemoteLoader};
