use super::capability::Capabilities;
use crate::error::CapabilityError;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Builds the capability bundle. Expensive, so the host runs it at most once.
#[async_trait]
pub trait CapabilityLoader: Send + Sync {
    async fn load(&self) -> Result<Capabilities, CapabilityError>;
    fn name(&self) -> &'static str;
}

/// Process-wide owner of the perception capabilities.
///
/// Constructed explicitly and handed to the gateway. The bundle is loaded
/// lazily on first use; concurrent first callers wait on the same load. A
/// failed load is not cached, so the next call tries again.
pub struct CapabilityHost {
    loader: Option<Box<dyn CapabilityLoader>>,
    capabilities: OnceCell<Capabilities>,
}

impl CapabilityHost {
    pub fn new(loader: Box<dyn CapabilityLoader>) -> Self {
        Self {
            loader: Some(loader),
            capabilities: OnceCell::new(),
        }
    }

    pub fn preloaded(capabilities: Capabilities) -> Self {
        Self {
            loader: None,
            capabilities: OnceCell::new_with(Some(capabilities)),
        }
    }

    pub async fn capabilities(&self) -> Result<&Capabilities, CapabilityError> {
        self.capabilities
            .get_or_try_init(|| async {
                let loader = self.loader.as_ref().ok_or_else(|| {
                    CapabilityError::Unavailable("no capability loader configured".to_string())
                })?;

                info!("Loading perception capabilities via {}", loader.name());
                match loader.load().await {
                    Ok(capabilities) => {
                        info!("Perception capabilities loaded");
                        Ok(capabilities)
                    }
                    Err(e) => {
                        warn!("Failed to load perception capabilities: {}", e);
                        Err(CapabilityError::Unavailable(e.to_string()))
                    }
                }
            })
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.capabilities.initialized()
    }
}
