use crate::library::SongStore;
use crate::lifecycle::LifecycleState;
use crate::streaming::{MimeRegistry, StreamingEngine};
use crate::transcode::CapabilityCell;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<dyn SongStore>,
    pub engine: StreamingEngine,
    pub capability: CapabilityCell,
    pub mime: Arc<MimeRegistry>,
    /// 编排器状态
    pub lifecycle: watch::Receiver<LifecycleState>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        library: Arc<dyn SongStore>,
        engine: StreamingEngine,
        capability: CapabilityCell,
        mime: MimeRegistry,
        lifecycle: watch::Receiver<LifecycleState>,
    ) -> Self {
        Self {
            library,
            engine,
            capability,
            mime: Arc::new(mime),
            lifecycle,
            started_at: Utc::now(),
        }
    }
}
