use super::error::ApiError;
use super::state::AppState;
use super::streaming::check_version;
use crate::transcode::CapabilityState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    status: String,
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
        }
    }
}

/// 服务器状态
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub state: String,
    pub songs: usize,
    /// 转码能力探测是否已完成
    pub transcode_probed: bool,
    pub transcode: CapabilityState,
}

/// 健康检查
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("OK".to_string()))
}

/// 服务器状态
pub async fn get_status(
    State(state): State<AppState>,
    version: Option<Path<String>>,
) -> Result<Json<ApiResponse<ServerStatus>>, ApiError> {
    if let Some(Path(version)) = version {
        check_version(Some(&version))?;
    }

    let now = Utc::now();
    Ok(Json(ApiResponse::success(ServerStatus {
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_secs: (now - state.started_at).num_seconds(),
        state: state.lifecycle.borrow().to_string(),
        songs: state.library.len(),
        transcode_probed: state.capability.is_published(),
        transcode: state.capability.snapshot().clone(),
    })))
}
