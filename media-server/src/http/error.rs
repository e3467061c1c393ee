// 音乐流媒体服务器 - API错误响应
//
// 所有错误都以统一的JSON格式返回：
// `{"error": {"code": <状态码>, "message": "<描述>"}}`

use crate::transcode::TranscodeError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::LibraryError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no integer stream ID provided")]
    MissingStreamId,

    #[error("invalid integer stream ID")]
    InvalidStreamId,

    #[error("unsupported API version: {0}")]
    UnsupportedVersion(String),

    #[error("song ID not found")]
    SongNotFound,

    #[error("invalid HTTP Range header boundaries")]
    InvalidRange { total: u64 },

    #[error("transcoding is currently disabled")]
    TranscodeDisabled,

    #[error("{0}")]
    BadTranscodeRequest(String),

    #[error("an internal server error occurred")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingStreamId
            | ApiError::InvalidStreamId
            | ApiError::UnsupportedVersion(_)
            | ApiError::BadTranscodeRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SongNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::TranscodeDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail {
                code: status.as_u16(),
                message: self.to_string(),
            },
        };
        let mut response = (status, Json(body)).into_response();

        // 416响应附带资源的实际长度
        if let ApiError::InvalidRange { total } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        match e {
            LibraryError::SongNotFound(_) => ApiError::SongNotFound,
            other => {
                error!("Failed to load song: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<TranscodeError> for ApiError {
    fn from(e: TranscodeError) -> Self {
        match e {
            TranscodeError::Disabled => ApiError::TranscodeDisabled,
            TranscodeError::UnknownCodec(_)
            | TranscodeError::CodecUnavailable(_)
            | TranscodeError::InvalidQuality(_)
            | TranscodeError::VbrUnsupported(_) => ApiError::BadTranscodeRequest(e.to_string()),
            TranscodeError::Spawn(io) => {
                error!("Failed to start transcoder: {}", io);
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::capability::TranscodeCodec;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_body_format() {
        let (status, body) = body_json(ApiError::InvalidRange { total: 1000 }).await;
        assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            body,
            serde_json::json!({
                "error": { "code": 416, "message": "invalid HTTP Range header boundaries" }
            })
        );

        let (status, body) = body_json(ApiError::UnsupportedVersion("v9".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "unsupported API version: v9");
    }

    #[test]
    fn test_invalid_range_reports_total_size() {
        let response = ApiError::InvalidRange { total: 1000 }.into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */1000"
        );

        let response = ApiError::SongNotFound.into_response();
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    }

    #[test]
    fn test_from_library_error() {
        assert!(matches!(
            ApiError::from(LibraryError::SongNotFound(3)),
            ApiError::SongNotFound
        ));
        assert!(matches!(
            ApiError::from(LibraryError::UnknownFileType("txt".to_string())),
            ApiError::Internal
        ));
    }

    #[test]
    fn test_from_transcode_error() {
        assert_eq!(ApiError::from(TranscodeError::Disabled).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::from(TranscodeError::CodecUnavailable(TranscodeCodec::Opus)).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
