use super::handlers;
use super::state::AppState;
use super::streaming;
use axum::http::{header, HeaderValue};
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    // 流接口的所有响应（包括错误响应）都声明支持Range
    let streams: Router<AppState> = Router::new()
        // 原始文件流
        .route("/api/stream", get(streaming::missing_stream_id))
        .route("/api/:version/stream", get(streaming::missing_stream_id))
        .route("/api/stream/:id", get(streaming::get_stream))
        .route("/api/:version/stream/:id", get(streaming::get_stream))

        // 实时转码
        .route("/api/transcode", get(streaming::missing_stream_id))
        .route("/api/:version/transcode", get(streaming::missing_stream_id))
        .route("/api/transcode/:id", get(streaming::get_transcode))
        .route("/api/:version/transcode/:id", get(streaming::get_transcode))

        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCEPT_RANGES,
            HeaderValue::from_static("bytes"),
        ));

    Router::new()
        .merge(streams)

        // 服务器状态
        .route("/api/status", get(handlers::get_status))
        .route("/api/:version/status", get(handlers::get_status))

        // 健康检查
        .route("/health", get(handlers::health_check))

        .with_state(state)

        // CORS中间件
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::scanner::ScannedSong;
    use crate::library::tags::TrackTags;
    use crate::library::MemoryLibrary;
    use crate::lifecycle::LifecycleState;
    use crate::streaming::{MimeRegistry, StreamingEngine};
    use crate::transcode::capability::TranscodeCodec;
    use crate::transcode::{CapabilityCell, CapabilityState};
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use common::FileType;
    use std::sync::Arc;
    use std::time::SystemTime;
    use tempfile::TempDir;
    use tokio::sync::watch;
    use tower::ServiceExt;

    struct Fixture {
        _dir: TempDir,
        data: Vec<u8>,
        song_id: u64,
        state: AppState,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let path = dir.path().join("01 - Track.flac");
        std::fs::write(&path, &data).unwrap();

        let library = MemoryLibrary::new();
        let song_id = library.insert(ScannedSong {
            tags: TrackTags {
                artist: "Artist".to_string(),
                album: "Album".to_string(),
                title: "Track".to_string(),
                track: Some(1),
            },
            file_name: path,
            file_size: data.len() as u64,
            file_type: FileType::Flac,
            last_modified: SystemTime::now(),
        });

        let state = AppState::new(
            Arc::new(library),
            StreamingEngine::default(),
            CapabilityCell::new(),
            MimeRegistry::new(),
            watch::channel(LifecycleState::Running).1,
        );

        Fixture {
            _dir: dir,
            data,
            song_id,
            state,
        }
    }

    async fn get(state: &AppState, uri: &str, range: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }
        create_router(state.clone())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn error_message(response: Response<Body>) -> String {
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        json["error"]["message"].as_str().unwrap().to_string()
    }

    fn header_str<'a>(response: &'a Response<Body>, name: header::HeaderName) -> Option<&'a str> {
        response.headers().get(name).map(|v| v.to_str().unwrap())
    }

    #[tokio::test]
    async fn test_stream_full_body() {
        let f = fixture();
        let response = get(&f.state, &format!("/api/v0/stream/{}", f.song_id), None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("1000"));
        assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));
        assert_eq!(header_str(&response, header::CONTENT_TYPE), Some("audio/flac"));
        assert_eq!(body_bytes(response).await, f.data);
    }

    #[tokio::test]
    async fn test_stream_partial_content() {
        let f = fixture();
        let uri = format!("/api/stream/{}", f.song_id);
        let response = get(&f.state, &uri, Some("bytes=200-299")).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header_str(&response, header::CONTENT_RANGE), Some("bytes 200-299/1000"));
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("100"));
        assert_eq!(body_bytes(response).await, f.data[200..300].to_vec());
    }

    #[tokio::test]
    async fn test_stream_invalid_range() {
        let f = fixture();
        let uri = format!("/api/stream/{}", f.song_id);
        let response = get(&f.state, &uri, Some("bytes=1000-1100")).await;

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));
        assert_eq!(header_str(&response, header::CONTENT_RANGE), Some("bytes */1000"));
        assert_eq!(error_message(response).await, "invalid HTTP Range header boundaries");
    }

    #[tokio::test]
    async fn test_stream_request_errors() {
        let f = fixture();

        let cases = [
            ("/api/stream/999", StatusCode::NOT_FOUND, "song ID not found".to_string()),
            ("/api/stream/abc", StatusCode::BAD_REQUEST, "invalid integer stream ID".to_string()),
            ("/api/stream", StatusCode::BAD_REQUEST, "no integer stream ID provided".to_string()),
            ("/api/v0/stream", StatusCode::BAD_REQUEST, "no integer stream ID provided".to_string()),
            (
                "/api/v9/stream/1",
                StatusCode::BAD_REQUEST,
                "unsupported API version: v9".to_string(),
            ),
            ("/api/v9/stream", StatusCode::BAD_REQUEST, "unsupported API version: v9".to_string()),
            ("/api/transcode/abc", StatusCode::BAD_REQUEST, "invalid integer stream ID".to_string()),
        ];

        for (uri, status, message) in cases {
            let response = get(&f.state, uri, None).await;
            assert_eq!(response.status(), status, "{}", uri);
            assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"), "{}", uri);
            assert_eq!(error_message(response).await, message, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_stream_missing_file() {
        let f = fixture();
        let song = f.state.library.load_song(f.song_id).unwrap();
        std::fs::remove_file(&song.file_name).unwrap();

        let response = get(&f.state, &format!("/api/stream/{}", f.song_id), None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));
        assert_eq!(error_message(response).await, "an internal server error occurred");
    }

    #[tokio::test]
    async fn test_transcode_disabled() {
        let f = fixture();
        let response = get(&f.state, &format!("/api/v0/transcode/{}", f.song_id), None).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));
        assert_eq!(error_message(response).await, "transcoding is currently disabled");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transcode_failure_is_server_error() {
        use crate::transcode::capability::tests::write_script;

        let f = fixture();
        let script = write_script(&f._dir, "ffmpeg", "echo 'unknown encoder' >&2; exit 1");
        f.state.capability.publish(CapabilityState {
            enabled: true,
            binary_path: Some(script),
            codecs: [TranscodeCodec::Mp3].into_iter().collect(),
        });

        let response = get(&f.state, &format!("/api/transcode/{}", f.song_id), None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));
        assert_eq!(error_message(response).await, "an internal server error occurred");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transcode_stream() {
        use crate::transcode::capability::tests::write_script;

        let f = fixture();
        let script = write_script(&f._dir, "ffmpeg", "printf 'transcoded'");
        f.state.capability.publish(CapabilityState {
            enabled: true,
            binary_path: Some(script),
            codecs: [TranscodeCodec::Mp3].into_iter().collect(),
        });

        let uri = format!("/api/transcode/{}?codec=mp3&quality=V2", f.song_id);
        // 转码流忽略Range
        let response = get(&f.state, &uri, Some("bytes=0-3")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_TYPE), Some("audio/mpeg"));
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), None);
        assert_eq!(body_bytes(response).await, b"transcoded".to_vec());

        let uri = format!("/api/transcode/{}?codec=opus", f.song_id);
        let response = get(&f.state, &uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let uri = format!("/api/transcode/{}?quality=9000", f.song_id);
        let response = get(&f.state, &uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_and_health() {
        let f = fixture();

        let response = get(&f.state, "/api/v0/status", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["data"]["songs"], 1);
        assert_eq!(json["data"]["state"], "running");
        assert_eq!(json["data"]["transcodeProbed"], false);
        assert_eq!(json["data"]["transcode"]["enabled"], false);

        let response = get(&f.state, "/api/v2/status", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(&f.state, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
