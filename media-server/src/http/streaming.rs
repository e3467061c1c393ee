// 音乐流媒体服务器 - 流式传输接口
//
// 每个请求在独立任务中运行流引擎。引擎写出的响应头通过一次性通道交给处理函数，
// 数据分片通过有界通道成为响应体。客户端断开时响应体被丢弃，引擎随即收到传输错误。

use super::error::ApiError;
use super::state::AppState;
use crate::streaming::{
    classify_write_error, ByteSource, FileSource, ResponseHead, ResponseSink, StreamError,
    StreamResource, StreamingEngine,
};
use crate::transcode::{TranscodeOptions, TranscodeSource};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
};
use bytes::Bytes;
use serde::Deserialize;
use std::io;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

/// 响应体通道容量（分片数）
const BODY_CHANNEL_CAPACITY: usize = 4;

/// 当前支持的API版本
pub const SUPPORTED_VERSIONS: &[&str] = &["v0"];

#[derive(Debug, Deserialize)]
pub struct StreamPath {
    #[serde(default)]
    pub version: Option<String>,
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TranscodeQuery {
    pub codec: Option<String>,
    pub quality: Option<String>,
}

pub(crate) fn check_version(version: Option<&str>) -> Result<(), ApiError> {
    match version {
        None => Ok(()),
        Some(v) if SUPPORTED_VERSIONS.contains(&v) => Ok(()),
        Some(v) => Err(ApiError::UnsupportedVersion(v.to_string())),
    }
}

fn parse_stream_id(id: &str) -> Result<u64, ApiError> {
    id.parse().map_err(|_| ApiError::InvalidStreamId)
}

/// 原始文件流
pub async fn get_stream(
    State(state): State<AppState>,
    Path(path): Path<StreamPath>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    check_version(path.version.as_deref())?;
    let id = parse_stream_id(&path.id)?;
    let song = state.library.load_song(id)?;

    let source = FileSource::open(&song.file_name).await.map_err(|e| {
        error!(id, "Failed to open {:?} for streaming: {}", song.file_name, e);
        ApiError::Internal
    })?;

    let resource = StreamResource {
        id,
        mime: state.mime.mime_for(Some(song.file_type)).to_string(),
        codec: song.file_type.codec_name().to_string(),
        bitrate: song.bitrate,
    };
    let total_size = source.size();

    spawn_stream(state.engine.clone(), resource, song.display_label(), total_size, source, headers).await
}

/// 实时转码流
pub async fn get_transcode(
    State(state): State<AppState>,
    Path(path): Path<StreamPath>,
    Query(query): Query<TranscodeQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    check_version(path.version.as_deref())?;
    let id = parse_stream_id(&path.id)?;

    let capability = state.capability.snapshot();
    if !capability.enabled {
        return Err(ApiError::TranscodeDisabled);
    }

    let options = TranscodeOptions::parse(query.codec.as_deref(), query.quality.as_deref())?;
    let binary = capability.binary_for(options.codec)?;
    let song = state.library.load_song(id)?;

    let source = TranscodeSource::spawn(binary, &song.file_name, &options)?;

    let resource = StreamResource {
        id,
        mime: options.codec.mime_type().to_string(),
        codec: options.codec.to_string(),
        bitrate: options.quality.nominal_bitrate(),
    };

    spawn_stream(state.engine.clone(), resource, song.display_label(), None, source, headers).await
}

/// 未提供ID
pub async fn missing_stream_id(version: Option<Path<String>>) -> ApiError {
    if let Some(Path(version)) = version {
        if let Err(e) = check_version(Some(&version)) {
            return e;
        }
    }
    ApiError::MissingStreamId
}

/// 在独立任务中运行流引擎，等待响应头后返回流式响应
async fn spawn_stream<S>(
    engine: StreamingEngine,
    resource: StreamResource,
    label: String,
    total_size: Option<u64>,
    mut source: S,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: ByteSource + 'static,
{
    let op = Uuid::new_v4();
    let id = resource.id;
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);

    let task = tokio::spawn(
        async move {
            let mut sink = ChannelSink::new(head_tx, body_tx);
            let result = engine
                .serve(&resource, &label, total_size, &mut source, &headers, &mut sink)
                .await;

            // 响应头已发出时只能中断响应体，错误在这里记录
            match &result {
                Ok(summary) => debug!(
                    id = resource.id,
                    status = summary.status.as_u16(),
                    bytes = summary.bytes_sent,
                    "stream: response finished"
                ),
                Err(e) if sink.head_sent() => {
                    if e.is_transport() {
                        debug!(id = resource.id, "stream: client disconnected: {}", e);
                    } else {
                        error!(id = resource.id, label = %label, "stream: failed mid-body: {}", e);
                        sink.abort(e.to_string()).await;
                    }
                }
                Err(_) => {}
            }
            result
        }
        .instrument(info_span!("stream", op = %op)),
    );

    match head_rx.await {
        Ok(head) => {
            let mut response = Response::new(Body::from_stream(ReceiverStream::new(body_rx)));
            *response.status_mut() = head.status;
            *response.headers_mut() = head.headers;
            Ok(response)
        }
        Err(_) => match task.await {
            Ok(Err(StreamError::InvalidRange)) => Err(ApiError::InvalidRange {
                total: total_size.unwrap_or_default(),
            }),
            Ok(Err(e)) if e.is_transport() => {
                debug!(id, op = %op, "stream: client disconnected before response: {}", e);
                Err(ApiError::Internal)
            }
            Ok(Err(e)) => {
                error!(id, op = %op, "stream: failed before response: {}", e);
                Err(ApiError::Internal)
            }
            Ok(Ok(_)) => {
                error!(id, op = %op, "stream: finished without a response head");
                Err(ApiError::Internal)
            }
            Err(e) => {
                error!(id, op = %op, "stream: task failed: {}", e);
                Err(ApiError::Internal)
            }
        },
    }
}

/// 基于通道的响应写入端
pub struct ChannelSink {
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: mpsc::Sender<Result<Bytes, io::Error>>,
}

impl ChannelSink {
    pub fn new(
        head_tx: oneshot::Sender<ResponseHead>,
        body_tx: mpsc::Sender<Result<Bytes, io::Error>>,
    ) -> Self {
        Self {
            head_tx: Some(head_tx),
            body_tx,
        }
    }

    pub fn head_sent(&self) -> bool {
        self.head_tx.is_none()
    }

    /// 以错误结束响应体，客户端会看到连接被中断
    ///
    /// 等待通道空位，保证错误排在已写出的分片之后。
    pub async fn abort(&self, message: String) {
        let _ = self
            .body_tx
            .send(Err(io::Error::new(io::ErrorKind::Other, message)))
            .await;
    }

    fn disconnected() -> StreamError {
        classify_write_error(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "response body dropped",
        ))
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn send_head(&mut self, head: ResponseHead) -> Result<(), StreamError> {
        let tx = self.head_tx.take().ok_or_else(|| {
            StreamError::Io(io::Error::new(io::ErrorKind::Other, "response head already sent"))
        })?;
        tx.send(head).map_err(|_| Self::disconnected())
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), StreamError> {
        self.body_tx.send(Ok(chunk)).await.map_err(|_| Self::disconnected())
    }
}
