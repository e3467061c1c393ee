// 音乐流媒体服务器 - StreamingEngine实现
//
// 本模块负责把一个字节源按照HTTP语义写入响应：完整响应（200）、
// 单区间部分响应（206）以及越界错误（由调用方映射为416）。
//
// # 特性
//
// - 状态码和响应头在写出第一个字节之前确定
// - 有界分片读取，不需要把整个文件载入内存
// - 客户端断开被识别为传输错误，与存储错误区分开
// - 支持未知长度的数据源（实时转码），此时忽略Range请求

use super::error::StreamError;
use super::range::{parse_range, ByteRange};
use super::source::ByteSource;
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use tracing::{info, warn};

/// 默认分片大小（32KB）
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// 最小分片大小（4KB）
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// 最大分片大小（1MB）
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// 响应头部
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// 响应写入端
///
/// 流引擎不依赖具体的HTTP框架，只通过这个接口写出响应。
/// 头部恰好写一次，之后按顺序写入数据分片。
#[async_trait]
pub trait ResponseSink: Send {
    async fn send_head(&mut self, head: ResponseHead) -> Result<(), StreamError>;

    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), StreamError>;
}

/// 被流式传输的资源
#[derive(Debug, Clone)]
pub struct StreamResource {
    pub id: u64,
    pub mime: String,
    pub codec: String,
    /// 码率（kbps）
    pub bitrate: u32,
}

/// 一次传输的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub status: StatusCode,
    pub bytes_sent: u64,
}

/// 响应计划：在写入任何数据之前确定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResponsePlan {
    status: StatusCode,
    range: Option<ByteRange>,
    total_size: Option<u64>,
}

impl ResponsePlan {
    fn offset(&self) -> u64 {
        self.range.map(|r| r.start).unwrap_or(0)
    }

    /// 需要发送的字节数，`None` 表示读到末尾为止
    fn length(&self) -> Option<u64> {
        match self.range {
            Some(range) => Some(range.len()),
            None => self.total_size,
        }
    }

    fn head(&self, resource: &StreamResource) -> ResponseHead {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

        let content_type = HeaderValue::from_str(&resource.mime)
            .unwrap_or_else(|_| HeaderValue::from_static(super::mime::OCTET_STREAM));
        headers.insert(header::CONTENT_TYPE, content_type);

        if let Some(length) = self.length() {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        }

        if let (Some(range), Some(total)) = (self.range, self.total_size) {
            if let Ok(value) = HeaderValue::from_str(&range.content_range(total)) {
                headers.insert(header::CONTENT_RANGE, value);
            }
        }

        ResponseHead {
            status: self.status,
            headers,
        }
    }
}

/// 流引擎
#[derive(Debug, Clone)]
pub struct StreamingEngine {
    chunk_size: usize,
}

impl Default for StreamingEngine {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StreamingEngine {
    pub fn new(chunk_size: usize) -> Self {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            warn!(
                "Chunk size {} out of range, clamping to {}..={}",
                chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            );
        }
        Self {
            chunk_size: chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 将字节源写入响应
    ///
    /// # 参数
    ///
    /// - `resource`: 资源信息（ID、MIME类型、编码、码率）
    /// - `label`: 日志中的展示名称
    /// - `total_size`: 资源总长度，未知时为 `None`
    /// - `source`: 字节源
    /// - `request_headers`: 请求头，用于读取Range
    /// - `sink`: 响应写入端
    ///
    /// # 错误
    ///
    /// - `StreamError::InvalidRange`: Range越界，此时没有写出任何内容
    /// - `StreamError::Transport`: 客户端断开
    /// - `StreamError::Io`: 其他读写错误
    pub async fn serve<S, W>(
        &self,
        resource: &StreamResource,
        label: &str,
        total_size: Option<u64>,
        source: &mut S,
        request_headers: &HeaderMap,
        sink: &mut W,
    ) -> Result<StreamSummary, StreamError>
    where
        S: ByteSource + ?Sized,
        W: ResponseSink + ?Sized,
    {
        let plan = Self::plan(total_size, request_headers)?;

        info!(
            id = resource.id,
            label,
            codec = %resource.codec,
            bitrate = resource.bitrate,
            status = plan.status.as_u16(),
            "stream: starting"
        );

        if plan.offset() > 0 {
            source.seek_to(plan.offset()).await?;
        }

        let mut buf = vec![0u8; self.chunk_size];

        // 长度未知时先读第一个分片，数据源启动失败时还没有写出响应头
        let first = match plan.length() {
            Some(_) => None,
            None => Some(source.read_chunk(&mut buf).await?),
        };

        sink.send_head(plan.head(resource)).await?;

        let bytes_sent = match first {
            None => self.copy_body(source, sink, plan.length(), &mut buf).await?,
            Some(0) => 0,
            Some(n) => {
                sink.send_chunk(Bytes::copy_from_slice(&buf[..n])).await?;
                n as u64 + self.copy_body(source, sink, None, &mut buf).await?
            }
        };

        info!(
            id = resource.id,
            label,
            codec = %resource.codec,
            bitrate = resource.bitrate,
            bytes = bytes_sent,
            "stream: completed"
        );

        Ok(StreamSummary {
            status: plan.status,
            bytes_sent,
        })
    }

    fn plan(total_size: Option<u64>, request_headers: &HeaderMap) -> Result<ResponsePlan, StreamError> {
        let full = ResponsePlan {
            status: StatusCode::OK,
            range: None,
            total_size,
        };

        // 未知长度时无法校验区间，按完整响应处理
        let Some(total) = total_size else {
            return Ok(full);
        };

        let Some(header_value) = request_headers.get(header::RANGE) else {
            return Ok(full);
        };

        let Ok(header_str) = header_value.to_str() else {
            return Ok(full);
        };

        match parse_range(header_str, total)? {
            Some(range) => Ok(ResponsePlan {
                status: StatusCode::PARTIAL_CONTENT,
                range: Some(range),
                total_size,
            }),
            None => Ok(full),
        }
    }

    async fn copy_body<S, W>(
        &self,
        source: &mut S,
        sink: &mut W,
        length: Option<u64>,
        buf: &mut [u8],
    ) -> Result<u64, StreamError>
    where
        S: ByteSource + ?Sized,
        W: ResponseSink + ?Sized,
    {
        let mut sent = 0u64;

        loop {
            let want = match length {
                Some(length) => {
                    let remaining = length - sent;
                    if remaining == 0 {
                        break;
                    }
                    remaining.min(buf.len() as u64) as usize
                }
                None => buf.len(),
            };

            let n = source.read_chunk(&mut buf[..want]).await?;
            if n == 0 {
                if length.is_some() {
                    return Err(StreamError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("source ended after {} bytes", sent),
                    )));
                }
                break;
            }

            sink.send_chunk(Bytes::copy_from_slice(&buf[..n])).await?;
            sent += n as u64;
        }

        Ok(sent)
    }
}
