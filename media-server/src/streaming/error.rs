// 音乐流媒体服务器 - 流错误类型定义
//
// 流处理只区分三类错误：Range越界、客户端断开和其他IO错误。
// 客户端断开属于正常行为（拖动进度条、停止播放），调用方应静默处理。

use std::io;
use thiserror::Error;

/// 流错误类型
#[derive(Debug, Error)]
pub enum StreamError {
    /// Range请求越界，调用方返回416
    #[error("invalid HTTP Range header boundaries")]
    InvalidRange,

    /// 客户端断开连接（连接重置、管道断开、响应体被丢弃）
    #[error("client disconnected: {0}")]
    Transport(String),

    /// 其他IO错误，调用方返回500
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    /// 是否为客户端断开
    pub fn is_transport(&self) -> bool {
        matches!(self, StreamError::Transport(_))
    }
}

/// 对写入响应时发生的IO错误进行分类
///
/// 优先使用 `io::ErrorKind`，只有在错误种类无法识别时才退回到错误描述的字符串匹配。
pub fn classify_write_error(error: io::Error) -> StreamError {
    match error.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => StreamError::Transport(error.to_string()),
        _ => {
            let message = error.to_string().to_lowercase();
            if message.contains("connection reset by peer") || message.contains("broken pipe") {
                StreamError::Transport(error.to_string())
            } else {
                StreamError::Io(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            StreamError::InvalidRange.to_string(),
            "invalid HTTP Range header boundaries"
        );
        let error = StreamError::Transport("broken pipe".to_string());
        assert!(!error.to_string().is_empty());
    }

    #[test]
    fn test_classify_by_kind() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
        ] {
            let error = classify_write_error(io::Error::new(kind, "peer gone"));
            assert!(error.is_transport(), "{:?} should be a transport error", kind);
        }
    }

    #[test]
    fn test_classify_by_message_fallback() {
        let io_error = io::Error::new(
            io::ErrorKind::Other,
            "write tcp 127.0.0.1:4444: connection reset by peer",
        );
        assert!(classify_write_error(io_error).is_transport());

        let io_error = io::Error::new(io::ErrorKind::Other, "write: Broken pipe");
        assert!(classify_write_error(io_error).is_transport());
    }

    #[test]
    fn test_classify_other_errors() {
        let io_error = io::Error::new(io::ErrorKind::Other, "disk on fire");
        match classify_write_error(io_error) {
            StreamError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::Other),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }
}
