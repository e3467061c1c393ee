// 音乐流媒体服务器 - Streaming模块
//
// 本模块实现了与HTTP框架无关的字节区间流引擎。
//
// # 核心组件
//
// - `ByteSource`: 统一的字节源抽象接口（定位 + 有界读取 + 总长度）
// - `FileSource`: 本地文件字节源
// - `StreamingEngine`: 按Range语义写出响应
// - `ResponseSink`: 响应写入端抽象
// - `MimeRegistry`: 文件类型到MIME类型的映射

pub mod engine;
pub mod error;
pub mod mime;
pub mod range;
pub mod source;

// 重新导出核心类型
pub use engine::{ResponseHead, ResponseSink, StreamResource, StreamingEngine};
pub use error::{classify_write_error, StreamError};
pub use mime::{MimeError, MimeRegistry};
pub use source::{ByteSource, FileSource};
