// 音乐流媒体服务器 - ByteSource Trait定义
//
// 本模块定义了统一的字节源抽象接口。流引擎只依赖定位、有界读取和总长度三种能力，
// 因此无论数据来自本地文件还是转码进程的输出管道，都走相同的代码路径。

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// 字节源
///
/// 每个请求独占一个字节源，请求结束（成功、出错或客户端断开）时随所有权一起释放。
#[async_trait]
pub trait ByteSource: Send {
    /// 总长度（字节），未知时返回 `None`（例如实时转码输出）
    fn size(&self) -> Option<u64>;

    /// 定位到指定字节偏移量
    async fn seek_to(&mut self, offset: u64) -> io::Result<()>;

    /// 读取最多 `buf.len()` 个字节，返回0表示已到末尾
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// 本地文件字节源
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    /// 打开文件并读取其长度
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();

        debug!("Opened file for streaming: {:?}, size: {} bytes", path, size);

        Ok(Self { file, size })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    async fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(io::SeekFrom::Start(offset)).await?;
        Ok(())
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf).await
    }
}
