use super::capability::TranscodeCodec;
use crate::streaming::ByteSource;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command as AsyncCommand};
use tracing::debug;

/// 默认转码码率（kbps）
pub const DEFAULT_BITRATE: u32 = 192;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("transcoding is currently disabled")]
    Disabled,

    #[error("unknown transcoding codec: {0}")]
    UnknownCodec(String),

    #[error("codec {0} is not supported by the transcoder")]
    CodecUnavailable(TranscodeCodec),

    #[error("invalid transcoding quality: {0}")]
    InvalidQuality(String),

    #[error("variable bitrate is not supported for {0}")]
    VbrUnsupported(TranscodeCodec),

    #[error("failed to start transcoder: {0}")]
    Spawn(#[from] io::Error),
}

/// 转码质量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// 固定码率（kbps）
    Cbr(u32),
    /// LAME VBR 等级 V0-V9
    Vbr(u8),
}

impl Quality {
    /// 名义码率（kbps），VBR取LAME各等级的平均码率
    pub fn nominal_bitrate(&self) -> u32 {
        const VBR_AVERAGE: [u32; 10] = [245, 225, 190, 175, 165, 130, 115, 100, 85, 65];
        match self {
            Quality::Cbr(kbps) => *kbps,
            Quality::Vbr(level) => VBR_AVERAGE
                .get(usize::from(*level))
                .copied()
                .unwrap_or(DEFAULT_BITRATE),
        }
    }

    fn args(&self) -> [String; 2] {
        match self {
            Quality::Cbr(kbps) => ["-b:a".to_string(), format!("{}k", kbps)],
            Quality::Vbr(level) => ["-q:a".to_string(), level.to_string()],
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Cbr(DEFAULT_BITRATE)
    }
}

impl FromStr for Quality {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TranscodeError::InvalidQuality(s.to_string());

        if let Some(level) = s.strip_prefix(&['V', 'v'][..]) {
            let level: u8 = level.parse().map_err(|_| invalid())?;
            return if level <= 9 { Ok(Quality::Vbr(level)) } else { Err(invalid()) };
        }

        let kbps: u32 = s.trim_end_matches(&['k', 'K'][..]).parse().map_err(|_| invalid())?;
        if (32..=320).contains(&kbps) {
            Ok(Quality::Cbr(kbps))
        } else {
            Err(invalid())
        }
    }
}

/// 转码参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub codec: TranscodeCodec,
    pub quality: Quality,
}

impl TranscodeOptions {
    /// 从查询参数解析，缺省为192kbps的MP3
    pub fn parse(codec: Option<&str>, quality: Option<&str>) -> Result<Self, TranscodeError> {
        let codec = match codec {
            Some(codec) => codec.parse()?,
            None => TranscodeCodec::Mp3,
        };
        let quality = match quality {
            Some(quality) => quality.parse()?,
            None => Quality::default(),
        };

        if matches!(quality, Quality::Vbr(_)) && codec != TranscodeCodec::Mp3 {
            return Err(TranscodeError::VbrUnsupported(codec));
        }

        Ok(Self { codec, quality })
    }

    /// ffmpeg命令行参数，输出写到标准输出
    pub fn args(&self, input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-loglevel".into(),
            "quiet".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-map".into(),
            "0:0".into(),
            "-codec:a".into(),
            self.codec.ffmpeg_codec().into(),
        ];
        args.extend(self.quality.args().into_iter().map(OsString::from));
        args.extend(["-f".into(), self.codec.container().into(), "-".into()]);
        args
    }
}

/// 转码进程输出字节源
///
/// 长度未知，只能从头顺序读取。被丢弃时转码进程随之结束。
#[derive(Debug)]
pub struct TranscodeSource {
    // 丢弃时终止子进程
    child: Child,
    stdout: ChildStdout,
    position: u64,
}

impl TranscodeSource {
    pub fn spawn(binary: &Path, input: &Path, options: &TranscodeOptions) -> Result<Self, TranscodeError> {
        let mut child = AsyncCommand::new(binary)
            .args(options.args(input))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "transcoder stdout unavailable"))?;

        debug!(
            "Started transcoder {:?} for {:?} ({} {:?})",
            binary, input, options.codec, options.quality
        );

        Ok(Self {
            child,
            stdout,
            position: 0,
        })
    }
}

#[async_trait]
impl ByteSource for TranscodeSource {
    fn size(&self) -> Option<u64> {
        None
    }

    async fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        if offset == self.position {
            return Ok(());
        }
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "transcoded streams cannot seek",
        ))
    }

    /// 输出结束时检查转码进程的退出状态，非零退出返回错误
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stdout.read(buf).await?;
        if n == 0 && !buf.is_empty() {
            let status = self.child.wait().await?;
            if !status.success() {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("transcoder exited with {}", status),
                ));
            }
        }
        self.position += n as u64;
        Ok(n)
    }
}
