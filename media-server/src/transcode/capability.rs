// 音乐流媒体服务器 - 转码能力探测
//
// 启动时探测一次外部转码程序（ffmpeg）及其支持的编码器，结果只发布一次，
// 之后所有请求并发读取同一个快照。发布之前的读取者看到的是禁用状态。

use super::ffmpeg::TranscodeError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{info, warn};

/// 转码目标编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeCodec {
    Mp3,
    Ogg,
    Opus,
}

impl TranscodeCodec {
    pub const ALL: [TranscodeCodec; 3] = [TranscodeCodec::Mp3, TranscodeCodec::Ogg, TranscodeCodec::Opus];

    /// ffmpeg编码器名称
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            TranscodeCodec::Mp3 => "libmp3lame",
            TranscodeCodec::Ogg => "libvorbis",
            TranscodeCodec::Opus => "libopus",
        }
    }

    /// ffmpeg输出容器格式
    pub fn container(&self) -> &'static str {
        match self {
            TranscodeCodec::Mp3 => "mp3",
            TranscodeCodec::Ogg | TranscodeCodec::Opus => "ogg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TranscodeCodec::Mp3 => "audio/mpeg",
            TranscodeCodec::Ogg | TranscodeCodec::Opus => "audio/ogg",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TranscodeCodec::Mp3 => "MP3",
            TranscodeCodec::Ogg => "OGG",
            TranscodeCodec::Opus => "OPUS",
        }
    }
}

impl fmt::Display for TranscodeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TranscodeCodec {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(TranscodeCodec::Mp3),
            "ogg" | "vorbis" => Ok(TranscodeCodec::Ogg),
            "opus" => Ok(TranscodeCodec::Opus),
            _ => Err(TranscodeError::UnknownCodec(s.to_string())),
        }
    }
}

/// 转码能力快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityState {
    pub enabled: bool,
    pub binary_path: Option<PathBuf>,
    pub codecs: BTreeSet<TranscodeCodec>,
}

static DISABLED: CapabilityState = CapabilityState::disabled();

impl CapabilityState {
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            binary_path: None,
            codecs: BTreeSet::new(),
        }
    }

    /// 返回可用于指定编码的转码程序路径
    pub fn binary_for(&self, codec: TranscodeCodec) -> Result<&Path, TranscodeError> {
        if !self.enabled {
            return Err(TranscodeError::Disabled);
        }
        match (&self.binary_path, self.codecs.contains(&codec)) {
            (Some(path), true) => Ok(path),
            (Some(_), false) => Err(TranscodeError::CodecUnavailable(codec)),
            (None, _) => Err(TranscodeError::Disabled),
        }
    }
}

impl Default for CapabilityState {
    fn default() -> Self {
        Self::disabled()
    }
}

/// 只写一次、可并发读取的能力状态
#[derive(Debug, Clone, Default)]
pub struct CapabilityCell {
    inner: Arc<OnceLock<CapabilityState>>,
}

impl CapabilityCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布探测结果，只有第一次发布生效
    pub fn publish(&self, state: CapabilityState) -> bool {
        self.inner.set(state).is_ok()
    }

    /// 当前快照，未发布时为禁用状态
    pub fn snapshot(&self) -> &CapabilityState {
        self.inner.get().unwrap_or(&DISABLED)
    }

    pub fn is_published(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// 转码能力探测器
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    binary: String,
    search_path: Option<OsString>,
    timeout: Duration,
}

impl CapabilityProbe {
    /// 在 `PATH` 中查找 `binary`
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            search_path: None,
            timeout,
        }
    }

    /// 使用自定义搜索路径代替 `PATH`
    #[cfg(test)]
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// 探测转码能力
    ///
    /// 任何一步失败都返回禁用状态；找到程序但无法调用与找不到程序的处理方式相同。
    pub async fn probe(&self) -> CapabilityState {
        let mut state = CapabilityState::disabled();

        let Some(path) = self.locate() else {
            warn!(
                "transcode: cannot find {}, transcoding will be disabled",
                self.binary
            );
            return state;
        };

        info!("transcode: found {}: {:?}", self.binary, path);

        let Some(listing) = self.list_codecs(&path).await else {
            warn!(
                "transcode: could not detect {} codecs, transcoding will be disabled",
                self.binary
            );
            return state;
        };

        for codec in TranscodeCodec::ALL {
            if listing.contains(codec.ffmpeg_codec()) {
                info!("transcode: {} found, enabling {} transcoding", codec.ffmpeg_codec(), codec);
                state.codecs.insert(codec);
            } else {
                info!("transcode: {} not found, disabling {} transcoding", codec.ffmpeg_codec(), codec);
            }
        }

        state.binary_path = Some(path);
        state.enabled = true;
        state
    }

    fn locate(&self) -> Option<PathBuf> {
        let search_path = match &self.search_path {
            Some(path) => path.clone(),
            None => std::env::var_os("PATH").unwrap_or_default(),
        };
        find_executable(&self.binary, &search_path)
    }

    /// 以只读方式运行 `-codecs`，返回其输出
    async fn list_codecs(&self, path: &Path) -> Option<String> {
        let command = AsyncCommand::new(path)
            .args(["-loglevel", "quiet", "-codecs"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, command).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("transcode: failed to execute {:?}: {}", path, e);
                return None;
            }
            Err(_) => {
                warn!("transcode: {:?} timed out after {:?}", path, self.timeout);
                return None;
            }
        };

        if !output.status.success() {
            warn!("transcode: {:?} exited with {}", path, output.status);
            return None;
        }

        match String::from_utf8(output.stdout) {
            Ok(listing) if !listing.trim().is_empty() => Some(listing),
            Ok(_) => None,
            Err(e) => {
                warn!("transcode: unreadable codec listing: {}", e);
                None
            }
        }
    }
}

/// 在搜索路径中查找可执行文件
///
/// 名称中含路径分隔符时直接检查该路径。
pub fn find_executable(binary: &str, search_path: &OsStr) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| executable_names(binary).into_iter().map(move |name| dir.join(name)))
        .find(|path| is_executable(path))
}

#[cfg(windows)]
fn executable_names(binary: &str) -> Vec<String> {
    vec![binary.to_string(), format!("{}.exe", binary)]
}

#[cfg(not(windows))]
fn executable_names(binary: &str) -> Vec<String> {
    vec![binary.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
