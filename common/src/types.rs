use crate::error::LibraryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// 可索引的音频文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Ape,
    Flac,
    M4a,
    Mp3,
    Mpc,
    Ogg,
    Wma,
    Wv,
}

impl FileType {
    pub const ALL: [FileType; 8] = [
        FileType::Ape,
        FileType::Flac,
        FileType::M4a,
        FileType::Mp3,
        FileType::Mpc,
        FileType::Ogg,
        FileType::Wma,
        FileType::Wv,
    ];

    /// 文件扩展名（不含点）
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Ape => "ape",
            FileType::Flac => "flac",
            FileType::M4a => "m4a",
            FileType::Mp3 => "mp3",
            FileType::Mpc => "mpc",
            FileType::Ogg => "ogg",
            FileType::Wma => "wma",
            FileType::Wv => "wv",
        }
    }

    /// 用于日志和展示的编码名称
    pub fn codec_name(&self) -> &'static str {
        match self {
            FileType::Ape => "APE",
            FileType::Flac => "FLAC",
            FileType::M4a => "M4A",
            FileType::Mp3 => "MP3",
            FileType::Mpc => "MPC",
            FileType::Ogg => "OGG",
            FileType::Wma => "WMA",
            FileType::Wv => "WV",
        }
    }

    /// 默认MIME类型
    ///
    /// 已注册的类型使用IANA名称，其余使用常见的 `x-` 前缀写法。
    /// 服务端可以通过配置覆盖这些值。
    pub fn mime_type(&self) -> &'static str {
        match self {
            FileType::Ape => "audio/x-ape",
            FileType::Flac => "audio/flac",
            FileType::M4a => "audio/mp4",
            FileType::Mp3 => "audio/mpeg",
            FileType::Mpc => "audio/x-musepack",
            FileType::Ogg => "audio/ogg",
            FileType::Wma => "audio/x-ms-wma",
            FileType::Wv => "audio/x-wavpack",
        }
    }

    /// 根据扩展名识别文件类型（大小写不敏感，可带前导点）
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|t| t.extension().eq_ignore_ascii_case(ext))
    }

    /// 根据文件路径识别文件类型
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec_name())
    }
}

impl FromStr for FileType {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| LibraryError::UnknownFileType(s.to_string()))
    }
}

/// 曲目信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: u64,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub track: Option<u32>,
    pub file_name: PathBuf,
    pub file_size: u64,
    pub file_type: FileType,
    /// 码率（kbps），未知时为0
    pub bitrate: u32,
    pub last_modified: SystemTime,
}

impl Song {
    /// 日志中使用的展示名称
    pub fn display_label(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_extension("flac"), Some(FileType::Flac));
        assert_eq!(FileType::from_extension(".MP3"), Some(FileType::Mp3));
        assert_eq!(FileType::from_extension("wav"), None);
    }

    #[test]
    fn test_file_type_from_path() {
        let path = Path::new("/music/Artist/Album/01 - Song.Ogg");
        assert_eq!(FileType::from_path(path), Some(FileType::Ogg));
        assert_eq!(FileType::from_path(Path::new("/music/cover.jpg")), None);
        assert_eq!(FileType::from_path(Path::new("/music/README")), None);
    }

    #[test]
    fn test_file_type_from_str() {
        assert_eq!("wv".parse::<FileType>().unwrap(), FileType::Wv);
        assert!(matches!(
            "mod".parse::<FileType>(),
            Err(LibraryError::UnknownFileType(_))
        ));
    }

    #[test]
    fn test_mime_types_are_audio() {
        for file_type in FileType::ALL {
            assert!(file_type.mime_type().starts_with("audio/"));
        }
    }

    #[test]
    fn test_song_serialization() {
        let song = Song {
            id: 42,
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            title: "Title".to_string(),
            track: Some(3),
            file_name: PathBuf::from("/music/a.flac"),
            file_size: 1000,
            file_type: FileType::Flac,
            bitrate: 900,
            last_modified: SystemTime::UNIX_EPOCH,
        };

        assert_eq!(song.display_label(), "Artist - Title");

        let json = serde_json::to_value(&song).unwrap();
        assert_eq!(json["fileSize"], 1000);
        assert_eq!(json["fileType"], "flac");
    }
}
