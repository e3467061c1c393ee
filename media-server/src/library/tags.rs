// 音乐流媒体服务器 - 标签读取

use common::{LibraryError, Result};
use std::path::{Component, Path};

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// 歌曲标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub track: Option<u32>,
}

/// 标签读取接口
///
/// 无法得到标题时返回 `LibraryError::MissingTags`，扫描器跳过该文件。
pub trait TagReader: Send + Sync {
    fn read_tags(&self, root: &Path, path: &Path) -> Result<TrackTags>;
}

/// 从目录结构推导标签：`艺术家/专辑/NN - 标题.ext`
///
/// 层级不足时艺术家和专辑使用占位名称。
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTagReader;

impl TagReader for PathTagReader {
    fn read_tags(&self, root: &Path, path: &Path) -> Result<TrackTags> {
        let relative = path.strip_prefix(root).unwrap_or(path);

        let dirs: Vec<String> = relative
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (track, title) = split_track_number(&stem);

        if title.is_empty() {
            return Err(LibraryError::MissingTags(path.to_path_buf()));
        }

        // 最深的两级目录分别是艺术家和专辑
        let (artist, album) = match dirs.as_slice() {
            [] => (UNKNOWN_ARTIST.to_string(), UNKNOWN_ALBUM.to_string()),
            [artist] => (artist.clone(), UNKNOWN_ALBUM.to_string()),
            [.., artist, album] => (artist.clone(), album.clone()),
        };

        Ok(TrackTags {
            artist,
            album,
            title: title.to_string(),
            track,
        })
    }
}

/// `"03 - Title"` → `(Some(3), "Title")`
fn split_track_number(stem: &str) -> (Option<u32>, &str) {
    let digits = stem.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return (None, stem.trim());
    }

    let rest = &stem[digits..];
    let title = rest.trim_start_matches(|c: char| c == ' ' || c == '-' || c == '.' || c == '_');
    if title.len() == rest.len() || title.trim().is_empty() {
        // 纯数字或数字后没有分隔符，整个文件名都是标题
        return (None, stem.trim());
    }

    (stem[..digits].parse().ok(), title.trim())
}
