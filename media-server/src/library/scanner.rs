use super::tags::{TagReader, TrackTags};
use common::{FileType, LibraryError, Result, Song};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 扫描得到的歌曲文件，尚未分配ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSong {
    pub tags: TrackTags,
    pub file_name: PathBuf,
    pub file_size: u64,
    pub file_type: FileType,
    pub last_modified: SystemTime,
}

impl ScannedSong {
    pub fn into_song(self, id: u64) -> Song {
        Song {
            id,
            artist: self.tags.artist,
            album: self.tags.album,
            title: self.tags.title,
            track: self.tags.track,
            file_name: self.file_name,
            file_size: self.file_size,
            file_type: self.file_type,
            // 码率需要解析音频流才能得到
            bitrate: 0,
            last_modified: self.last_modified,
        }
    }

    /// 与已入库歌曲内容是否一致
    pub fn matches(&self, song: &Song) -> bool {
        self.file_name == song.file_name
            && self.file_size == song.file_size
            && self.last_modified == song.last_modified
            && self.file_type == song.file_type
            && self.tags.artist == song.artist
            && self.tags.album == song.album
            && self.tags.title == song.title
            && self.tags.track == song.track
    }
}

/// 媒体库扫描器（阻塞I/O，在 `spawn_blocking` 中运行）
pub struct LibraryScanner {
    media_root: PathBuf,
    reader: Arc<dyn TagReader>,
}

impl LibraryScanner {
    pub fn new(media_root: PathBuf, reader: Arc<dyn TagReader>) -> Self {
        Self { media_root, reader }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// 扫描媒体根目录
    ///
    /// 根目录不存在时返回错误，调用方保留现有媒体库。
    pub fn scan(&self) -> Result<Vec<ScannedSong>> {
        if !self.media_root.is_dir() {
            return Err(LibraryError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("media root {:?} is not a directory", self.media_root),
            )));
        }

        debug!("Scanning directory: {:?}", self.media_root);
        let mut songs = Vec::new();
        let mut file_count = 0;

        for entry in WalkDir::new(&self.media_root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
        {
            if !entry.file_type().is_file() {
                continue;
            }
            file_count += 1;

            let path = entry.path();
            let Some(file_type) = FileType::from_path(path) else {
                continue;
            };

            match self.parse_song(path, file_type) {
                Ok(song) => songs.push(song),
                Err(LibraryError::MissingTags(_)) => {
                    debug!("Skipping {:?}: required tags missing", path);
                }
                Err(e) => warn!("Failed to read song {:?}: {}", path, e),
            }
        }

        debug!(
            "Scanned {} files in {:?}, {} songs",
            file_count,
            self.media_root,
            songs.len()
        );
        songs.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(songs)
    }

    fn parse_song(&self, path: &Path, file_type: FileType) -> Result<ScannedSong> {
        let tags = self.reader.read_tags(&self.media_root, path)?;
        let metadata = std::fs::metadata(path)?;

        Ok(ScannedSong {
            tags,
            file_name: path.to_path_buf(),
            file_size: metadata.len(),
            file_type,
            last_modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }
}
