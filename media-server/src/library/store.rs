use super::scanner::ScannedSong;
use common::{LibraryError, Result, Song};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 歌曲数据访问接口
pub trait SongStore: Send + Sync {
    /// 按ID读取歌曲，不存在时返回 `LibraryError::SongNotFound`
    fn load_song(&self, id: u64) -> Result<Song>;

    /// 歌曲数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 一次同步的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// 内存媒体库
///
/// 同一路径在多次扫描之间保持相同的ID。
#[derive(Clone)]
pub struct MemoryLibrary {
    songs: Arc<DashMap<u64, Song>>,
    ids: Arc<DashMap<PathBuf, u64>>,
    next_id: Arc<AtomicU64>,
}

impl Default for MemoryLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self {
            songs: Arc::new(DashMap::new()),
            ids: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn id_for(&self, path: &Path) -> u64 {
        *self
            .ids
            .entry(path.to_path_buf())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// 添加或更新一首歌曲，返回其ID
    #[cfg(test)]
    pub fn insert(&self, scanned: ScannedSong) -> u64 {
        let id = self.id_for(&scanned.file_name);
        self.songs.insert(id, scanned.into_song(id));
        id
    }

    /// 用一次完整扫描的结果替换媒体库内容
    pub fn sync(&self, scanned: Vec<ScannedSong>) -> ScanSummary {
        let mut summary = ScanSummary::default();
        let mut seen = HashSet::with_capacity(scanned.len());

        for song in scanned {
            let id = self.id_for(&song.file_name);
            seen.insert(id);

            let unchanged = match self.songs.get(&id) {
                Some(existing) if song.matches(&existing) => true,
                Some(_) => {
                    summary.updated += 1;
                    false
                }
                None => {
                    summary.added += 1;
                    false
                }
            };
            if !unchanged {
                self.songs.insert(id, song.into_song(id));
            }
        }

        let before = self.songs.len();
        self.songs.retain(|id, _| seen.contains(id));
        self.ids.retain(|_, id| seen.contains(id));
        summary.removed = before - self.songs.len();

        summary
    }
}

impl SongStore for MemoryLibrary {
    fn load_song(&self, id: u64) -> Result<Song> {
        self.songs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(LibraryError::SongNotFound(id))
    }

    fn len(&self) -> usize {
        self.songs.len()
    }
}
