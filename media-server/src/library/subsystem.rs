// 音乐流媒体服务器 - 媒体库子系统
//
// 启动时扫描一次媒体根目录，之后按配置的间隔定期重新扫描。

use super::scanner::LibraryScanner;
use super::store::{MemoryLibrary, SongStore};
use crate::lifecycle::{StopListener, Subsystem};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct LibrarySubsystem {
    scanner: Arc<LibraryScanner>,
    library: MemoryLibrary,
    rescan_interval: Option<Duration>,
}

impl LibrarySubsystem {
    /// `rescan_interval` 为 `None` 时只在启动时扫描
    pub fn new(scanner: LibraryScanner, library: MemoryLibrary, rescan_interval: Option<Duration>) -> Self {
        Self {
            scanner: Arc::new(scanner),
            library,
            rescan_interval,
        }
    }
}

/// 扫描并同步到媒体库
async fn rescan(scanner: Arc<LibraryScanner>, library: MemoryLibrary) {
    let root = scanner.media_root().to_path_buf();
    let result = tokio::task::spawn_blocking(move || scanner.scan()).await;

    match result {
        Ok(Ok(songs)) => {
            let summary = library.sync(songs);
            info!(
                "library: scan of {:?} complete, {} songs ({} added, {} updated, {} removed)",
                root,
                library.len(),
                summary.added,
                summary.updated,
                summary.removed
            );
            if library.is_empty() {
                warn!("library: no songs found under {:?}", root);
            }
        }
        Ok(Err(e)) => warn!("library: scan of {:?} failed: {}", root, e),
        Err(e) => error!("library: scan task failed: {}", e),
    }
}

#[async_trait]
impl Subsystem for LibrarySubsystem {
    fn name(&self) -> &'static str {
        "library"
    }

    async fn run(self: Box<Self>, mut stop: StopListener) {
        tokio::select! {
            _ = rescan(self.scanner.clone(), self.library.clone()) => {}
            _ = stop.requested() => {
                info!("library: stopped!");
                stop.acknowledge();
                return;
            }
        }

        if let Some(period) = self.rescan_interval {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        rescan(self.scanner.clone(), self.library.clone()).await;
                    }
                    _ = stop.requested() => break,
                }
            }
        } else {
            stop.requested().await;
        }

        info!("library: stopped!");
        stop.acknowledge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::scanner::tests::write_song;
    use crate::library::tags::PathTagReader;
    use crate::lifecycle::orchestrator::ExitStatus;
    use crate::lifecycle::signals::ShutdownSignal;
    use crate::lifecycle::Orchestrator;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    async fn wait_for_len(library: &MemoryLibrary, len: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while library.len() != len {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_initial_scan_and_rescan() {
        let dir = TempDir::new().unwrap();
        write_song(dir.path(), "Artist/Album/01 - One.flac", b"one");

        let library = MemoryLibrary::new();
        let scanner = LibraryScanner::new(dir.path().to_path_buf(), Arc::new(PathTagReader));

        let mut orchestrator = Orchestrator::new();
        orchestrator.register(LibrarySubsystem::new(
            scanner,
            library.clone(),
            Some(Duration::from_millis(50)),
        ));

        let (tx, rx) = mpsc::channel(1);
        let run = tokio::spawn(orchestrator.run(rx));

        wait_for_len(&library, 1).await;
        assert_eq!(library.load_song(1).unwrap().title, "One");

        write_song(dir.path(), "Artist/Album/02 - Two.flac", b"two");
        wait_for_len(&library, 2).await;

        tx.send(ShutdownSignal::Interrupt).await.unwrap();
        assert_eq!(run.await.unwrap(), ExitStatus::Graceful);
    }

    #[tokio::test]
    async fn test_missing_root_keeps_running() {
        let dir = TempDir::new().unwrap();
        let library = MemoryLibrary::new();
        let scanner = LibraryScanner::new(dir.path().join("missing"), Arc::new(PathTagReader));

        let mut orchestrator = Orchestrator::new();
        orchestrator.register(LibrarySubsystem::new(scanner, library.clone(), None));

        let (tx, rx) = mpsc::channel(1);
        let run = tokio::spawn(orchestrator.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;

        tx.send(ShutdownSignal::Terminate).await.unwrap();
        assert_eq!(run.await.unwrap(), ExitStatus::Graceful);
        assert!(library.is_empty());
    }
}
