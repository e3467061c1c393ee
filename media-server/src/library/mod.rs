// 音乐流媒体服务器 - Library模块
//
// # 核心组件
//
// - `SongStore`: 按ID读取歌曲的数据访问接口
// - `MemoryLibrary`: 基于DashMap的内存媒体库
// - `LibraryScanner`: 遍历媒体根目录
// - `TagReader` / `PathTagReader`: 标签读取
// - `LibrarySubsystem`: 启动扫描与定期重新扫描

pub mod scanner;
pub mod store;
pub mod subsystem;
pub mod tags;

pub use scanner::LibraryScanner;
pub use store::{MemoryLibrary, SongStore};
pub use subsystem::LibrarySubsystem;
pub use tags::PathTagReader;
