// 音乐流媒体服务器 - Transcode模块
//
// # 核心组件
//
// - `CapabilityProbe` / `CapabilityCell`: 转码程序探测与一次性发布
// - `TranscodeOptions`: 目标编码与质量
// - `TranscodeSource`: 转码进程输出字节源
// - `TranscodeSubsystem`: 在后台运行探测的子系统

pub mod capability;
pub mod ffmpeg;
pub mod subsystem;

pub use capability::{CapabilityCell, CapabilityProbe, CapabilityState};
pub use ffmpeg::{TranscodeError, TranscodeOptions, TranscodeSource};
pub use subsystem::TranscodeSubsystem;
