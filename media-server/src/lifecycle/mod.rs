// 音乐流媒体服务器 - 生命周期模块
//
// # 核心组件
//
// - `Subsystem`: 长期运行组件的统一接口
// - `StopListener`: 子系统一侧的停止请求/确认握手
// - `Orchestrator`: 启动子系统、转发终止信号、收集停止确认
// - `ShutdownSignal`: 操作系统信号与自检信号

pub mod orchestrator;
pub mod signals;
pub mod subsystem;

pub use orchestrator::{LifecycleState, Orchestrator};
pub use signals::{forward_os_signals, schedule_self_test};
pub use subsystem::{StopListener, Subsystem};
