// 音乐流媒体服务器 - 子系统编排器
//
// 编排器负责启动所有子系统、等待终止信号、协调停止并给出进程退出码。
//
// # 状态
//
// Starting → Running → StoppingGraceful → Stopped
//                             └──(第二个信号)──→ ForceStopped

use super::signals::ShutdownSignal;
use super::subsystem::{StopOutcome, Subsystem, SubsystemHandle};
use futures::future::join_all;
use std::fmt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// 编排器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    StoppingGraceful,
    Stopped,
    ForceStopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::StoppingGraceful => "stopping",
            LifecycleState::Stopped => "stopped",
            LifecycleState::ForceStopped => "force-stopped",
        };
        f.write_str(name)
    }
}

/// 进程退出状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// 所有子系统正常确认停止
    Graceful,
    /// 所有子系统都已确认，但有子系统报告了故障
    SubsystemFailure(Vec<String>),
    /// 停止过程中收到第二个信号
    Forced,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Graceful => 0,
            ExitStatus::Forced => 1,
            ExitStatus::SubsystemFailure(_) => 2,
        }
    }
}

/// 子系统编排器
pub struct Orchestrator {
    subsystems: Vec<Box<dyn Subsystem>>,
    state_tx: watch::Sender<LifecycleState>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Starting);
        Self {
            subsystems: Vec::new(),
            state_tx,
        }
    }

    /// 注册子系统
    pub fn register(&mut self, subsystem: impl Subsystem) -> &mut Self {
        self.subsystems.push(Box::new(subsystem));
        self
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: LifecycleState) {
        info!("orchestrator: {}", state);
        self.state_tx.send_replace(state);
    }

    /// 运行直到所有子系统停止
    ///
    /// 第一个信号触发协调停止；所有确认收齐之前再收到信号则立即返回 `ExitStatus::Forced`。
    /// 信号通道关闭等同于收到停止信号。
    pub async fn run(mut self, mut signals: mpsc::Receiver<ShutdownSignal>) -> ExitStatus {
        self.set_state(LifecycleState::Starting);

        let mut handles: Vec<SubsystemHandle> = std::mem::take(&mut self.subsystems)
            .into_iter()
            .map(|subsystem| {
                info!("{}: starting...", subsystem.name());
                SubsystemHandle::spawn(subsystem)
            })
            .collect();

        self.set_state(LifecycleState::Running);

        match signals.recv().await {
            Some(signal) => info!("orchestrator: caught signal: {}", signal),
            None => warn!("orchestrator: signal channel closed, stopping"),
        }

        self.set_state(LifecycleState::StoppingGraceful);

        for handle in handles.iter_mut() {
            debug!("{}: stop requested", handle.name());
            handle.request_stop();
        }

        let stopped = join_all(handles.into_iter().map(SubsystemHandle::stopped));
        tokio::pin!(stopped);

        let outcomes = loop {
            tokio::select! {
                outcomes = &mut stopped => break outcomes,
                Some(signal) = signals.recv() => {
                    warn!("orchestrator: caught signal: {}, force halting now!", signal);
                    self.set_state(LifecycleState::ForceStopped);
                    return ExitStatus::Forced;
                }
            }
        };

        let failures: Vec<String> = outcomes
            .into_iter()
            .filter_map(|(name, outcome)| match outcome {
                StopOutcome::Clean => {
                    info!("{}: stopped!", name);
                    None
                }
                StopOutcome::Failed(reason) => {
                    error!("{}: stopped with failure: {}", name, reason);
                    Some(format!("{}: {}", name, reason))
                }
            })
            .collect();

        self.set_state(LifecycleState::Stopped);

        if failures.is_empty() {
            ExitStatus::Graceful
        } else {
            ExitStatus::SubsystemFailure(failures)
        }
    }
}
