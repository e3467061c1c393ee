// 音乐流媒体服务器 - 终止信号

use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// 终止信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// 自检模式下的合成信号
    SelfTest,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownSignal::Interrupt => "interrupt",
            ShutdownSignal::Terminate => "terminate",
            ShutdownSignal::SelfTest => "self-test",
        };
        f.write_str(name)
    }
}

/// 持续转发操作系统信号，每次收到都转发一次
///
/// 编排器关闭接收端后结束。
#[cfg(unix)]
pub async fn forward_os_signals(tx: mpsc::Sender<ShutdownSignal>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            None
        }
    };

    loop {
        let received = tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => ShutdownSignal::Interrupt,
                Err(e) => {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
            },
            Some(()) = recv_optional(&mut terminate) => ShutdownSignal::Terminate,
        };

        if tx.send(received).await.is_err() {
            return;
        }
    }
}

#[cfg(not(unix))]
pub async fn forward_os_signals(tx: mpsc::Sender<ShutdownSignal>) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        if tx.send(ShutdownSignal::Interrupt).await.is_err() {
            return;
        }
    }
}

#[cfg(unix)]
async fn recv_optional(stream: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
    match stream {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}

/// 在指定延迟后发送一个合成的终止信号
pub async fn schedule_self_test(tx: mpsc::Sender<ShutdownSignal>, delay: Duration) {
    info!("Self-test mode: shutting down in {:?}", delay);
    tokio::time::sleep(delay).await;
    let _ = tx.send(ShutdownSignal::SelfTest).await;
}
