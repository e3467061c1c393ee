// 音乐流媒体服务器 - Subsystem Trait定义
//
// 每个长期运行的子系统都实现 `Subsystem`。编排器通过一对一次性通道与子系统握手：
// 编排器发送停止请求，子系统完成清理后发送确认。确认只能发送一次，由类型保证。

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// 子系统停止结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// 正常停止
    Clean,
    /// 子系统运行期间发生的故障
    Failed(String),
}

/// 子系统
///
/// 子系统自行处理内部错误，只通过停止确认向编排器报告结果。
#[async_trait]
pub trait Subsystem: Send + 'static {
    /// 子系统名称，用于日志
    fn name(&self) -> &'static str;

    /// 运行子系统，直到收到停止请求并确认
    async fn run(self: Box<Self>, stop: StopListener);
}

/// 停止请求，可作为 future 等待
///
/// 编排器被丢弃时同样视为停止请求。
#[derive(Debug)]
pub struct StopRequest {
    rx: Option<oneshot::Receiver<()>>,
}

impl Future for StopRequest {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.rx.as_mut() {
            Some(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(_) => {
                    self.rx = None;
                    Poll::Ready(())
                }
                Poll::Pending => Poll::Pending,
            },
            None => Poll::Ready(()),
        }
    }
}

/// 停止确认
#[derive(Debug)]
pub struct Acknowledger {
    name: &'static str,
    tx: oneshot::Sender<StopOutcome>,
}

impl Acknowledger {
    /// 确认正常停止
    pub fn acknowledge(self) {
        self.finish(StopOutcome::Clean);
    }

    /// 确认停止，并报告故障
    pub fn fail(self, reason: impl Into<String>) {
        self.finish(StopOutcome::Failed(reason.into()));
    }

    fn finish(self, outcome: StopOutcome) {
        debug!("Subsystem {} acknowledged stop: {:?}", self.name, outcome);
        // 编排器已经强制退出时接收端不存在，忽略即可
        let _ = self.tx.send(outcome);
    }
}

/// 子系统一侧的握手端
#[derive(Debug)]
pub struct StopListener {
    request: StopRequest,
    ack: Acknowledger,
}

impl StopListener {
    /// 等待停止请求（可取消，可重复调用）
    pub async fn requested(&mut self) {
        (&mut self.request).await
    }

    /// 拆分为停止请求和确认两部分
    pub fn into_parts(self) -> (StopRequest, Acknowledger) {
        (self.request, self.ack)
    }

    pub fn acknowledge(self) {
        self.ack.acknowledge();
    }
}

/// 编排器一侧的子系统句柄
#[derive(Debug)]
pub(crate) struct SubsystemHandle {
    name: &'static str,
    stop_tx: Option<oneshot::Sender<()>>,
    ack_rx: oneshot::Receiver<StopOutcome>,
    task: JoinHandle<()>,
}

impl SubsystemHandle {
    /// 在独立任务中启动子系统
    pub(crate) fn spawn(subsystem: Box<dyn Subsystem>) -> Self {
        let name = subsystem.name();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (ack_tx, ack_rx) = oneshot::channel();

        let listener = StopListener {
            request: StopRequest { rx: Some(stop_rx) },
            ack: Acknowledger { name, tx: ack_tx },
        };

        let task = tokio::spawn(subsystem.run(listener));

        Self {
            name,
            stop_tx: Some(stop_tx),
            ack_rx,
            task,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// 发送停止请求（只发送一次）
    pub(crate) fn request_stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// 等待停止确认
    ///
    /// 子系统未确认就退出（包括panic）时视为故障。
    pub(crate) async fn stopped(self) -> (&'static str, StopOutcome) {
        let outcome = match self.ack_rx.await {
            Ok(outcome) => outcome,
            Err(_) => match self.task.await {
                Err(e) if e.is_panic() => StopOutcome::Failed("panicked".to_string()),
                _ => StopOutcome::Failed("exited without acknowledging stop".to_string()),
            },
        };
        (self.name, outcome)
    }
}
