// 音乐流媒体服务器 - 转码子系统
//
// 启动后在后台探测一次转码能力并发布；收到停止请求时放弃未完成的探测。

use super::capability::{CapabilityCell, CapabilityProbe};
use crate::lifecycle::{StopListener, Subsystem};
use async_trait::async_trait;
use tracing::{debug, info};

pub struct TranscodeSubsystem {
    probe: CapabilityProbe,
    cell: CapabilityCell,
}

impl TranscodeSubsystem {
    pub fn new(probe: CapabilityProbe, cell: CapabilityCell) -> Self {
        Self { probe, cell }
    }
}

#[async_trait]
impl Subsystem for TranscodeSubsystem {
    fn name(&self) -> &'static str {
        "transcode"
    }

    async fn run(self: Box<Self>, mut stop: StopListener) {
        let Self { probe, cell } = *self;

        let mut probe_task = tokio::spawn(async move {
            let state = probe.probe().await;
            if !cell.publish(state) {
                debug!("transcode: capability already published");
            }
        });

        tokio::select! {
            _ = &mut probe_task => {
                stop.requested().await;
            }
            _ = stop.requested() => {
                if !probe_task.is_finished() {
                    // 丢弃探测 future 时探测子进程随之被终止
                    probe_task.abort();
                    debug!("transcode: probe aborted");
                }
            }
        }

        info!("transcode: stopped!");
        stop.acknowledge();
    }
}
