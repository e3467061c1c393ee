mod config;
mod http;
mod library;
mod lifecycle;
mod streaming;
mod transcode;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 自检模式下自动停止前的运行时间
const SELF_TEST_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("🚀 Media server starting...");

    // 加载配置
    let cli = config::Cli::parse();
    let mut config = config::Config::load(cli.config.as_deref())?;
    config.apply(&cli);
    let listen_addr = config.listen_addr()?;
    info!("✓ Configuration loaded");

    let mut orchestrator = lifecycle::Orchestrator::new();

    // 创建共享状态
    let library = library::MemoryLibrary::new();
    let capability = transcode::CapabilityCell::new();
    let engine = streaming::StreamingEngine::new(config.stream.chunk_size);
    info!("✓ Streaming engine ready ({} byte chunks)", engine.chunk_size());

    let state = http::AppState::new(
        Arc::new(library.clone()),
        engine,
        capability.clone(),
        config.mime_registry()?,
        orchestrator.subscribe(),
    );

    // 注册子系统
    orchestrator
        .register(library::LibrarySubsystem::new(
            library::LibraryScanner::new(
                config.library.media_root.clone(),
                Arc::new(library::PathTagReader),
            ),
            library,
            config.rescan_interval(),
        ))
        .register(transcode::TranscodeSubsystem::new(
            transcode::CapabilityProbe::new(config.transcode.binary.clone(), config.probe_timeout()),
            capability,
        ))
        .register(http::HttpServer::new(listen_addr, state));

    // 终止信号
    let (signal_tx, signal_rx) = mpsc::channel(4);
    tokio::spawn(lifecycle::forward_os_signals(signal_tx.clone()));
    if cli.test {
        tokio::spawn(lifecycle::schedule_self_test(signal_tx.clone(), SELF_TEST_DELAY));
    }
    drop(signal_tx);

    info!("✅ Media server ready!");

    let status = orchestrator.run(signal_rx).await;
    info!("Media server exiting with status {}", status.code());
    std::process::exit(status.code());
}
