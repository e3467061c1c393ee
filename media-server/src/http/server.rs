use super::routes::create_router;
use super::state::AppState;
use crate::lifecycle::{StopListener, Subsystem};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// HTTP服务子系统
pub struct HttpServer {
    addr: SocketAddr,
    state: AppState,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }
}

#[async_trait]
impl Subsystem for HttpServer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn run(self: Box<Self>, stop: StopListener) {
        let (request, ack) = stop.into_parts();

        let listener = match TcpListener::bind(self.addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("http: failed to bind {}: {}", self.addr, e);
                // 只在被要求停止后才确认
                request.await;
                ack.fail(format!("failed to bind {}: {}", self.addr, e));
                return;
            }
        };

        info!("http: listening on {}", self.addr);

        let app = create_router(self.state);
        match axum::serve(listener, app).with_graceful_shutdown(request).await {
            Ok(()) => {
                info!("http: stopped!");
                ack.acknowledge();
            }
            Err(e) => {
                error!("http: server error: {}", e);
                ack.fail(e.to_string());
            }
        }
    }
}
