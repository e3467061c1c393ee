pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod streaming;

pub use server::HttpServer;
pub use state::AppState;
