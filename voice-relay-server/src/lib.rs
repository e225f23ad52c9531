//! HTTP helper that issues LiveKit access tokens to browser clients.
//!
//! | Route | Method | Description |
//! |-------|--------|-------------|
//! | `/api/token` | GET | Token for `?identity=&room=&name=` |
//! | `/api/token` | POST | Token for a JSON body with the same fields |
//! | `/health`, `/api/health` | GET | Liveness |
//! | anything else | GET | Static files, when a directory is configured |

pub mod config;
pub mod error;
pub mod rest;

use std::future::Future;

pub use config::ServerConfig;
pub use error::TokenError;
pub use rest::{TokenController, TokenRequest, TokenResponse, create_app};

/// Bind `config.addr()` and serve until `shutdown` resolves.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.addr();
    let credentials = config.issuer().is_some();
    let app = create_app(config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, credentials, "Token server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    tracing::info!("Token server stopped");
    Ok(())
}
