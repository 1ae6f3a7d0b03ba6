mod body;
mod service;

pub use service::HttpServer;

use std::net::SocketAddr;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use log::{error, info, warn};
use tokio::net::TcpListener;

use crate::{Error, Result};

/// Accept loop for the HTTP surface (`.flv`/`.m3u8`/`.ts` serving, `/api/version`).
pub async fn run(addr: &str, server: HttpServer) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::config(format!("invalid HttpListen address {}: {}", addr, e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::connection(format!("failed to bind HTTP listener {}: {}", addr, e)))?;

    info!("HTTP server listening on {}", addr);

    loop {
        let (socket, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("HTTP accept error: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(socket);
        let server = server.clone();
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new().serve_connection(io, server).await {
                error!("HTTP connection error: {}", e);
            }
        });
    }
}
