use std::path::PathBuf;

use live_media::http::{self, HttpServer};
use live_media::{RtmpServer, ServerConfig};
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(contents) => match ServerConfig::from_json_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    error!("invalid config file {}: {}", path, e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                error!("failed to read config file {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    info!(
        "starting {} {} (rtmp {}, http {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.rtmp_listen,
        config.http_listen,
    );

    let http_listen = config.http_listen.clone();
    let http_server = HttpServer::new(PathBuf::from(config.hls_save_path.clone()), &config.rtmp_listen);

    let rtmp_server = RtmpServer::new(config);

    let rtmp_task = tokio::spawn(async move {
        if let Err(e) = rtmp_server.listen().await {
            error!("RTMP server stopped: {}", e);
        }
    });

    let http_task = tokio::spawn(async move {
        if let Err(e) = http::run(&http_listen, http_server).await {
            error!("HTTP server stopped: {}", e);
        }
    });

    let _ = tokio::join!(rtmp_task, http_task);
}
