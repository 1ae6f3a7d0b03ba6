use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use bytes::Bytes;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use log::{debug, warn};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::http::body::{empty_body, full_body, AsyncReadBody, OutBody};

/// HTTP surface in front of a running RTMP server: an FLV proxy onto the internal `0xFF`
/// back-channel, static serving of the HLS playlist/segments, and the version endpoint.
#[derive(Clone)]
pub struct HttpServer {
    hls_save_path: PathBuf,
    /// `host:port` to dial for the internal FLV sentinel handshake, derived from the
    /// RTMP listener's own configured port (connected to over loopback rather than
    /// whatever the RTMP listener binds, since `0.0.0.0` isn't a valid connect target).
    internal_rtmp_addr: String,
}

impl HttpServer {
    pub fn new(hls_save_path: PathBuf, rtmp_listen: &str) -> Self {
        let port = rtmp_listen.rsplit(':').next().unwrap_or("1935");
        HttpServer {
            hls_save_path,
            internal_rtmp_addr: format!("127.0.0.1:{}", port),
        }
    }

    async fn serve_flv(&self, app: &str, stream: &str) -> Response<OutBody> {
        let mut conn = match TcpStream::connect(&self.internal_rtmp_addr).await {
            Ok(c) => c,
            Err(e) => {
                warn!("flv proxy: failed to dial internal RTMP port: {}", e);
                return not_found();
            }
        };

        let request = json!({"App": app, "Stream": stream, "Client": "http-flv"}).to_string();
        let mut handshake = Vec::with_capacity(2 + request.len());
        handshake.push(0xFF);
        handshake.push(request.len() as u8);
        handshake.extend_from_slice(request.as_bytes());

        if let Err(e) = conn.write_all(&handshake).await {
            warn!("flv proxy: failed to send sentinel handshake: {}", e);
            return not_found();
        }

        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "video/x-flv")
            .header("transfer-encoding", "chunked")
            .header("connection", "keep-alive")
            .header("access-control-allow-origin", "*")
            .body(AsyncReadBody::new(conn).boxed())
            .unwrap()
    }

    async fn serve_m3u8(&self, app: &str, stream: &str) -> Response<OutBody> {
        let dir = self.hls_save_path.join(format!("{}_{}", app, stream));
        let path = dir.join(format!("{}_{}.m3u8", app, stream));
        self.serve_file(&path, "application/vnd.apple.mpegurl").await
    }

    async fn serve_ts(&self, name: &str) -> Response<OutBody> {
        let stem = name.trim_end_matches(".ts");
        let parts: Vec<&str> = stem.splitn(3, '_').collect();
        let (app, stream, _seq) = match parts.as_slice() {
            [app, stream, seq] => (*app, *stream, *seq),
            _ => return not_found(),
        };
        let dir = self.hls_save_path.join(format!("{}_{}", app, stream));
        let path = dir.join(format!("{}.ts", stem));
        self.serve_file(&path, "video/mp2t").await
    }

    async fn serve_file(&self, path: &std::path::Path, content_type: &str) -> Response<OutBody> {
        match tokio::fs::File::open(path).await {
            Ok(file) => Response::builder()
                .status(StatusCode::OK)
                .header("content-type", content_type)
                .header("access-control-allow-origin", "*")
                .body(AsyncReadBody::new(file).boxed())
                .unwrap(),
            Err(e) => {
                debug!("http: {} not found: {}", path.display(), e);
                not_found()
            }
        }
    }

    fn serve_version(&self) -> Response<OutBody> {
        let body = json!({
            "code": 200,
            "msg": format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        })
        .to_string();

        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(full_body(Bytes::from(body)))
            .unwrap()
    }
}

impl hyper::service::Service<Request<Incoming>> for HttpServer {
    type Response = Response<OutBody>;
    type Error = std::io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let server = self.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        Box::pin(async move {
            if method != Method::GET {
                return Ok(not_found());
            }

            if path == "/api/version" {
                return Ok(server.serve_version());
            }

            let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
            let response = match segments.as_slice() {
                [app, name] if name.ends_with(".flv") => {
                    server.serve_flv(app, name.trim_end_matches(".flv")).await
                }
                [app, name] if name.ends_with(".m3u8") => {
                    server.serve_m3u8(app, name.trim_end_matches(".m3u8")).await
                }
                [_app, name] if name.ends_with(".ts") => server.serve_ts(name).await,
                _ => not_found(),
            };

            Ok(response)
        })
    }
}

fn not_found() -> Response<OutBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(empty_body())
        .unwrap()
}
