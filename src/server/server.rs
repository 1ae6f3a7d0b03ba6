use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

use crate::connection::{self, Connection, ConnectionContext};
use crate::handlers::CommandHandlerRegistry;
use crate::server::config::ServerConfig;
use crate::server::context::ServerContext;
use crate::{Error, Result};

pub struct RtmpServer {
    config: Arc<ServerConfig>,
    context: Arc<ServerContext>,
    handlers: Arc<CommandHandlerRegistry>,
    connections: Arc<RwLock<HashMap<String, Arc<Connection>>>>,
    shutdown: Arc<RwLock<bool>>,
}

impl RtmpServer {
    pub fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);
        let context = Arc::new(ServerContext::new(config.clone()));

        RtmpServer {
            config,
            context,
            handlers: Arc::new(CommandHandlerRegistry::new()),
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn context(&self) -> Arc<ServerContext> {
        self.context.clone()
    }

    /// Accept loop for the RTMP port. Every accepted socket is triaged on its first byte:
    /// `0x03` starts an RTMP session, `0xFF` is the internal FLV back-channel used by the
    /// HTTP `.flv` proxy, anything else is closed without a reply.
    pub async fn listen(&self) -> Result<()> {
        let addr = self.config.rtmp_listen.clone();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::connection(format!("failed to bind {}: {}", addr, e)))?;

        info!("RTMP server listening on {}", addr);

        loop {
            if *self.shutdown.read().await {
                break;
            }

            let (stream, peer_addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {}", e);
                    continue;
                }
            };

            if self.connections.read().await.len() >= self.config.max_connections {
                warn!("connection limit reached, rejecting {}", peer_addr);
                drop(stream);
                continue;
            }

            if !self.context.can_accept_from_ip(peer_addr.ip()).await {
                warn!("IP limit reached for {}, rejecting", peer_addr.ip());
                drop(stream);
                continue;
            }

            self.handle_connection(stream, peer_addr).await;
        }

        info!("RTMP server stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY for {}: {}", peer_addr, e);
        }

        let mut first_byte = [0u8; 1];
        let peeked = match stream.peek(&mut first_byte).await {
            Ok(n) => n,
            Err(e) => {
                warn!("failed to peek first byte from {}: {}", peer_addr, e);
                return;
            }
        };
        if peeked == 0 {
            return;
        }

        let conn_id = self.context.generate_connection_id();
        let remote_addr = peer_addr.to_string();
        let ip = peer_addr.ip();
        let registry = self.context.publishers();

        let connections = self.connections.clone();
        let server_context = self.context.clone();
        let conn_id_for_task = conn_id.clone();

        let handle = match first_byte[0] {
            0x03 => {
                let (context, packet_rx) = ConnectionContext::new(
                    conn_id.clone(),
                    remote_addr.clone(),
                    registry,
                    self.config.hls_config(),
                    self.config.gop_cache_max,
                );
                let handlers = self.handlers.clone();

                tokio::spawn(async move {
                    if let Err(e) = connection::run_session(stream, context, packet_rx, handlers).await {
                        warn!("connection {} ended: {}", conn_id_for_task, e);
                    }
                    connections.write().await.remove(&conn_id_for_task);
                    server_context.decrement_ip_count(ip).await;
                    info!("connection {} closed", conn_id_for_task);
                })
            }
            0xFF => tokio::spawn(async move {
                if let Err(e) = connection::run_flv_sentinel(stream, registry).await {
                    warn!("FLV sentinel connection {} ended: {}", conn_id_for_task, e);
                }
                connections.write().await.remove(&conn_id_for_task);
                server_context.decrement_ip_count(ip).await;
                info!("FLV sentinel connection {} closed", conn_id_for_task);
            }),
            other => {
                debug!("connection {}: closing, unrecognized leading byte 0x{:02x}", conn_id, other);
                return;
            }
        };

        self.context.increment_ip_count(ip).await;
        let connection = Connection::new(conn_id.clone(), remote_addr, handle);
        self.connections.write().await.insert(conn_id, connection);
    }

    pub async fn shutdown(&self) {
        info!("shutting down RTMP server");
        *self.shutdown.write().await = true;

        let connections = self.connections.read().await;
        for (id, conn) in connections.iter() {
            debug!("closing connection {}", id);
            conn.close();
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
