use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};

use crate::hls::HlsConfig;
use crate::protocol::RtmpPacket;
use crate::stream::{FanoutItem, IngestHandle};
use crate::{Error, PublisherRegistry, Result};

/// Per-connection state shared between the session loop and the command handlers it
/// dispatches to. Properties are a loose bag (app name, stream name, publish/play flags)
/// because each handler only cares about a handful of them and a typed struct would just
/// grow one optional field per handler.
pub struct ConnectionContext {
    connection_id: String,
    remote_addr: String,

    properties: RwLock<HashMap<String, String>>,

    packet_sender: mpsc::Sender<RtmpPacket>,

    chunk_size_in: RwLock<usize>,
    chunk_size_out: RwLock<usize>,

    registry: Arc<PublisherRegistry>,
    hls_config: HlsConfig,
    gop_cache_max: usize,

    /// Set by `PublishHandler` once `publish` succeeds; taken by the session loop to
    /// switch into the ingest phase.
    pending_publisher: Mutex<Option<IngestHandle>>,

    /// Set by `PlayHandler` once `play` succeeds; taken by the session loop to switch
    /// into the subscriber phase.
    pending_subscription: Mutex<Option<(u32, mpsc::Receiver<FanoutItem>)>>,
}

impl ConnectionContext {
    /// Build a new context plus the receiving half of its outgoing packet channel, which
    /// the session loop drains directly rather than running a separate write task.
    pub fn new(
        connection_id: String,
        remote_addr: String,
        registry: Arc<PublisherRegistry>,
        hls_config: HlsConfig,
        gop_cache_max: usize,
    ) -> (Arc<Self>, mpsc::Receiver<RtmpPacket>) {
        let (packet_sender, packet_receiver) = mpsc::channel(100);

        let context = Arc::new(ConnectionContext {
            connection_id,
            remote_addr,
            properties: RwLock::new(HashMap::new()),
            packet_sender,
            chunk_size_in: RwLock::new(128),
            chunk_size_out: RwLock::new(128),
            registry,
            hls_config,
            gop_cache_max,
            pending_publisher: Mutex::new(None),
            pending_subscription: Mutex::new(None),
        });

        (context, packet_receiver)
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn registry(&self) -> Arc<PublisherRegistry> {
        self.registry.clone()
    }

    pub fn hls_config(&self) -> HlsConfig {
        self.hls_config.clone()
    }

    pub fn gop_cache_max(&self) -> usize {
        self.gop_cache_max
    }

    /// Queue a packet for the session loop to write. Used by command handlers that need
    /// to send something other than their own return value (e.g. Stream Begin ahead of
    /// the `onStatus` reply).
    pub async fn send_packet(&self, packet: RtmpPacket) -> Result<()> {
        self.packet_sender
            .send(packet)
            .await
            .map_err(|_| Error::connection("Failed to send packet"))
    }

    pub async fn get_property(&self, key: &str) -> Option<String> {
        self.properties.read().await.get(key).cloned()
    }

    pub async fn set_property(&self, key: String, value: String) {
        self.properties.write().await.insert(key, value);
    }

    pub async fn remove_property(&self, key: &str) {
        self.properties.write().await.remove(key);
    }

    pub async fn set_chunk_size_in(&self, size: usize) {
        *self.chunk_size_in.write().await = size;
    }

    pub async fn chunk_size_in(&self) -> usize {
        *self.chunk_size_in.read().await
    }

    pub async fn set_chunk_size_out(&self, size: usize) {
        *self.chunk_size_out.write().await = size;
    }

    pub async fn chunk_size_out(&self) -> usize {
        *self.chunk_size_out.read().await
    }

    pub async fn set_pending_publisher(&self, handle: IngestHandle) {
        *self.pending_publisher.lock().await = Some(handle);
    }

    pub async fn take_pending_publisher(&self) -> Option<IngestHandle> {
        self.pending_publisher.lock().await.take()
    }

    pub async fn set_pending_subscription(&self, stream_id: u32, rx: mpsc::Receiver<FanoutItem>) {
        *self.pending_subscription.lock().await = Some((stream_id, rx));
    }

    pub async fn take_pending_subscription(&self) -> Option<(u32, mpsc::Receiver<FanoutItem>)> {
        self.pending_subscription.lock().await.take()
    }
}
