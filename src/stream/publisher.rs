use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::server::PublisherRegistry;
use crate::stream::gop_cache::{GopCache, Primer};
use crate::stream::packet::TaggedPacket;

/// Depth of the publisher's own fan-out/HLS channels: small enough that a
/// slow consumer backpressures the publisher ingress task itself, which is intentional.
pub const PUBLISHER_CHANNEL_CAPACITY: usize = 5;

/// Depth of each subscriber's own egress channel.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 8;

/// What the fanout task hands to a per-subscriber egress task: transport-agnostic,
/// consumed by RTMP or FLV egress alike.
#[derive(Debug, Clone)]
pub enum FanoutItem {
    Primer(Primer),
    Packet(Arc<TaggedPacket>),
}

/// A subscriber admitted into a publisher's fanout, handed off by the admitting task and
/// owned from then on exclusively by the fanout task.
pub struct SubscriberHandle {
    pub id: String,
    pub sender: mpsc::Sender<FanoutItem>,
}

impl SubscriberHandle {
    pub fn new(id: String) -> (Self, mpsc::Receiver<FanoutItem>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        (SubscriberHandle { id, sender: tx }, rx)
    }
}

/// Owns a publisher's GOP cache and admission queue. Held by the registry and by the
/// fanout task itself, so it must NOT also own the sender halves of the fanout/HLS
/// channels: closing those is how the ingest side signals teardown (§5), and a sender held
/// by a struct that the fanout task keeps alive for its own duration would never drop.
/// Those senders instead live in [`IngestHandle`], owned exclusively by the connection's
/// ingest loop.
pub struct Publisher {
    pub key: String,
    pub app: String,
    pub stream: String,
    gop_cache: Mutex<GopCache>,
    admit_tx: mpsc::Sender<SubscriberHandle>,
}

/// The ingest side's exclusive handle to a publisher's downstream channels. Dropping this
/// (when the ingest loop returns, on any exit path) closes both channels, which is what
/// lets the fanout and HLS segmenter tasks notice teardown and exit their read loops.
pub struct IngestHandle {
    publisher: Arc<Publisher>,
    fanout_tx: mpsc::Sender<Arc<TaggedPacket>>,
    hls_tx: mpsc::Sender<Arc<TaggedPacket>>,
}

impl IngestHandle {
    /// Ingest one classified packet: update the GOP cache, then push to both downstream
    /// channels in order. Channel sends intentionally block — see module docs.
    pub async fn ingest(&self, tagged: TaggedPacket) {
        let packet = Arc::new(tagged);
        {
            let mut cache = self.publisher.gop_cache.lock().await;
            cache.ingest(packet.clone());
        }
        if self.fanout_tx.send(packet.clone()).await.is_err() {
            return;
        }
        let _ = self.hls_tx.send(packet).await;
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }
}

impl Publisher {
    /// Register `app/stream`, spawn the fanout and HLS segmenter tasks, and return the
    /// live publisher. Fails with `Error::DuplicatePublisher` if the key is already taken.
    pub async fn spawn(
        app: String,
        stream: String,
        registry: Arc<PublisherRegistry>,
        gop_cache_max: usize,
        hls_config: crate::hls::HlsConfig,
    ) -> crate::Result<IngestHandle> {
        let key = format!("{}/{}", app, stream);

        let (fanout_tx, fanout_rx) = mpsc::channel(PUBLISHER_CHANNEL_CAPACITY);
        let (hls_tx, hls_rx) = mpsc::channel(PUBLISHER_CHANNEL_CAPACITY);
        let (admit_tx, admit_rx) = mpsc::channel(32);

        let publisher = Arc::new(Publisher {
            key: key.clone(),
            app: app.clone(),
            stream: stream.clone(),
            gop_cache: Mutex::new(GopCache::new(gop_cache_max)),
            admit_tx,
        });

        registry.register(publisher.clone()).await?;

        let fanout_publisher = publisher.clone();
        let fanout_registry = registry.clone();
        tokio::spawn(async move {
            run_fanout(fanout_publisher, fanout_rx, admit_rx, fanout_registry).await;
        });

        tokio::spawn(async move {
            if let Err(e) = crate::hls::segmenter::run(app, stream, hls_rx, hls_config).await {
                log::warn!("hls segmenter task ended with error: {}", e);
            }
        });

        Ok(IngestHandle {
            publisher,
            fanout_tx,
            hls_tx,
        })
    }

    /// Hand a newly accepted subscriber off to the fanout task: admission is a single
    /// insert performed by the fanout task itself, never racing its iteration.
    pub async fn admit(&self, handle: SubscriberHandle) {
        let _ = self.admit_tx.send(handle).await;
    }
}

async fn run_fanout(
    publisher: Arc<Publisher>,
    mut packet_rx: mpsc::Receiver<Arc<TaggedPacket>>,
    mut admit_rx: mpsc::Receiver<SubscriberHandle>,
    registry: Arc<PublisherRegistry>,
) {
    let mut subscribers: HashMap<String, SubscriberHandle> = HashMap::new();

    loop {
        tokio::select! {
            admitted = admit_rx.recv() => {
                match admitted {
                    Some(handle) => {
                        log::info!("subscriber {} admitted to {}", handle.id, publisher.key);
                        let primer = publisher.gop_cache.lock().await.build_primer();
                        if handle.sender.send(FanoutItem::Primer(primer)).await.is_ok() {
                            subscribers.insert(handle.id.clone(), handle);
                        } else {
                            log::info!("subscriber {} dropped before primer delivery", handle.id);
                        }
                    }
                    None => continue,
                }
            }
            packet = packet_rx.recv() => {
                let packet = match packet {
                    Some(p) => p,
                    None => break,
                };

                let mut dead = Vec::new();
                for (id, sub) in subscribers.iter() {
                    if sub.sender.send(FanoutItem::Packet(packet.clone())).await.is_err() {
                        dead.push(id.clone());
                    }
                }
                for id in dead {
                    log::info!("subscriber {} evicted from {} (send failed)", id, publisher.key);
                    subscribers.remove(&id);
                }
            }
        }
    }

    registry.unregister(&publisher.key).await;
    log::info!("publisher {} torn down", publisher.key);
}
