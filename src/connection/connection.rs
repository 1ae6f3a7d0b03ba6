use std::sync::{Arc, Mutex as StdMutex};

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chunk::{ChunkReader, ChunkWriter};
use crate::connection::{ConnectionContext, ConnectionState};
use crate::egress;
use crate::handlers::CommandHandlerRegistry;
use crate::handshake::{generate_s0s1s2, validate_c0c1, validate_c2};
use crate::protocol::constants::*;
use crate::protocol::{RtmpCommand, RtmpHeader, RtmpPacket};
use crate::server::PublisherRegistry;
use crate::stream::{classify_audio, classify_metadata, classify_video, IngestHandle, SubscriberHandle};
use crate::{Error, Result};

/// Bookkeeping handle for one accepted socket, held by `RtmpServer` so it can report the
/// live connection count and abort a session's task on shutdown. The protocol work itself
/// runs entirely inside the task this wraps.
pub struct Connection {
    id: String,
    remote_addr: String,
    handle: StdMutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub fn new(id: String, remote_addr: String, handle: JoinHandle<()>) -> Arc<Self> {
        Arc::new(Connection {
            id,
            remote_addr,
            handle: StdMutex::new(Some(handle)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn close(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

/// Run the server-side RTMP handshake, then the command/media session loop, for one
/// accepted socket already known to start with the RTMP version byte.
pub async fn run_session<S>(
    mut stream: S,
    context: Arc<ConnectionContext>,
    mut packet_rx: mpsc::Receiver<RtmpPacket>,
    handlers: Arc<CommandHandlerRegistry>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    server_handshake(&mut stream).await?;
    let mut state = ConnectionState::Connected;

    let (mut rd, mut wr) = tokio::io::split(stream);

    let mut chunk_reader = ChunkReader::new();
    let mut chunk_writer = ChunkWriter::new();

    let mut peer_window_ack_size: u32 = DEFAULT_WINDOW_SIZE;
    let mut ack_accumulator: u32 = 0;

    loop {
        chunk_writer.set_chunk_size(context.chunk_size_out().await);

        let packet = match chunk_reader.read_chunk(&mut rd).await? {
            Some(p) => p,
            None => continue,
        };

        ack_accumulator = ack_accumulator.saturating_add(packet.payload.len() as u32);
        if ack_accumulator >= peer_window_ack_size {
            let ack = create_ack_packet(ack_accumulator);
            chunk_writer.write_packet(&ack, &mut wr).await?;
            ack_accumulator = 0;
        }

        match packet.message_type() {
            MSG_TYPE_SET_CHUNK_SIZE => {
                if let Some(size) = read_u32_payload(&packet) {
                    chunk_reader.set_chunk_size(size as usize);
                    context.set_chunk_size_in(size as usize).await;
                }
            }
            MSG_TYPE_WINDOW_ACK => {
                if let Some(size) = read_u32_payload(&packet) {
                    peer_window_ack_size = size.max(1);
                }
            }
            MSG_TYPE_ABORT | MSG_TYPE_ACK | MSG_TYPE_SET_PEER_BW | MSG_TYPE_USER_CONTROL => {
                debug!(
                    "connection {}: control message type {} ignored",
                    context.connection_id(),
                    packet.message_type()
                );
            }
            MSG_TYPE_COMMAND_AMF0 | MSG_TYPE_COMMAND_AMF3 => {
                let command = match RtmpCommand::decode(&packet.payload) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("connection {}: failed to decode command: {}", context.connection_id(), e);
                        continue;
                    }
                };
                let name = command.name.clone();
                match handlers.handle(command, context.clone()).await {
                    Ok(maybe_response) => {
                        drain_queued(&mut packet_rx, &mut chunk_writer, &mut wr).await?;
                        if let Some(response) = maybe_response {
                            chunk_writer.write_packet(&response, &mut wr).await?;
                        }
                    }
                    // §7: a duplicate or unknown publisher is closed immediately, with no
                    // reply body — unlike unsupported-codec-class errors, which are logged
                    // and skipped so the session continues.
                    Err(e @ (Error::DuplicatePublisher(_) | Error::UnknownPublisher(_))) => {
                        warn!("connection {}: '{}' handler closing session: {}", context.connection_id(), name, e);
                        return Err(e);
                    }
                    Err(e) => warn!("connection {}: '{}' handler failed: {}", context.connection_id(), name, e),
                }
            }
            _ => {
                debug!(
                    "connection {}: ignoring message type {} before publish/play",
                    context.connection_id(),
                    packet.message_type()
                );
            }
        }

        if let Some(publisher) = context.take_pending_publisher().await {
            state = ConnectionState::Publishing;
            info!("connection {} entering {:?}", context.connection_id(), state);
            chunk_writer.set_chunk_size(context.chunk_size_out().await);
            return run_ingest(rd, wr, chunk_reader, chunk_writer, packet_rx, context, publisher).await;
        }

        if let Some((stream_id, sub_rx)) = context.take_pending_subscription().await {
            state = ConnectionState::Playing;
            info!("connection {} entering {:?}", context.connection_id(), state);
            let chunk_size_out = context.chunk_size_out().await;
            return run_subscriber(rd, wr, stream_id, chunk_size_out, sub_rx).await;
        }
    }
}

/// One length byte followed by that many JSON bytes identifying the publisher to
/// subscribe to, sent by a client dialing the RTMP port with a leading `0xFF` instead of
/// the RTMP version byte. Used by the HTTP `.flv` proxy to pull from the same fanout a
/// real RTMP subscriber would.
#[derive(serde::Deserialize)]
struct FlvSentinelRequest {
    #[serde(rename = "App")]
    app: String,
    #[serde(rename = "Stream")]
    stream: String,
    #[serde(rename = "Client", default)]
    client: String,
}

/// Handle one accepted socket whose first byte was `0xFF`: read the sentinel request,
/// admit a subscriber on the named publisher, then stream FLV tags until it disconnects.
pub async fn run_flv_sentinel<S>(mut stream: S, registry: Arc<PublisherRegistry>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut len_buf = [0u8; 1];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| Error::handshake(format!("failed to read FLV sentinel length: {}", e)))?;

    let mut payload = vec![0u8; len_buf[0] as usize];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| Error::handshake(format!("failed to read FLV sentinel body: {}", e)))?;

    let request: FlvSentinelRequest = serde_json::from_slice(&payload)
        .map_err(|e| Error::handshake(format!("malformed FLV sentinel JSON: {}", e)))?;

    let key = format!("{}/{}", request.app, request.stream);
    let publisher = registry.get(&key).await.ok_or_else(|| Error::unknown_publisher(key))?;

    let (handle, rx) = SubscriberHandle::new(request.client);
    publisher.admit(handle).await;

    egress::flv::run(stream, rx).await
}

/// Handshake exchange: read C0+C1, reply with S0+S1+S2 matching the variant the client
/// used, then validate the client's C2.
async fn server_handshake<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut c0c1_buf = vec![0u8; 1537];
    stream
        .read_exact(&mut c0c1_buf)
        .await
        .map_err(|e| Error::handshake(format!("failed to read C0+C1: {}", e)))?;

    let (c0c1, variant, digest) = validate_c0c1(&c0c1_buf)?;
    let s0s1s2 = generate_s0s1s2(&c0c1, variant, digest)?;

    stream
        .write_all(&s0s1s2.encode())
        .await
        .map_err(|e| Error::handshake(format!("failed to write S0+S1+S2: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| Error::handshake(format!("failed to flush handshake: {}", e)))?;

    let mut c2_buf = vec![0u8; 1536];
    stream
        .read_exact(&mut c2_buf)
        .await
        .map_err(|e| Error::handshake(format!("failed to read C2: {}", e)))?;

    validate_c2(&c2_buf, &s0s1s2, variant)
}

/// Write any packets a command handler queued via `ConnectionContext::send_packet` ahead
/// of its own return value, preserving wire ordering (Stream Begin before `onStatus`, etc).
async fn drain_queued<W: AsyncWrite + Unpin>(
    packet_rx: &mut mpsc::Receiver<RtmpPacket>,
    chunk_writer: &mut ChunkWriter,
    wr: &mut W,
) -> Result<()> {
    while let Ok(packet) = packet_rx.try_recv() {
        chunk_writer.write_packet(&packet, wr).await?;
    }
    Ok(())
}

fn read_u32_payload(packet: &RtmpPacket) -> Option<u32> {
    if packet.payload.len() < 4 {
        return None;
    }
    Some(u32::from_be_bytes([
        packet.payload[0],
        packet.payload[1],
        packet.payload[2],
        packet.payload[3],
    ]))
}

fn create_ack_packet(sequence_number: u32) -> RtmpPacket {
    let payload = sequence_number.to_be_bytes().to_vec();
    let header = RtmpHeader::new(0, payload.len() as u32, MSG_TYPE_ACK, 0, CHUNK_STREAM_PROTOCOL);
    RtmpPacket::new(header, payload)
}

/// Post-`publish` phase: classify incoming audio/video/data messages and hand them to the
/// publisher until the socket closes, a read fails, or the client sends `deleteStream`.
async fn run_ingest<R, W>(
    mut rd: R,
    mut wr: W,
    mut chunk_reader: ChunkReader,
    mut chunk_writer: ChunkWriter,
    mut packet_rx: mpsc::Receiver<RtmpPacket>,
    context: Arc<ConnectionContext>,
    ingest_handle: IngestHandle,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let key = ingest_handle.publisher().key.clone();
    let result = run_ingest_inner(
        &mut rd,
        &mut wr,
        &mut chunk_reader,
        &mut chunk_writer,
        &mut packet_rx,
        &ingest_handle,
    )
    .await;

    // Dropping the handle here closes the fanout/HLS channels, which is the signal the
    // dependent tasks use to terminate and remove themselves from the registry (§5); the
    // explicit unregister below additionally closes the brief window before they notice.
    drop(ingest_handle);
    context.registry().unregister(&key).await;
    info!("publisher {} ingest loop ended: {:?}", key, result);
    result
}

async fn run_ingest_inner<R, W>(
    rd: &mut R,
    wr: &mut W,
    chunk_reader: &mut ChunkReader,
    chunk_writer: &mut ChunkWriter,
    packet_rx: &mut mpsc::Receiver<RtmpPacket>,
    ingest_handle: &IngestHandle,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let key = &ingest_handle.publisher().key;
    loop {
        drain_queued(packet_rx, chunk_writer, wr).await?;

        let packet = match chunk_reader.read_chunk(rd).await? {
            Some(p) => p,
            None => continue,
        };

        match packet.message_type() {
            MSG_TYPE_AUDIO => match classify_audio(packet) {
                Ok(Some(tagged)) => ingest_handle.ingest(tagged).await,
                Ok(None) => {}
                Err(e) => warn!("publisher {}: rejected audio tag: {}", key, e),
            },
            MSG_TYPE_VIDEO => match classify_video(packet) {
                Ok(Some(tagged)) => ingest_handle.ingest(tagged).await,
                Ok(None) => {}
                Err(e) => warn!("publisher {}: rejected video tag: {}", key, e),
            },
            MSG_TYPE_DATA_AMF0 | MSG_TYPE_DATA_AMF3 => {
                ingest_handle.ingest(classify_metadata(packet)).await;
            }
            MSG_TYPE_COMMAND_AMF0 | MSG_TYPE_COMMAND_AMF3 => {
                if let Ok(command) = RtmpCommand::decode(&packet.payload) {
                    if command.name == "deleteStream"
                        || command.name == "FCUnpublish"
                        || command.name == "closeStream"
                    {
                        return Ok(());
                    }
                }
            }
            _ => {}
        }
    }
}

/// Post-`play` phase: stream the fanout feed to the subscriber while watching the read
/// half only to notice the socket close (no further commands are expected or parsed).
async fn run_subscriber<R, W>(
    mut rd: R,
    wr: W,
    stream_id: u32,
    chunk_size_out: usize,
    sub_rx: mpsc::Receiver<crate::stream::FanoutItem>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let egress_fut = egress::rtmp::run(wr, chunk_size_out, stream_id, sub_rx);
    tokio::pin!(egress_fut);

    let mut discard = [0u8; 512];
    loop {
        tokio::select! {
            result = &mut egress_fut => {
                return result;
            }
            read = rd.read(&mut discard) => {
                match read {
                    Ok(0) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(Error::Io(e)),
                }
            }
        }
    }
}
