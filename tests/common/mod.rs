// Shared harness for the integration tests: spins up a real `RtmpServer` on a loopback
// port and drives it over a raw `TcpStream` using the crate's own handshake and chunk
// codec, the same way a real client would.

use std::collections::HashMap;
use std::time::Duration;

use live_media::{
    validate_c2, Amf0Value, C0C1, C2, ChunkReader, ChunkWriter, RtmpCommand, RtmpData, RtmpHeader,
    RtmpPacket, RtmpServer, S0S1S2, ServerConfig,
};
use live_media::{MSG_TYPE_COMMAND_AMF0, MSG_TYPE_DATA_AMF0, MSG_TYPE_SET_CHUNK_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a `ServerConfig` bound to loopback on the given port, with HLS output pointed at
/// a throwaway temp directory so tests never touch the real working directory.
pub fn test_server_config(port: u16) -> ServerConfig {
    let hls_dir = std::env::temp_dir().join(format!("live-media-test-hls-{}", port));
    ServerConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .hls_save_path(hls_dir.to_string_lossy().to_string())
        .build()
        .expect("test server config must be valid")
}

/// Spawn an `RtmpServer` for `config` in the background and give it a moment to bind.
pub async fn spawn_server(config: ServerConfig) {
    let server = RtmpServer::new(config);
    tokio::spawn(async move {
        let _ = server.listen().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// One end of a raw RTMP session, past the handshake, with its own chunk codec state.
pub struct TestClient {
    stream: TcpStream,
    reader: ChunkReader,
    writer: ChunkWriter,
}

impl TestClient {
    /// Connect to `addr` and run the simple handshake to completion. Returns `None` if
    /// the server refuses or drops the connection before the handshake finishes (used to
    /// assert connection-limit rejection).
    pub async fn try_connect(addr: &str) -> Option<Self> {
        let mut stream = TcpStream::connect(addr).await.ok()?;

        let c0c1 = C0C1::create_client();
        stream.write_all(&c0c1.encode()).await.ok()?;

        let mut resp = vec![0u8; 1 + 1536 * 2];
        timeout(READ_TIMEOUT, stream.read_exact(&mut resp))
            .await
            .ok()?
            .ok()?;

        let s0s1s2 = S0S1S2::parse(&resp).ok()?;
        let c2 = C2::create_from_s1(&s0s1s2);
        validate_c2(&c2.encode(), &s0s1s2, live_media::HandshakeVariant::Simple).ok()?;
        stream.write_all(&c2.encode()).await.ok()?;

        Some(TestClient {
            stream,
            reader: ChunkReader::new(),
            writer: ChunkWriter::new(),
        })
    }

    pub async fn connect(addr: &str) -> Self {
        Self::try_connect(addr)
            .await
            .expect("handshake with test server failed")
    }

    pub async fn send_command(&mut self, command: RtmpCommand, message_stream_id: u32) {
        let bytes = command.encode().expect("command must encode");
        let header = RtmpHeader::command(0, bytes.len() as u32, message_stream_id);
        let packet = RtmpPacket::new(header, bytes);
        self.send_packet(packet).await;
    }

    pub async fn send_packet(&mut self, packet: RtmpPacket) {
        self.writer
            .write_packet(&packet, &mut self.stream)
            .await
            .expect("failed to write packet");
    }

    /// Read the next message off the wire, transparently applying `SetChunkSize` to our
    /// own reader state rather than surfacing it to the caller.
    pub async fn read_message(&mut self) -> RtmpPacket {
        loop {
            let packet = timeout(READ_TIMEOUT, self.reader.read_chunk(&mut self.stream))
                .await
                .expect("timed out waiting for a message")
                .expect("chunk read failed")
                .expect("stream ended without a complete message");

            if packet.message_type() == MSG_TYPE_SET_CHUNK_SIZE && packet.payload.len() >= 4 {
                let size = u32::from_be_bytes([
                    packet.payload[0],
                    packet.payload[1],
                    packet.payload[2],
                    packet.payload[3],
                ]);
                self.reader.set_chunk_size(size as usize);
                continue;
            }

            return packet;
        }
    }

    /// Read messages until a command with the given name arrives (other commands and
    /// control messages in between are skipped), then decode it.
    pub async fn expect_command(&mut self, name: &str) -> RtmpCommand {
        loop {
            let packet = self.read_message().await;
            if packet.message_type() != MSG_TYPE_COMMAND_AMF0 {
                continue;
            }
            let command = RtmpCommand::decode(&packet.payload).expect("command must decode");
            if command.name == name {
                return command;
            }
        }
    }

    /// Wait up to `duration` for a command with the given name. Returns `true` if one
    /// arrived, `false` on timeout — used to assert something does *not* happen.
    pub async fn command_arrives_within(&mut self, name: &str, duration: Duration) -> bool {
        timeout(duration, self.expect_command(name)).await.is_ok()
    }

    /// Wait up to `duration` for the server to close the socket (a zero-length or errored
    /// read). Returns `true` if the connection closed within that window.
    pub async fn connection_closes_within(&mut self, duration: Duration) -> bool {
        let mut buf = [0u8; 1];
        match timeout(duration, self.stream.read(&mut buf)).await {
            Ok(Ok(0)) => true,
            Ok(Ok(_)) => false,
            Ok(Err(_)) => true,
            Err(_) => false,
        }
    }

    /// Read messages until the onMetaData data message that opens a GOP primer arrives,
    /// skipping the `|RtmpSampleAccess`/`NetStream.Data.Start` data messages `play` sends
    /// first (neither is part of the primer itself).
    pub async fn expect_metadata(&mut self) -> RtmpPacket {
        loop {
            let packet = self.read_message().await;
            if packet.message_type() != MSG_TYPE_DATA_AMF0 {
                continue;
            }
            if let Ok(data) = RtmpData::decode(&packet.payload) {
                if data.data_type == "onMetaData" {
                    return packet;
                }
            }
        }
    }

    /// Read messages until the first video (type 9) message arrives, skipping `play`'s own
    /// `|RtmpSampleAccess`/`NetStream.Data.Start` data messages ahead of a primer that has
    /// no metadata of its own.
    pub async fn expect_video(&mut self) -> RtmpPacket {
        loop {
            let packet = self.read_message().await;
            if packet.message_type() == 9 {
                return packet;
            }
        }
    }
}

/// Build a connect/createStream prologue, returning the allocated message stream id.
pub async fn connect_and_create_stream(client: &mut TestClient, app: &str) -> u32 {
    client
        .send_command(
            RtmpCommand::connect(app, &format!("rtmp://127.0.0.1/{}", app)),
            0,
        )
        .await;
    client.expect_command("_result").await;

    client
        .send_command(RtmpCommand::create_stream(2.0), 0)
        .await;
    let result = client.expect_command("_result").await;
    result
        .arguments
        .first()
        .and_then(|v| v.as_number())
        .expect("createStream result must carry a numeric stream id") as u32
}

impl TestClient {
    pub async fn publish(&mut self, stream_id: u32, stream_name: &str) {
        self.send_command(RtmpCommand::publish(stream_name, "live"), stream_id)
            .await;
        self.expect_command("onStatus").await;
    }

    pub async fn play(&mut self, stream_id: u32, stream_name: &str) {
        self.send_command(RtmpCommand::play(stream_name, -2.0, -1.0, true), stream_id)
            .await;
    }

    pub async fn send_video(&mut self, ts: u32, payload: Vec<u8>, stream_id: u32) {
        let header = RtmpHeader::video(ts, payload.len() as u32, stream_id);
        self.send_packet(RtmpPacket::new(header, payload)).await;
    }

    pub async fn send_audio(&mut self, ts: u32, payload: Vec<u8>, stream_id: u32) {
        let header = RtmpHeader::audio(ts, payload.len() as u32, stream_id);
        self.send_packet(RtmpPacket::new(header, payload)).await;
    }

    pub async fn send_metadata(&mut self, stream_id: u32) {
        let mut metadata = HashMap::new();
        metadata.insert("width".to_string(), Amf0Value::Number(1280.0));
        metadata.insert("height".to_string(), Amf0Value::Number(720.0));
        let data = RtmpData::on_metadata(metadata);
        let bytes = data.encode().expect("metadata must encode");
        let header = RtmpHeader::data(0, bytes.len() as u32, stream_id);
        self.send_packet(RtmpPacket::new(header, bytes)).await;
    }
}

/// A minimal AVC sequence header payload: enough to clear `classify_video`.
pub fn avc_sequence_header() -> Vec<u8> {
    vec![0x17, 0x00, 0, 0, 0, 0x01, 0x42, 0x00, 0x1e, 0xff, 0xe1, 0, 0]
}

/// A minimal AVC keyframe payload.
pub fn avc_keyframe(marker: u8) -> Vec<u8> {
    vec![0x17, 0x01, 0, 0, 0, 0, 0, 0, 4, marker, marker, marker, marker]
}

/// A minimal AVC interframe payload.
pub fn avc_interframe(marker: u8) -> Vec<u8> {
    vec![0x27, 0x01, 0, 0, 0, 0, 0, 0, 4, marker, marker, marker, marker]
}

/// A minimal AAC sequence header payload.
pub fn aac_sequence_header() -> Vec<u8> {
    vec![0xAF, 0x00, 0x12, 0x10]
}

/// A minimal AAC raw frame payload.
pub fn aac_frame(marker: u8) -> Vec<u8> {
    vec![0xAF, 0x01, marker, marker]
}
