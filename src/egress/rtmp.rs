use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

use crate::chunk::ChunkWriter;
use crate::protocol::RtmpPacket;
use crate::stream::FanoutItem;
use crate::Result;

/// Drain a subscriber's fanout channel, re-chunking each item onto `writer` with the
/// subscriber's own chunk size and message stream id.
pub async fn run<W>(
    mut writer: W,
    chunk_size: usize,
    stream_id: u32,
    mut rx: mpsc::Receiver<FanoutItem>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut chunk_writer = ChunkWriter::new();
    chunk_writer.set_chunk_size(chunk_size);

    while let Some(item) = rx.recv().await {
        match item {
            FanoutItem::Primer(primer) => {
                if let Some(p) = &primer.metadata {
                    chunk_writer
                        .write_packet(&retarget(&p.packet, stream_id), &mut writer)
                        .await?;
                }
                if let Some(p) = &primer.video_header {
                    chunk_writer
                        .write_packet(&retarget(&p.packet, stream_id), &mut writer)
                        .await?;
                }
                if let Some(p) = &primer.audio_header {
                    chunk_writer
                        .write_packet(&retarget(&p.packet, stream_id), &mut writer)
                        .await?;
                }
                for p in &primer.media {
                    chunk_writer
                        .write_packet(&retarget(&p.packet, stream_id), &mut writer)
                        .await?;
                }
            }
            FanoutItem::Packet(p) => {
                chunk_writer
                    .write_packet(&retarget(&p.packet, stream_id), &mut writer)
                    .await?;
            }
        }
    }

    Ok(())
}

fn retarget(packet: &RtmpPacket, stream_id: u32) -> RtmpPacket {
    let mut header = packet.header;
    header.message_stream_id = stream_id;
    RtmpPacket::new(header, packet.payload.clone())
}
