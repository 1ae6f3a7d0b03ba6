use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::protocol::RtmpPacket;
use crate::stream::FanoutItem;
use crate::{Error, Result};

/// Signature, version 1, flags 0x05 (audio+video present), header length 9, first
/// previous-tag-size 0 — 13 bytes total.
const FLV_HEADER: [u8; 13] = [
    b'F', b'L', b'V', 1, 0x05, 0, 0, 0, 9, 0, 0, 0, 0,
];

/// Write the FLV file header, then drain a subscriber's fanout channel, wrapping each item
/// in an FLV tag.
pub async fn run<W>(mut writer: W, mut rx: mpsc::Receiver<FanoutItem>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(&FLV_HEADER)
        .await
        .map_err(|e| Error::io(format!("failed to write FLV header: {}", e)))?;

    while let Some(item) = rx.recv().await {
        match item {
            FanoutItem::Primer(primer) => {
                if let Some(p) = &primer.metadata {
                    write_tag(&mut writer, &p.packet).await?;
                }
                if let Some(p) = &primer.video_header {
                    write_tag(&mut writer, &p.packet).await?;
                }
                if let Some(p) = &primer.audio_header {
                    write_tag(&mut writer, &p.packet).await?;
                }
                for p in &primer.media {
                    write_tag(&mut writer, &p.packet).await?;
                }
            }
            FanoutItem::Packet(p) => {
                write_tag(&mut writer, &p.packet).await?;
            }
        }
    }

    Ok(())
}

async fn write_tag<W: AsyncWrite + Unpin>(writer: &mut W, packet: &RtmpPacket) -> Result<()> {
    let bytes = encode_tag(packet);
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| Error::io(format!("failed to write FLV tag: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::io(format!("failed to flush FLV tag: {}", e)))
}

fn encode_tag(packet: &RtmpPacket) -> Vec<u8> {
    let data_size = packet.payload.len() as u32;
    let timestamp = packet.header.timestamp;

    let mut out = Vec::with_capacity(11 + packet.payload.len() + 4);
    out.push(packet.header.message_type);
    out.push((data_size >> 16) as u8);
    out.push((data_size >> 8) as u8);
    out.push(data_size as u8);
    out.push((timestamp >> 16) as u8);
    out.push((timestamp >> 8) as u8);
    out.push(timestamp as u8);
    out.push((timestamp >> 24) as u8); // extended timestamp byte
    out.extend_from_slice(&[0, 0, 0]); // stream id
    out.extend_from_slice(&packet.payload);

    let trailer = 11 + data_size;
    out.extend_from_slice(&trailer.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RtmpHeader;

    #[test]
    fn test_encode_tag_layout() {
        let header = RtmpHeader::audio(0x010203, 3, 1);
        let packet = RtmpPacket::new(header, vec![1, 2, 3]);
        let bytes = encode_tag(&packet);
        assert_eq!(bytes[0], 8); // audio tag type
        assert_eq!(&bytes[1..4], &[0, 0, 3]); // data size
        assert_eq!(bytes.len(), 11 + 3 + 4);
        let trailer = u32::from_be_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        assert_eq!(trailer, 11 + 3);
    }
}
