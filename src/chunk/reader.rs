use crate::{Error, Result, DEFAULT_CHUNK_SIZE};
use crate::protocol::{RtmpPacket, RtmpHeader};
use crate::chunk::stream::ChunkStreamContext;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt};

pub struct ChunkReader {
    /// Chunk streams by ID
    chunk_streams: HashMap<u32, ChunkStreamContext>,

    /// Current chunk size for reading
    chunk_size_in: usize,
}

impl ChunkReader {
    /// Create new chunk reader
    pub fn new() -> Self {
        ChunkReader {
            chunk_streams: HashMap::new(),
            chunk_size_in: DEFAULT_CHUNK_SIZE as usize,
        }
    }

    /// Set incoming chunk size
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size_in = size;
    }

    /// Read one chunk from the stream, returning a complete message once its final
    /// chunk arrives.
    pub async fn read_chunk<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<RtmpPacket>> {
        let mut basic_header = [0u8; 1];
        reader.read_exact(&mut basic_header).await
            .map_err(|e| Error::chunk(format!("Failed to read basic header: {}", e)))?;

        let (fmt, cs_id) = Self::parse_basic_header(basic_header[0], reader).await?;

        let (prev_header, sticky_ext, assembling, prior_delta) = match self.chunk_streams.get(&cs_id) {
            Some(ctx) => (ctx.prev_header.clone(), ctx.extended_timestamp, ctx.is_assembling(), ctx.timestamp_delta),
            None => (None, None, false, 0),
        };

        let (header, new_ext, delta_used) = if fmt == 3 {
            // No message header bytes at all. If the message this csid is assembling
            // used an extended timestamp, its 4-byte field is still repeated here.
            let mut header = prev_header
                .ok_or_else(|| Error::chunk("fmt 3 chunk requires a previous header on this csid"))?;
            if sticky_ext.is_some() {
                let mut ext_bytes = [0u8; 4];
                reader.read_exact(&mut ext_bytes).await
                    .map_err(|e| Error::chunk(format!("Failed to read extended timestamp: {}", e)))?;
            }
            if !assembling {
                // A fmt 3 chunk starting a fresh message carries no timestamp of its own,
                // so it reuses the prior delta applied on this csid (§4.2).
                header.timestamp = header.timestamp.wrapping_add(prior_delta);
            }
            (header, sticky_ext, None)
        } else {
            Self::read_message_header(fmt, cs_id, prev_header, reader).await?
        };

        let context = self.chunk_streams.entry(cs_id).or_insert_with(ChunkStreamContext::new);

        if let Some(delta) = delta_used {
            context.timestamp_delta = delta;
        }

        if !assembling {
            context.start_message(header, new_ext);
        }

        let chunk_data_size = context.bytes_remaining.min(self.chunk_size_in);

        let mut chunk_data = vec![0u8; chunk_data_size];
        reader.read_exact(&mut chunk_data).await
            .map_err(|e| Error::chunk(format!("Failed to read chunk data: {}", e)))?;

        context.add_chunk_data(chunk_data)
    }

    /// Parse basic header and get chunk stream ID
    async fn parse_basic_header<R: AsyncRead + Unpin>(
        first_byte: u8,
        reader: &mut R,
    ) -> Result<(u8, u32)> {
        let fmt = (first_byte >> 6) & 0x03;
        let cs_id = match first_byte & 0x3F {
            0 => {
                let mut id_byte = [0u8; 1];
                reader.read_exact(&mut id_byte).await
                    .map_err(|e| Error::chunk(format!("Failed to read CS ID: {}", e)))?;
                (id_byte[0] as u32) + 64
            }
            1 => {
                let mut id_bytes = [0u8; 2];
                reader.read_exact(&mut id_bytes).await
                    .map_err(|e| Error::chunk(format!("Failed to read CS ID: {}", e)))?;
                let id = u16::from_le_bytes(id_bytes) as u32;
                id + 64
            }
            n => n as u32,
        };

        Ok((fmt, cs_id))
    }

    /// Read a type 0/1/2 message header, returning it, the raw extended-timestamp value if
    /// the 3-byte field escaped to 0xFFFFFF (remembered for any `fmt 3` continuations on
    /// this csid), and the timestamp delta just applied for type 1/2 headers (remembered
    /// so a later `fmt 3` starting a fresh message on this csid can reuse it, per §4.2).
    async fn read_message_header<R: AsyncRead + Unpin>(
        fmt: u8,
        cs_id: u32,
        prev_header: Option<RtmpHeader>,
        reader: &mut R,
    ) -> Result<(RtmpHeader, Option<u32>, Option<u32>)> {
        match fmt {
            0 => {
                let mut header_bytes = [0u8; 11];
                reader.read_exact(&mut header_bytes).await
                    .map_err(|e| Error::chunk(format!("Failed to read type 0 header: {}", e)))?;

                let timestamp = u32::from_be_bytes([0, header_bytes[0], header_bytes[1], header_bytes[2]]);
                let message_length = u32::from_be_bytes([0, header_bytes[3], header_bytes[4], header_bytes[5]]);
                let message_type = header_bytes[6];
                let message_stream_id = u32::from_le_bytes([
                    header_bytes[7], header_bytes[8], header_bytes[9], header_bytes[10],
                ]);

                let (final_timestamp, ext) = if timestamp == 0xFFFFFF {
                    let mut ext_bytes = [0u8; 4];
                    reader.read_exact(&mut ext_bytes).await
                        .map_err(|e| Error::chunk(format!("Failed to read extended timestamp: {}", e)))?;
                    let v = u32::from_be_bytes(ext_bytes);
                    (v, Some(v))
                } else {
                    (timestamp, None)
                };

                Ok((
                    RtmpHeader::new(final_timestamp, message_length, message_type, message_stream_id, cs_id),
                    ext,
                    None,
                ))
            }
            1 => {
                let mut header_bytes = [0u8; 7];
                reader.read_exact(&mut header_bytes).await
                    .map_err(|e| Error::chunk(format!("Failed to read type 1 header: {}", e)))?;

                let timestamp_delta = u32::from_be_bytes([0, header_bytes[0], header_bytes[1], header_bytes[2]]);
                let message_length = u32::from_be_bytes([0, header_bytes[3], header_bytes[4], header_bytes[5]]);
                let message_type = header_bytes[6];

                let (final_delta, ext) = if timestamp_delta == 0xFFFFFF {
                    let mut ext_bytes = [0u8; 4];
                    reader.read_exact(&mut ext_bytes).await
                        .map_err(|e| Error::chunk(format!("Failed to read extended timestamp: {}", e)))?;
                    let v = u32::from_be_bytes(ext_bytes);
                    (v, Some(v))
                } else {
                    (timestamp_delta, None)
                };

                let prev = prev_header.ok_or_else(|| Error::chunk("Type 1 header requires previous header"))?;
                let timestamp = prev.timestamp.wrapping_add(final_delta);

                Ok((
                    RtmpHeader::new(timestamp, message_length, message_type, prev.message_stream_id, cs_id),
                    ext,
                    Some(final_delta),
                ))
            }
            2 => {
                let mut header_bytes = [0u8; 3];
                reader.read_exact(&mut header_bytes).await
                    .map_err(|e| Error::chunk(format!("Failed to read type 2 header: {}", e)))?;

                let timestamp_delta = u32::from_be_bytes([0, header_bytes[0], header_bytes[1], header_bytes[2]]);

                let (final_delta, ext) = if timestamp_delta == 0xFFFFFF {
                    let mut ext_bytes = [0u8; 4];
                    reader.read_exact(&mut ext_bytes).await
                        .map_err(|e| Error::chunk(format!("Failed to read extended timestamp: {}", e)))?;
                    let v = u32::from_be_bytes(ext_bytes);
                    (v, Some(v))
                } else {
                    (timestamp_delta, None)
                };

                let prev = prev_header.ok_or_else(|| Error::chunk("Type 2 header requires previous header"))?;
                let timestamp = prev.timestamp.wrapping_add(final_delta);

                Ok((
                    RtmpHeader::new(timestamp, prev.message_length, prev.message_type, prev.message_stream_id, cs_id),
                    ext,
                    Some(final_delta),
                ))
            }
            _ => Err(Error::chunk(format!("Invalid chunk format: {}", fmt))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RtmpHeader;
    use std::io::Cursor;

    fn encode_type0(cs_id: u32, header: &RtmpHeader, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![(0u8 << 6) | cs_id as u8];
        out.push((header.timestamp >> 16) as u8);
        out.push((header.timestamp >> 8) as u8);
        out.push(header.timestamp as u8);
        let len = payload.len() as u32;
        out.push((len >> 16) as u8);
        out.push((len >> 8) as u8);
        out.push(len as u8);
        out.push(header.message_type);
        out.extend_from_slice(&header.message_stream_id.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[tokio::test]
    async fn test_read_single_chunk_message() {
        let header = RtmpHeader::new(1000, 4, 8, 1, 4);
        let payload = vec![1, 2, 3, 4];
        let bytes = encode_type0(4, &header, &payload);

        let mut reader = ChunkReader::new();
        let mut cursor = Cursor::new(bytes);
        let packet = reader.read_chunk(&mut cursor).await.unwrap().unwrap();
        assert_eq!(packet.payload, payload);
        assert_eq!(packet.header.message_type, 8);
    }

    fn encode_type1(cs_id: u32, delta: u32, message_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![(1u8 << 6) | cs_id as u8];
        out.push((delta >> 16) as u8);
        out.push((delta >> 8) as u8);
        out.push(delta as u8);
        let len = payload.len() as u32;
        out.push((len >> 16) as u8);
        out.push((len >> 8) as u8);
        out.push(len as u8);
        out.push(message_type);
        out.extend_from_slice(payload);
        out
    }

    #[tokio::test]
    async fn test_fmt3_fresh_message_reuses_prior_delta() {
        // First message (fmt 0): timestamp 1000. Second (fmt 1): delta 40, so timestamp
        // 1040 — this is the delta a later fmt-3-starting-a-fresh-message must reuse.
        let first = RtmpHeader::new(1000, 4, 8, 1, 6);
        let first_payload = vec![1, 2, 3, 4];
        let second_payload = vec![5, 6, 7, 8];
        let third_payload = vec![9, 10, 11, 12];

        let mut bytes = encode_type0(6, &first, &first_payload);
        bytes.extend_from_slice(&encode_type1(6, 40, 8, &second_payload));
        // Third message: fmt 3 starting fresh (no fmt 0/1/2 header at all).
        bytes.push((3u8 << 6) | 6u8);
        bytes.extend_from_slice(&third_payload);

        let mut reader = ChunkReader::new();
        let mut cursor = Cursor::new(bytes);

        let first_packet = reader.read_chunk(&mut cursor).await.unwrap().unwrap();
        assert_eq!(first_packet.header.timestamp, 1000);

        let second_packet = reader.read_chunk(&mut cursor).await.unwrap().unwrap();
        assert_eq!(second_packet.header.timestamp, 1040);

        let third_packet = reader.read_chunk(&mut cursor).await.unwrap().unwrap();
        assert_eq!(third_packet.header.timestamp, 1080);
        assert_eq!(third_packet.payload, third_payload);
    }

    #[tokio::test]
    async fn test_fmt3_continuation_reassembles_split_message() {
        let header = RtmpHeader::new(0, 8, 9, 1, 6);
        let payload = vec![9, 9, 9, 9, 8, 8, 8, 8];

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4);

        let mut bytes = vec![(0u8 << 6) | 6u8];
        bytes.push(0);
        bytes.push(0);
        bytes.push(0);
        let len = payload.len() as u32;
        bytes.push((len >> 16) as u8);
        bytes.push((len >> 8) as u8);
        bytes.push(len as u8);
        bytes.push(header.message_type);
        bytes.extend_from_slice(&header.message_stream_id.to_le_bytes());
        bytes.extend_from_slice(&payload[0..4]);
        // fmt 3 continuation
        bytes.push((3u8 << 6) | 6u8);
        bytes.extend_from_slice(&payload[4..8]);

        let mut cursor = Cursor::new(bytes);
        let packet = reader.read_chunk(&mut cursor).await.unwrap();
        assert!(packet.is_none());
        let packet = reader.read_chunk(&mut cursor).await.unwrap().unwrap();
        assert_eq!(packet.payload, payload);
    }
}
