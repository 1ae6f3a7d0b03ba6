use crate::{ByteBuffer, Error, Result, DEFAULT_CHUNK_SIZE};
use crate::protocol::{RtmpPacket, RtmpHeader};
use std::collections::HashMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub struct ChunkWriter {
    /// Previous headers for each chunk stream
    prev_headers: HashMap<u32, RtmpHeader>,

    /// Raw extended-timestamp value in use for the last header written on each csid, if
    /// any. `fmt 3` continuations of that message (and of any later message reusing
    /// `fmt 3`) repeat this 4-byte field.
    prev_ext: HashMap<u32, Option<u32>>,

    /// Current chunk size for writing
    chunk_size_out: usize,
}

impl ChunkWriter {
    /// Create new chunk writer
    pub fn new() -> Self {
        ChunkWriter {
            prev_headers: HashMap::new(),
            prev_ext: HashMap::new(),
            chunk_size_out: DEFAULT_CHUNK_SIZE as usize,
        }
    }

    /// Set outgoing chunk size
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size_out = size;
    }

    /// Write packet as chunks
    pub async fn write_packet<W: AsyncWrite + Unpin>(
        &mut self,
        packet: &RtmpPacket,
        writer: &mut W,
    ) -> Result<()> {
        let cs_id = packet.header.chunk_stream_id;
        let chunks = self.create_chunks(packet)?;

        writer.write_all(&chunks).await
            .map_err(|e| Error::chunk(format!("Failed to write chunks: {}", e)))?;

        writer.flush().await
            .map_err(|e| Error::chunk(format!("Failed to flush: {}", e)))?;

        self.prev_headers.insert(cs_id, packet.header.clone());

        Ok(())
    }

    /// Create chunks from packet
    pub fn create_chunks(&mut self, packet: &RtmpPacket) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        let cs_id = packet.header.chunk_stream_id;

        let (fmt, header_bytes, ext_value) = self.get_header_bytes(packet)?;
        self.prev_ext.insert(cs_id, ext_value);

        let payload_len = packet.payload.len();

        result.extend_from_slice(&self.encode_basic_header(fmt, cs_id));
        result.extend_from_slice(&header_bytes);

        let first_chunk_size = payload_len.min(self.chunk_size_out.max(1));
        result.extend_from_slice(&packet.payload[0..first_chunk_size]);

        let mut offset = first_chunk_size;
        while offset < payload_len {
            result.extend_from_slice(&self.encode_basic_header(3, cs_id));
            if let Some(ext) = ext_value {
                result.extend_from_slice(&ext.to_be_bytes());
            }

            let chunk_end = (offset + self.chunk_size_out.max(1)).min(payload_len);
            result.extend_from_slice(&packet.payload[offset..chunk_end]);

            offset = chunk_end;
        }

        Ok(result)
    }

    /// Get header bytes, format type, and (if the timestamp/delta escaped to 0xFFFFFF)
    /// the raw extended-timestamp value that any `fmt 3` continuation must repeat.
    fn get_header_bytes(&self, packet: &RtmpPacket) -> Result<(u8, Vec<u8>, Option<u32>)> {
        let cs_id = packet.header.chunk_stream_id;

        if let Some(prev) = self.prev_headers.get(&cs_id) {
            if prev.message_stream_id == packet.header.message_stream_id
                && prev.message_type == packet.header.message_type
                && prev.message_length == packet.header.message_length
            {
                if packet.header.timestamp == prev.timestamp {
                    let ext = self.prev_ext.get(&cs_id).copied().flatten();
                    let mut bytes = Vec::new();
                    if let Some(v) = ext {
                        bytes.extend_from_slice(&v.to_be_bytes());
                    }
                    return Ok((3, bytes, ext));
                }
                let delta = packet.header.timestamp.wrapping_sub(prev.timestamp);
                let (bytes, ext) = self.encode_type2_header(delta);
                return Ok((2, bytes, ext));
            }

            if prev.message_stream_id == packet.header.message_stream_id {
                let delta = packet.header.timestamp.wrapping_sub(prev.timestamp);
                let (bytes, ext) = self.encode_type1_header(delta, packet)?;
                return Ok((1, bytes, ext));
            }
        }

        let (bytes, ext) = self.encode_type0_header(packet)?;
        Ok((0, bytes, ext))
    }

    /// Encode basic header
    fn encode_basic_header(&self, fmt: u8, cs_id: u32) -> Vec<u8> {
        let mut result = Vec::new();

        if cs_id <= 63 {
            result.push((fmt << 6) | (cs_id as u8));
        } else if cs_id <= 319 {
            result.push((fmt << 6) | 0);
            result.push((cs_id - 64) as u8);
        } else {
            result.push((fmt << 6) | 1);
            let id = cs_id - 64;
            result.push((id & 0xFF) as u8);
            result.push((id >> 8) as u8);
        }

        result
    }

    /// Encode type 0 header (11 bytes + optional extended timestamp)
    fn encode_type0_header(&self, packet: &RtmpPacket) -> Result<(Vec<u8>, Option<u32>)> {
        let mut buffer = ByteBuffer::with_capacity(15);
        let ts = packet.header.timestamp;

        if ts >= 0xFFFFFF {
            buffer.write_u8(0xFF)?;
            buffer.write_u8(0xFF)?;
            buffer.write_u8(0xFF)?;
        } else {
            buffer.write_u8((ts >> 16) as u8)?;
            buffer.write_u8((ts >> 8) as u8)?;
            buffer.write_u8(ts as u8)?;
        }

        let len = packet.payload.len() as u32;
        buffer.write_u8((len >> 16) as u8)?;
        buffer.write_u8((len >> 8) as u8)?;
        buffer.write_u8(len as u8)?;

        buffer.write_u8(packet.header.message_type)?;

        let stream_id = packet.header.message_stream_id.to_le_bytes();
        buffer.write_bytes(&stream_id)?;

        let ext = if ts >= 0xFFFFFF {
            buffer.write_u32_be(ts)?;
            Some(ts)
        } else {
            None
        };

        Ok((buffer.to_vec(), ext))
    }

    /// Encode type 1 header (7 bytes + optional extended timestamp)
    fn encode_type1_header(&self, timestamp_delta: u32, packet: &RtmpPacket) -> Result<(Vec<u8>, Option<u32>)> {
        let mut buffer = ByteBuffer::with_capacity(11);

        if timestamp_delta >= 0xFFFFFF {
            buffer.write_u8(0xFF)?;
            buffer.write_u8(0xFF)?;
            buffer.write_u8(0xFF)?;
        } else {
            buffer.write_u8((timestamp_delta >> 16) as u8)?;
            buffer.write_u8((timestamp_delta >> 8) as u8)?;
            buffer.write_u8(timestamp_delta as u8)?;
        }

        let len = packet.payload.len() as u32;
        buffer.write_u8((len >> 16) as u8)?;
        buffer.write_u8((len >> 8) as u8)?;
        buffer.write_u8(len as u8)?;

        buffer.write_u8(packet.header.message_type)?;

        let ext = if timestamp_delta >= 0xFFFFFF {
            buffer.write_u32_be(timestamp_delta)?;
            Some(timestamp_delta)
        } else {
            None
        };

        Ok((buffer.to_vec(), ext))
    }

    /// Encode type 2 header (3 bytes + optional extended timestamp)
    fn encode_type2_header(&self, timestamp_delta: u32) -> (Vec<u8>, Option<u32>) {
        let mut buffer = ByteBuffer::with_capacity(7);

        if timestamp_delta >= 0xFFFFFF {
            buffer.write_u8(0xFF).unwrap();
            buffer.write_u8(0xFF).unwrap();
            buffer.write_u8(0xFF).unwrap();
            buffer.write_u32_be(timestamp_delta).unwrap();
            (buffer.to_vec(), Some(timestamp_delta))
        } else {
            buffer.write_u8((timestamp_delta >> 16) as u8).unwrap();
            buffer.write_u8((timestamp_delta >> 8) as u8).unwrap();
            buffer.write_u8(timestamp_delta as u8).unwrap();
            (buffer.to_vec(), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RtmpHeader;

    #[test]
    fn test_create_chunks_single_chunk() {
        let mut writer = ChunkWriter::new();
        let header = RtmpHeader::new(0, 4, 8, 1, 4);
        let packet = RtmpPacket::new(header, vec![1, 2, 3, 4]);
        let bytes = writer.create_chunks(&packet).unwrap();
        assert_eq!(bytes[0] >> 6, 0);
        assert_eq!(bytes.len(), 1 + 11 + 4);
    }

    #[test]
    fn test_create_chunks_splits_on_chunk_size() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4);
        let header = RtmpHeader::new(0, 8, 9, 1, 6);
        let packet = RtmpPacket::new(header, vec![0u8; 8]);
        let bytes = writer.create_chunks(&packet).unwrap();
        // basic(1) + full header(11) + 4 bytes + basic(1) + 4 bytes
        assert_eq!(bytes.len(), 1 + 11 + 4 + 1 + 4);
        assert_eq!(bytes[17] >> 6, 3);
    }
}
