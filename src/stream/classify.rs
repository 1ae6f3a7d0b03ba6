use crate::protocol::RtmpPacket;
use crate::stream::packet::{MediaTag, TaggedPacket};
use crate::{Error, Result};

const VIDEO_CODEC_AVC: u8 = 7;
const AUDIO_FORMAT_AAC: u8 = 10;

/// Classify an inbound audio message. Returns `Ok(None)` for a codec other than
/// AAC — the chunk is skipped but the session continues.
pub fn classify_audio(packet: RtmpPacket) -> Result<Option<TaggedPacket>> {
    if packet.payload.is_empty() {
        return Err(Error::protocol("empty audio payload"));
    }

    let sound_format = packet.payload[0] >> 4;
    if sound_format != AUDIO_FORMAT_AAC {
        return Ok(None);
    }

    if packet.payload.len() < 2 {
        return Err(Error::protocol("truncated AAC audio payload"));
    }

    let tag = if packet.payload[1] == 0 {
        MediaTag::AudioHeader
    } else {
        MediaTag::AudioAacFrame
    };

    Ok(Some(TaggedPacket::new(tag, packet)))
}

/// Classify an inbound video message. Returns `Ok(None)` for a codec other than
/// AVC, or for an end-of-sequence marker — both are skipped without aborting the session.
pub fn classify_video(packet: RtmpPacket) -> Result<Option<TaggedPacket>> {
    if packet.payload.is_empty() {
        return Err(Error::protocol("empty video payload"));
    }

    let frame_type = packet.payload[0] >> 4;
    let codec_id = packet.payload[0] & 0x0F;
    if codec_id != VIDEO_CODEC_AVC {
        return Ok(None);
    }

    if packet.payload.len() < 2 {
        return Err(Error::protocol("truncated AVC video payload"));
    }

    match packet.payload[1] {
        0 => Ok(Some(TaggedPacket::new(MediaTag::VideoHeader, packet))),
        1 => {
            let tag = if frame_type == 1 {
                MediaTag::VideoKeyFrame
            } else {
                MediaTag::VideoInterFrame
            };
            Ok(Some(TaggedPacket::new(tag, packet)))
        }
        _ => Ok(None), // end of sequence (2) or unknown: discard
    }
}

/// Metadata (type 15/18) is always tagged, never rejected.
pub fn classify_metadata(packet: RtmpPacket) -> TaggedPacket {
    TaggedPacket::new(MediaTag::Metadata, packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RtmpHeader;

    fn video_packet(payload: Vec<u8>) -> RtmpPacket {
        let header = RtmpHeader::video(0, payload.len() as u32, 1);
        RtmpPacket::new(header, payload)
    }

    fn audio_packet(payload: Vec<u8>) -> RtmpPacket {
        let header = RtmpHeader::audio(0, payload.len() as u32, 1);
        RtmpPacket::new(header, payload)
    }

    #[test]
    fn test_avc_sequence_header_tagged() {
        let tagged = classify_video(video_packet(vec![0x17, 0x00, 0, 0, 0, 0xFF]))
            .unwrap()
            .unwrap();
        assert_eq!(tagged.tag, MediaTag::VideoHeader);
    }

    #[test]
    fn test_key_and_inter_frame_tags() {
        let key = classify_video(video_packet(vec![0x17, 0x01, 0, 0, 0, 0xAA])).unwrap().unwrap();
        assert_eq!(key.tag, MediaTag::VideoKeyFrame);

        let inter = classify_video(video_packet(vec![0x27, 0x01, 0, 0, 0, 0xAA])).unwrap().unwrap();
        assert_eq!(inter.tag, MediaTag::VideoInterFrame);
    }

    #[test]
    fn test_unsupported_video_codec_is_skipped() {
        let result = classify_video(video_packet(vec![0x12, 0x01, 0, 0, 0])).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_end_of_sequence_is_discarded() {
        let result = classify_video(video_packet(vec![0x17, 0x02, 0, 0, 0])).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_aac_header_and_frame_tags() {
        let header = classify_audio(audio_packet(vec![0xAF, 0x00, 0x12, 0x10])).unwrap().unwrap();
        assert_eq!(header.tag, MediaTag::AudioHeader);

        let frame = classify_audio(audio_packet(vec![0xAF, 0x01, 0xAA, 0xBB])).unwrap().unwrap();
        assert_eq!(frame.tag, MediaTag::AudioAacFrame);
    }

    #[test]
    fn test_unsupported_audio_codec_is_skipped() {
        let result = classify_audio(audio_packet(vec![0x22, 0x00])).unwrap();
        assert!(result.is_none());
    }
}
