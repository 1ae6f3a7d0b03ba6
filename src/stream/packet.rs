use crate::protocol::RtmpPacket;

/// Semantic tag a chunk carries once it has cleared the media classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTag {
    Metadata,
    VideoHeader,
    AudioHeader,
    VideoKeyFrame,
    VideoInterFrame,
    AudioAacFrame,
}

impl MediaTag {
    pub fn is_video(&self) -> bool {
        matches!(self, MediaTag::VideoHeader | MediaTag::VideoKeyFrame | MediaTag::VideoInterFrame)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, MediaTag::AudioHeader | MediaTag::AudioAacFrame)
    }

    pub fn is_key_frame(&self) -> bool {
        matches!(self, MediaTag::VideoKeyFrame)
    }
}

/// A chunk that has cleared the classifier: the tag plus the untouched RTMP message.
/// Shared by reference once classified; downstream consumers (RTMP fanout, FLV fanout,
/// TS segmenter) never mutate it.
#[derive(Debug, Clone)]
pub struct TaggedPacket {
    pub tag: MediaTag,
    pub packet: RtmpPacket,
}

impl TaggedPacket {
    pub fn new(tag: MediaTag, packet: RtmpPacket) -> Self {
        TaggedPacket { tag, packet }
    }
}
