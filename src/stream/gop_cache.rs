use std::collections::VecDeque;
use std::sync::Arc;

use crate::stream::packet::{MediaTag, TaggedPacket};

/// The bundle a newly admitted subscriber receives before any live packet: the last seen
/// metadata and codec headers, followed by every media chunk currently cached.
#[derive(Debug, Clone, Default)]
pub struct Primer {
    pub metadata: Option<Arc<TaggedPacket>>,
    pub video_header: Option<Arc<TaggedPacket>>,
    pub audio_header: Option<Arc<TaggedPacket>>,
    pub media: Vec<Arc<TaggedPacket>>,
}

/// Per-publisher cache of the most recent headers plus a bounded window of GOPs.
///
/// `closed_gops` holds up to `max_gops` complete GOPs (oldest evicted first); `current_gop`
/// is the GOP still being appended to, closed into `closed_gops` the moment the next key
/// frame arrives.
pub struct GopCache {
    max_gops: usize,
    metadata: Option<Arc<TaggedPacket>>,
    video_header: Option<Arc<TaggedPacket>>,
    audio_header: Option<Arc<TaggedPacket>>,
    closed_gops: VecDeque<Vec<Arc<TaggedPacket>>>,
    current_gop: Vec<Arc<TaggedPacket>>,
}

impl GopCache {
    pub fn new(max_gops: usize) -> Self {
        GopCache {
            max_gops: max_gops.max(1),
            metadata: None,
            video_header: None,
            audio_header: None,
            closed_gops: VecDeque::new(),
            current_gop: Vec::new(),
        }
    }

    pub fn ingest(&mut self, packet: Arc<TaggedPacket>) {
        match packet.tag {
            MediaTag::Metadata => self.metadata = Some(packet),
            MediaTag::VideoHeader => self.video_header = Some(packet),
            MediaTag::AudioHeader => self.audio_header = Some(packet),
            MediaTag::VideoKeyFrame => {
                if !self.current_gop.is_empty() {
                    let closed = std::mem::take(&mut self.current_gop);
                    self.closed_gops.push_back(closed);
                    if self.closed_gops.len() > self.max_gops {
                        self.closed_gops.pop_front();
                    }
                }
                self.current_gop.push(packet);
            }
            MediaTag::VideoInterFrame | MediaTag::AudioAacFrame => {
                // Invariant 1: the cached sequence always begins with a key frame, so
                // anything arriving before the first key frame is dropped.
                if !self.current_gop.is_empty() {
                    self.current_gop.push(packet);
                }
            }
        }
    }

    /// Number of complete GOPs currently retained.
    pub fn complete_gop_count(&self) -> usize {
        self.closed_gops.len()
    }

    pub fn build_primer(&self) -> Primer {
        let mut media = Vec::with_capacity(
            self.closed_gops.iter().map(|g| g.len()).sum::<usize>() + self.current_gop.len(),
        );
        for gop in &self.closed_gops {
            media.extend(gop.iter().cloned());
        }
        media.extend(self.current_gop.iter().cloned());

        Primer {
            metadata: self.metadata.clone(),
            video_header: self.video_header.clone(),
            audio_header: self.audio_header.clone(),
            media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RtmpHeader, RtmpPacket};

    fn tagged(tag: MediaTag) -> Arc<TaggedPacket> {
        let header = RtmpHeader::video(0, 0, 1);
        Arc::new(TaggedPacket::new(tag, RtmpPacket::new(header, vec![])))
    }

    #[test]
    fn test_frames_before_first_keyframe_are_dropped() {
        let mut cache = GopCache::new(1);
        cache.ingest(tagged(MediaTag::VideoInterFrame));
        assert_eq!(cache.build_primer().media.len(), 0);
    }

    #[test]
    fn test_single_gop_retained_by_default() {
        let mut cache = GopCache::new(1);
        cache.ingest(tagged(MediaTag::VideoKeyFrame));
        cache.ingest(tagged(MediaTag::VideoInterFrame));
        cache.ingest(tagged(MediaTag::VideoInterFrame));

        let primer = cache.build_primer();
        assert_eq!(primer.media.len(), 3);
        assert_eq!(primer.media[0].tag, MediaTag::VideoKeyFrame);
        assert_eq!(cache.complete_gop_count(), 0);
    }

    #[test]
    fn test_eviction_keeps_at_most_max_gops_closed() {
        let mut cache = GopCache::new(1);
        cache.ingest(tagged(MediaTag::VideoKeyFrame));
        cache.ingest(tagged(MediaTag::VideoInterFrame));
        cache.ingest(tagged(MediaTag::VideoKeyFrame)); // closes gop 1
        cache.ingest(tagged(MediaTag::VideoKeyFrame)); // closes gop 2, evicts gop 1

        assert_eq!(cache.complete_gop_count(), 1);
        let primer = cache.build_primer();
        // one closed gop (the 2nd keyframe, now alone) + the current open gop (3rd keyframe)
        assert_eq!(primer.media.len(), 2);
        assert_eq!(primer.media[0].tag, MediaTag::VideoKeyFrame);
    }

    #[test]
    fn test_headers_overwritten_by_latest() {
        let mut cache = GopCache::new(1);
        cache.ingest(tagged(MediaTag::AudioHeader));
        cache.ingest(tagged(MediaTag::AudioHeader));
        assert!(cache.build_primer().audio_header.is_some());
    }
}
