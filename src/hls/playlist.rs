use std::collections::VecDeque;
use std::path::Path;

use tokio::fs;

use crate::{Error, Result};

struct SegmentEntry {
    filename: String,
    duration_ms: u32,
}

/// Sliding-window M3U8 writer. Keeps at most `window` segments listed; when a new segment
/// pushes the window past that bound, the oldest entry is evicted and its `.ts` file is
/// removed from disk.
pub struct Playlist {
    window: usize,
    media_sequence: u64,
    segments: VecDeque<SegmentEntry>,
}

impl Playlist {
    pub fn new(window: usize) -> Self {
        Playlist {
            window: window.max(1),
            media_sequence: 0,
            segments: VecDeque::new(),
        }
    }

    /// Append a finished segment, returning the filename of an evicted segment, if any.
    pub fn push_segment(&mut self, filename: String, duration_ms: u32) -> Option<String> {
        self.segments.push_back(SegmentEntry { filename, duration_ms });
        if self.segments.len() > self.window {
            self.media_sequence += 1;
            self.segments.pop_front().map(|s| s.filename)
        } else {
            None
        }
    }

    pub async fn write(&self, dir: &Path, filename: &str) -> Result<()> {
        let target_duration = self
            .segments
            .iter()
            .map(|s| s.duration_ms.div_ceil(1000))
            .max()
            .unwrap_or(1)
            .max(1);

        let mut out = String::new();
        out.push_str("#EXTM3U\n");
        out.push_str("#EXT-X-VERSION:3\n");
        out.push_str(&format!("#EXT-X-TARGETDURATION:{}\n", target_duration));
        out.push_str(&format!("#EXT-X-MEDIA-SEQUENCE:{}\n", self.media_sequence));
        for seg in &self.segments {
            out.push_str(&format!("#EXTINF:{:.2},\n", seg.duration_ms as f64 / 1000.0));
            out.push_str(&seg.filename);
            out.push('\n');
        }

        fs::write(dir.join(filename), out)
            .await
            .map_err(|e| Error::segmenter(format!("failed to write playlist: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut playlist = Playlist::new(2);
        assert_eq!(playlist.push_segment("seg-0.ts".into(), 10_000), None);
        assert_eq!(playlist.push_segment("seg-1.ts".into(), 10_000), None);
        assert_eq!(playlist.push_segment("seg-2.ts".into(), 10_000), Some("seg-0.ts".into()));
        assert_eq!(playlist.segments.len(), 2);
        assert_eq!(playlist.media_sequence, 1);
    }

    #[tokio::test]
    async fn test_write_uses_given_filename() {
        let mut playlist = Playlist::new(6);
        playlist.push_segment("app_stream_0.ts".into(), 10_000);
        let dir = std::env::temp_dir().join(format!("hls-playlist-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        playlist.write(&dir, "app_stream.m3u8").await.unwrap();
        let contents = tokio::fs::read_to_string(dir.join("app_stream.m3u8")).await.unwrap();
        assert!(contents.contains("app_stream_0.ts"));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
