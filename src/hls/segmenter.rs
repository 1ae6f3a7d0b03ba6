use std::path::PathBuf;
use std::sync::Arc;

use log::warn;
use tokio::fs;
use tokio::sync::mpsc;

use crate::hls::playlist::Playlist;
use crate::hls::HlsConfig;
use crate::processing::audio::AudioProcessor;
use crate::processing::video::VideoProcessor;
use crate::stream::{MediaTag, TaggedPacket};
use crate::ts::constants::TICKS_PER_MS;
use crate::ts::{annexb, TsWriter};
use crate::Result;

/// One publisher's MPEG-TS segmenter: consumes the tagged media feed and writes `.ts` segments
/// plus a sliding-window `.m3u8` under `HlsConfig::save_path`.
pub async fn run(
    app: String,
    stream: String,
    mut hls_rx: mpsc::Receiver<Arc<TaggedPacket>>,
    hls_config: HlsConfig,
) -> Result<()> {
    let dir = PathBuf::from(&hls_config.save_path).join(format!("{}_{}", app, stream));
    if let Err(e) = fs::create_dir_all(&dir).await {
        warn!("hls: failed to create segment directory {}: {}", dir.display(), e);
    }

    let playlist_name = format!("{}_{}.m3u8", app, stream);

    let mut video = VideoProcessor::new();
    let mut audio = AudioProcessor::new();
    let mut ts_writer = TsWriter::new();
    let mut playlist = Playlist::new(hls_config.m3u8_ts_num);

    let mut next_seq: u64 = 0;
    let mut segment: Option<Segment> = None;

    while let Some(tagged) = hls_rx.recv().await {
        match tagged.tag {
            MediaTag::VideoHeader => {
                let _ = video.process(&tagged.packet);
            }
            MediaTag::AudioHeader => {
                let _ = audio.process(&tagged.packet);
            }
            MediaTag::Metadata => {}
            MediaTag::VideoKeyFrame | MediaTag::VideoInterFrame => {
                let info = match video.process(&tagged.packet) {
                    Ok(info) => info,
                    Err(e) => {
                        warn!("hls: failed to parse video tag: {}", e);
                        continue;
                    }
                };
                let is_keyframe = tagged.tag == MediaTag::VideoKeyFrame;
                let timestamp_ms = tagged.packet.timestamp() as u64;

                let needs_rotation = segment.is_none()
                    || (is_keyframe
                        && segment.as_ref().map_or(false, |s| {
                            timestamp_ms.saturating_sub(s.first_timestamp_ms)
                                >= hls_config.ts_max_time_ms as u64
                        }));

                if needs_rotation {
                    if let Some(finished) = segment.take() {
                        finish_segment(
                            finished,
                            &dir,
                            &playlist_name,
                            &mut playlist,
                            next_seq,
                        )
                        .await;
                        next_seq += 1;
                    }
                    segment = Some(Segment::new(timestamp_ms));
                    ts_writer = TsWriter::new();
                }

                let seg = segment.as_mut().expect("segment always present past this point");
                if seg.data.is_empty() {
                    seg.data.extend_from_slice(&TsWriter::file_header());
                }

                let payload = &tagged.packet.payload;
                if payload.len() < 5 {
                    warn!("hls: video payload too short to contain a NALU body");
                    continue;
                }
                let composition_offset = i32::from_be_bytes([
                    0,
                    payload[2],
                    payload[3],
                    payload[4],
                ]) << 8
                    >> 8;
                let nalu_data = &payload[5..];
                let annexb = annexb::avcc_to_annexb(nalu_data, video.avc_config(), is_keyframe);

                let dts = timestamp_ms * TICKS_PER_MS;
                let pts = (dts as i64 + composition_offset as i64 * TICKS_PER_MS as i64) as u64;

                let pcr = if seg.needs_pcr && is_keyframe {
                    seg.needs_pcr = false;
                    Some(dts)
                } else {
                    None
                };

                seg.data.extend_from_slice(&ts_writer.write_video(pts, dts, &annexb, pcr));
                seg.last_timestamp_ms = timestamp_ms;
                let _ = info;
            }
            MediaTag::AudioAacFrame => {
                let config = match audio.aac_config() {
                    Some(c) => c.clone(),
                    None => continue,
                };

                let timestamp_ms = tagged.packet.timestamp() as u64;
                let needs_rotation = segment.is_none();
                if needs_rotation {
                    segment = Some(Segment::new(timestamp_ms));
                    ts_writer = TsWriter::new();
                }

                let seg = segment.as_mut().expect("segment always present past this point");
                if seg.data.is_empty() {
                    seg.data.extend_from_slice(&TsWriter::file_header());
                }

                let payload = &tagged.packet.payload;
                if payload.len() < 2 {
                    warn!("hls: audio payload too short to contain raw AAC data");
                    continue;
                }
                let raw_aac = &payload[2..];
                let adts = crate::ts::adts::wrap_adts(
                    config.object_type,
                    config.sampling_index,
                    config.channel_config,
                    raw_aac,
                );

                let pts = timestamp_ms * TICKS_PER_MS;
                seg.data.extend_from_slice(&ts_writer.write_audio(pts, &adts));
                seg.last_timestamp_ms = timestamp_ms;
            }
        }
    }

    if let Some(finished) = segment.take() {
        finish_segment(finished, &dir, &playlist_name, &mut playlist, next_seq).await;
    }

    Ok(())
}

struct Segment {
    first_timestamp_ms: u64,
    last_timestamp_ms: u64,
    needs_pcr: bool,
    data: Vec<u8>,
}

impl Segment {
    fn new(first_timestamp_ms: u64) -> Self {
        Segment {
            first_timestamp_ms,
            last_timestamp_ms: first_timestamp_ms,
            needs_pcr: true,
            data: Vec::new(),
        }
    }
}

async fn finish_segment(
    segment: Segment,
    dir: &PathBuf,
    playlist_name: &str,
    playlist: &mut Playlist,
    seq: u64,
) {
    if segment.data.is_empty() {
        return;
    }

    let filename = format!(
        "{}_{}.ts",
        playlist_name.trim_end_matches(".m3u8"),
        seq
    );
    let path = dir.join(&filename);
    if let Err(e) = fs::write(&path, &segment.data).await {
        warn!("hls: failed to write segment {}: {}", path.display(), e);
        return;
    }

    let duration_ms = (segment.last_timestamp_ms.saturating_sub(segment.first_timestamp_ms)) as u32;
    if let Some(evicted) = playlist.push_segment(filename, duration_ms.max(1)) {
        let evicted_path = dir.join(&evicted);
        if let Err(e) = fs::remove_file(&evicted_path).await {
            warn!("hls: failed to remove evicted segment {}: {}", evicted_path.display(), e);
        }
    }

    if let Err(e) = playlist.write(dir, playlist_name).await {
        warn!("hls: failed to write playlist {}: {}", playlist_name, e);
    }
}
