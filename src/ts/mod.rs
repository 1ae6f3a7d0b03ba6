pub mod adts;
pub mod annexb;
pub mod constants;
pub mod crc;
pub mod pat_pmt;
pub mod packetizer;
pub mod pes;

use constants::{PID_AUDIO, PID_VIDEO};

/// Per-publisher MPEG-TS muxing state: PAT/PMT are written once per segment file, video and
/// audio each carry their own continuity counter across the packets of that file.
pub struct TsWriter {
    video_cc: u8,
    audio_cc: u8,
}

impl TsWriter {
    pub fn new() -> Self {
        TsWriter {
            video_cc: 0,
            audio_cc: 0,
        }
    }

    /// The PAT followed by the PMT: the first two packets of every `.ts` file.
    pub fn file_header() -> Vec<u8> {
        let mut out = pat_pmt::build_pat_packet().to_vec();
        out.extend_from_slice(&pat_pmt::build_pmt_packet());
        out
    }

    /// Package one video access unit (already Annex-B framed). `pcr_90khz` carries the PCR
    /// for the first video access unit of a segment and is `None` otherwise.
    pub fn write_video(&mut self, pts_90khz: u64, dts_90khz: u64, annexb_au: &[u8], pcr_90khz: Option<u64>) -> Vec<u8> {
        let pes = pes::build_video_pes(pts_90khz, dts_90khz, annexb_au);
        packetizer::build_ts_packets(PID_VIDEO, &pes, pcr_90khz, &mut self.video_cc)
    }

    /// Package one ADTS-framed AAC frame.
    pub fn write_audio(&mut self, pts_90khz: u64, adts_frame: &[u8]) -> Vec<u8> {
        let pes = pes::build_audio_pes(pts_90khz, adts_frame);
        packetizer::build_ts_packets(PID_AUDIO, &pes, None, &mut self.audio_cc)
    }
}

impl Default for TsWriter {
    fn default() -> Self {
        Self::new()
    }
}
