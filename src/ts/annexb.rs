use crate::processing::video::AVCVideoConfig;

const START_CODE: [u8; 3] = [0, 0, 1];

/// Access unit delimiter NALU (type 9) announcing a primary-picture-coded slice, inserted
/// ahead of SPS/PPS on every keyframe.
const AUD: [u8; 2] = [0x09, 0xF0];

/// Convert AVCC-framed NALUs (4-byte big-endian length prefix per NALU — the RTMP/MP4
/// convention) to Annex-B (3-byte start-code prefixed), inserting an access unit delimiter
/// plus the cached SPS/PPS ahead of the first NALU of every keyframe so the segment is
/// independently decodable.
pub fn avcc_to_annexb(data: &[u8], config: Option<&AVCVideoConfig>, is_keyframe: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 64);

    if is_keyframe {
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(&AUD);
        if let Some(cfg) = config {
            for sps in &cfg.sps {
                out.extend_from_slice(&START_CODE);
                out.extend_from_slice(sps);
            }
            for pps in &cfg.pps {
                out.extend_from_slice(&START_CODE);
                out.extend_from_slice(pps);
            }
        }
    }

    let mut offset = 0;
    while offset + 4 <= data.len() {
        let len = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        offset += 4;
        if offset + len > data.len() {
            break;
        }
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(&data[offset..offset + len]);
        offset += len;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_nalu_no_config() {
        let nalu = vec![0x65, 1, 2, 3];
        let mut avcc = Vec::new();
        avcc.extend_from_slice(&(nalu.len() as u32).to_be_bytes());
        avcc.extend_from_slice(&nalu);

        let annexb = avcc_to_annexb(&avcc, None, false);
        assert_eq!(annexb, [&START_CODE[..], &nalu[..]].concat());
    }

    #[test]
    fn test_keyframe_prefixes_sps_pps() {
        let sps = vec![0x67, 0xAA];
        let pps = vec![0x68, 0xBB];
        let config = AVCVideoConfig {
            version: 1,
            profile: 0x42,
            profile_compat: 0,
            level: 30,
            sps: vec![sps.clone()],
            pps: vec![pps.clone()],
        };

        let nalu = vec![0x65, 1, 2, 3];
        let mut avcc = Vec::new();
        avcc.extend_from_slice(&(nalu.len() as u32).to_be_bytes());
        avcc.extend_from_slice(&nalu);

        let annexb = avcc_to_annexb(&avcc, Some(&config), true);
        let mut expected = Vec::new();
        expected.extend_from_slice(&START_CODE);
        expected.extend_from_slice(&AUD);
        expected.extend_from_slice(&START_CODE);
        expected.extend_from_slice(&sps);
        expected.extend_from_slice(&START_CODE);
        expected.extend_from_slice(&pps);
        expected.extend_from_slice(&START_CODE);
        expected.extend_from_slice(&nalu);
        assert_eq!(annexb, expected);
    }

    #[test]
    fn test_multiple_nalus_in_one_payload() {
        let a = vec![0x65, 1];
        let b = vec![0x41, 2, 3];
        let mut avcc = Vec::new();
        avcc.extend_from_slice(&(a.len() as u32).to_be_bytes());
        avcc.extend_from_slice(&a);
        avcc.extend_from_slice(&(b.len() as u32).to_be_bytes());
        avcc.extend_from_slice(&b);

        let annexb = avcc_to_annexb(&avcc, None, false);
        let mut expected = Vec::new();
        expected.extend_from_slice(&START_CODE);
        expected.extend_from_slice(&a);
        expected.extend_from_slice(&START_CODE);
        expected.extend_from_slice(&b);
        assert_eq!(annexb, expected);
    }
}
