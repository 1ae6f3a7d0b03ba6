use crate::ts::constants::{STREAM_ID_AUDIO, STREAM_ID_VIDEO};

/// Encode a 33-bit PTS/DTS-style timestamp with the given 4-bit prefix (0x2 = PTS only,
/// 0x3 = PTS of a PTS+DTS pair, 0x1 = DTS of a PTS+DTS pair) into the standard 5-byte form.
fn encode_ts_field(prefix: u8, value: u64) -> [u8; 5] {
    let v = value & 0x1_FFFF_FFFF;
    let high = ((v >> 30) & 0x07) as u8;
    let mid = ((v >> 15) & 0x7FFF) as u16;
    let low = (v & 0x7FFF) as u16;

    [
        (prefix << 4) | (high << 1) | 1,
        (mid >> 7) as u8,
        (((mid & 0x7F) << 1) | 1) as u8,
        (low >> 7) as u8,
        (((low & 0x7F) << 1) | 1) as u8,
    ]
}

fn build_pes(stream_id: u8, pts: u64, dts: u64, payload: &[u8], bounded_length: bool) -> Vec<u8> {
    let same = pts == dts;

    let mut optional = Vec::with_capacity(15);
    optional.push(0x80); // '10' + no scrambling/priority/alignment/copyright markers
    if same {
        optional.push(0x20); // PTS_DTS_flags = '10'
        optional.push(5);
        optional.extend_from_slice(&encode_ts_field(0x2, pts));
    } else {
        optional.push(0xC0); // PTS_DTS_flags = '11'
        optional.push(10);
        optional.extend_from_slice(&encode_ts_field(0x3, pts));
        optional.extend_from_slice(&encode_ts_field(0x1, dts));
    }

    let packet_length = if bounded_length {
        (optional.len() + payload.len()) as u16
    } else {
        0
    };

    let mut out = Vec::with_capacity(9 + optional.len() + payload.len());
    out.extend_from_slice(&[0x00, 0x00, 0x01]);
    out.push(stream_id);
    out.extend_from_slice(&packet_length.to_be_bytes());
    out.extend_from_slice(&optional);
    out.extend_from_slice(payload);
    out
}

/// Video PES: `PES_packet_length` is left unbounded (0) since an access unit can exceed the
/// 16-bit field.
pub fn build_video_pes(pts: u64, dts: u64, access_unit: &[u8]) -> Vec<u8> {
    build_pes(STREAM_ID_VIDEO, pts, dts, access_unit, false)
}

/// Audio PES: one ADTS frame per PES, small enough to carry a real `PES_packet_length`.
pub fn build_audio_pes(pts: u64, adts_frame: &[u8]) -> Vec<u8> {
    build_pes(STREAM_ID_AUDIO, pts, pts, adts_frame, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ts_field_roundtrip_bits() {
        let bytes = encode_ts_field(0x2, 0);
        assert_eq!(bytes[0] & 0xF0, 0x20);
        assert_eq!(bytes[0] & 0x01, 1);
        assert_eq!(bytes[2] & 0x01, 1);
        assert_eq!(bytes[4] & 0x01, 1);
    }

    #[test]
    fn test_audio_pes_has_bounded_length() {
        let pes = build_audio_pes(900_000, &[0xFF, 0xF1, 0, 0, 0]);
        let len = u16::from_be_bytes([pes[4], pes[5]]);
        assert_eq!(len as usize, pes.len() - 6);
    }

    #[test]
    fn test_video_pes_length_unbounded() {
        let pes = build_video_pes(900_000, 900_000, &[0, 0, 0, 1, 0x65]);
        assert_eq!(u16::from_be_bytes([pes[4], pes[5]]), 0);
    }

    #[test]
    fn test_video_pes_uses_pts_dts_pair_when_differ() {
        let pes = build_video_pes(900_100, 900_000, &[0, 0, 0, 1]);
        // start code(3) + stream_id(1) + length(2) + '10'marker(1) = index 7 is the flags byte
        assert_eq!(pes[7] & 0xC0, 0xC0);
        assert_eq!(pes[8], 10);
    }
}
