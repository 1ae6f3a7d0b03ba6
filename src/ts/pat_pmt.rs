use crate::ts::constants::*;
use crate::ts::crc::crc32_mpeg2;

/// Build the single PAT packet written at the start of every `.ts` file: one program,
/// pointing at `PID_PMT`.
pub fn build_pat_packet() -> [u8; TS_PACKET_SIZE] {
    let mut body = Vec::with_capacity(9);
    body.extend_from_slice(&1u16.to_be_bytes()); // transport_stream_id
    body.push(0xC1); // reserved(2)='11' + version_number(5)=0 + current_next_indicator=1
    body.push(0x00); // section_number
    body.push(0x00); // last_section_number
    body.extend_from_slice(&PROGRAM_NUMBER.to_be_bytes());
    body.extend_from_slice(&(0xE000 | (PID_PMT & 0x1FFF)).to_be_bytes());

    let section = build_psi_section(0x00, &body);
    wrap_single_packet(PID_PAT, &section)
}

/// Build the single PMT packet written second in every `.ts` file, describing a video
/// (H.264) and audio (AAC) elementary stream.
pub fn build_pmt_packet() -> [u8; TS_PACKET_SIZE] {
    let mut body = Vec::with_capacity(20);
    body.extend_from_slice(&PROGRAM_NUMBER.to_be_bytes());
    body.push(0xC1); // reserved + version 0 + current_next_indicator
    body.push(0x00); // section_number
    body.push(0x00); // last_section_number
    body.extend_from_slice(&(0xE000 | (PID_VIDEO & 0x1FFF)).to_be_bytes()); // PCR_PID = video
    body.extend_from_slice(&0xF000u16.to_be_bytes()); // reserved(4) + program_info_length(12)=0

    // Video stream descriptor
    body.push(STREAM_TYPE_H264);
    body.extend_from_slice(&(0xE000 | (PID_VIDEO & 0x1FFF)).to_be_bytes());
    body.extend_from_slice(&0xF000u16.to_be_bytes()); // ES_info_length = 0

    // Audio stream descriptor
    body.push(STREAM_TYPE_AAC);
    body.extend_from_slice(&(0xE000 | (PID_AUDIO & 0x1FFF)).to_be_bytes());
    body.extend_from_slice(&0xF000u16.to_be_bytes()); // ES_info_length = 0

    let section = build_psi_section(0x02, &body);
    wrap_single_packet(PID_PMT, &section)
}

/// Assemble a PSI section: table_id, section_length, body, then the CRC32 over everything
/// preceding it.
fn build_psi_section(table_id: u8, body: &[u8]) -> Vec<u8> {
    let section_length = (body.len() + 4) as u16; // + CRC32
    let mut section = Vec::with_capacity(3 + body.len() + 4);
    section.push(table_id);
    section.extend_from_slice(&(0xB000 | (section_length & 0x0FFF)).to_be_bytes());
    section.extend_from_slice(body);
    let crc = crc32_mpeg2(&section);
    section.extend_from_slice(&crc.to_be_bytes());
    section
}

/// Every PAT/PMT section fits comfortably in a single TS packet: pointer_field(0x00) +
/// section, stuffed with 0xFF to 184 bytes of payload.
fn wrap_single_packet(pid: u16, section: &[u8]) -> [u8; TS_PACKET_SIZE] {
    let mut packet = [0xFFu8; TS_PACKET_SIZE];
    packet[0] = TS_SYNC_BYTE;
    packet[1] = 0x40 | ((pid >> 8) as u8 & 0x1F); // payload_unit_start_indicator = 1
    packet[2] = (pid & 0xFF) as u8;
    packet[3] = 0x10; // no adaptation field, continuity_counter = 0

    packet[4] = 0x00; // pointer_field
    let payload_start = 5;
    let end = payload_start + section.len();
    packet[payload_start..end].copy_from_slice(section);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pat_packet_layout() {
        let packet = build_pat_packet();
        assert_eq!(packet.len(), TS_PACKET_SIZE);
        assert_eq!(packet[0], TS_SYNC_BYTE);
        assert_eq!(packet[1] & 0x40, 0x40);
        let pid = ((packet[1] as u16 & 0x1F) << 8) | packet[2] as u16;
        assert_eq!(pid, PID_PAT);
    }

    #[test]
    fn test_pmt_packet_pid() {
        let packet = build_pmt_packet();
        let pid = ((packet[1] as u16 & 0x1F) << 8) | packet[2] as u16;
        assert_eq!(pid, PID_PMT);
    }
}
