use crc::{Crc, CRC_32_MPEG_2};

static MPEG2_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// CRC32 (MPEG-2 polynomial) over a PSI section, as required by PAT/PMT.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    MPEG2_CRC.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_is_deterministic() {
        let a = crc32_mpeg2(b"hello world");
        let b = crc32_mpeg2(b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, crc32_mpeg2(b"hello worlD"));
    }
}
