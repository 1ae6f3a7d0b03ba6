use crate::{ByteBuffer, Error, Result};
use crate::handshake::state::HandshakeVariant;
use crate::utils::{generate_random_bytes, calculate_hmac_sha256, current_timestamp};

/// RTMP version
pub const RTMP_VERSION: u8 = 3;

/// Handshake packet size (C1/S1/C2/S2)
pub const HANDSHAKE_SIZE: usize = 1536;

/// Modulus applied to the zone's leading 4 bytes when locating the digest.
const DIGEST_MODULUS: usize = 728;

/// The two candidate digest zone base offsets within the 1536-byte C1 body.
const ZONE_BASES: [usize; 2] = [8, 772];

/// First 30 bytes of "Genuine Adobe Flash Player 001" plus the well-known 32-byte suffix,
/// used to verify the digest a client embeds in C1.
const FP_KEY_FULL: &[u8] = &[
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b', b'e', b' ', b'F',
    b'l', b'a', b's', b'h', b' ', b'P', b'l', b'a', b'y', b'e', b'r', b' ', b'0', b'0', b'1',
    0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E, 0x00, 0xD0, 0xD1, 0x02, 0x9E, 0x7E,
    0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB, 0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB,
    0x31, 0xAE,
];

/// First 30 bytes of the key above, the portion actually used to verify a client digest.
pub(crate) const FP_KEY_30: &[u8] = &FP_KEY_FULL[..30];

/// Full Genuine Adobe Flash Media Server key (36-byte ASCII prefix + the same 32-byte suffix).
pub(crate) const FMS_KEY_FULL: &[u8] = &[
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b', b'e', b' ', b'F',
    b'l', b'a', b's', b'h', b' ', b'M', b'e', b'd', b'i', b'a', b' ', b'S', b'e', b'r', b'v',
    b'e', b'r', b' ', b'0', b'0', b'1', 0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E,
    0x00, 0xD0, 0xD1, 0x02, 0x9E, 0x7E, 0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB,
    0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB, 0x31, 0xAE,
];

/// First 36 bytes of [`FMS_KEY_FULL`], used when embedding the S1 digest.
pub(crate) const FMS_KEY_36: &[u8] = &FMS_KEY_FULL[..36];

/// Client handshake (C0 + C1)
#[derive(Debug, Clone)]
pub struct C0C1 {
    /// RTMP version (C0)
    pub version: u8,

    /// Timestamp (C1)
    pub timestamp: u32,

    /// Second 4-byte field of C1. Zero for the simple handshake, a client version tag
    /// (non-zero) when the complex digest-verified handshake is in play.
    pub zero: u32,

    /// Random data (C1), 1528 bytes.
    pub random_data: Vec<u8>,
}

impl C0C1 {
    /// Parse C0+C1 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 1537 {
            return Err(Error::handshake(format!(
                "C0+C1 too short: {} bytes, expected 1537",
                data.len()
            )));
        }

        // Parse C0
        let version = data[0];
        if version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported RTMP version: {}, expected {}",
                version, RTMP_VERSION
            )));
        }

        // Parse C1
        let c1_data = &data[1..1537];
        let mut buffer = ByteBuffer::new(c1_data.to_vec());

        let timestamp = buffer
            .read_u32_be()
            .map_err(|e| Error::handshake(format!("Failed to read timestamp: {}", e)))?;

        let zero = buffer
            .read_u32_be()
            .map_err(|e| Error::handshake(format!("Failed to read zero: {}", e)))?;

        let random_data = buffer
            .read_bytes(HANDSHAKE_SIZE - 8)
            .map_err(|e| Error::handshake(format!("Failed to read random data: {}", e)))?;

        Ok(C0C1 {
            version,
            timestamp,
            zero,
            random_data,
        })
    }

    /// Create C0+C1 for client use in tests
    pub fn create_client() -> Self {
        C0C1 {
            version: RTMP_VERSION,
            timestamp: current_timestamp(),
            zero: 0,
            random_data: generate_random_bytes(HANDSHAKE_SIZE - 8),
        }
    }

    /// The full 1536-byte C1 body (timestamp + zero + random), as it appears on the wire.
    pub fn full_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HANDSHAKE_SIZE);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.zero.to_be_bytes());
        out.extend_from_slice(&self.random_data);
        out
    }

    /// Encode to bytes (C0 + C1)
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(1537);
        result.push(self.version);
        result.extend_from_slice(&self.full_bytes());
        result
    }

    /// Locate and verify the complex-handshake digest: try the zone at offset 8, then the
    /// zone at offset 772. Returns the variant and, for the complex case, the verified
    /// 32-byte digest plus its absolute position.
    pub fn detect_variant(&self) -> Result<(HandshakeVariant, Option<[u8; 32]>)> {
        if self.zero == 0 {
            return Ok((HandshakeVariant::Simple, None));
        }

        let full = self.full_bytes();
        for &zone_base in &ZONE_BASES {
            if zone_base + 4 > full.len() {
                continue;
            }
            let offset_field = u32::from_be_bytes([
                full[zone_base],
                full[zone_base + 1],
                full[zone_base + 2],
                full[zone_base + 3],
            ]);
            let digest_pos = zone_base + 4 + (offset_field as usize % DIGEST_MODULUS);
            if digest_pos + 32 > full.len() {
                continue;
            }

            let mut message = Vec::with_capacity(full.len() - 32);
            message.extend_from_slice(&full[..digest_pos]);
            message.extend_from_slice(&full[digest_pos + 32..]);

            let expected = calculate_hmac_sha256(FP_KEY_30, &message);
            if expected.as_slice() == &full[digest_pos..digest_pos + 32] {
                let mut digest = [0u8; 32];
                digest.copy_from_slice(&full[digest_pos..digest_pos + 32]);
                return Ok((HandshakeVariant::Complex { digest_pos }, Some(digest)));
            }
        }

        Err(Error::handshake(
            "complex handshake digest did not verify against either candidate zone",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c0c1_creation() {
        let c0c1 = C0C1::create_client();
        assert_eq!(c0c1.version, RTMP_VERSION);
        assert_eq!(c0c1.zero, 0);
        assert_eq!(c0c1.random_data.len(), HANDSHAKE_SIZE - 8);
    }

    #[test]
    fn test_c0c1_round_trip() {
        let original = C0C1::create_client();
        let bytes = original.encode();
        assert_eq!(bytes.len(), 1537);

        let parsed = C0C1::parse(&bytes).unwrap();
        assert_eq!(parsed.version, original.version);
        assert_eq!(parsed.timestamp, original.timestamp);
        assert_eq!(parsed.zero, original.zero);
    }

    #[test]
    fn test_simple_variant_detected() {
        let c0c1 = C0C1::create_client();
        let (variant, digest) = c0c1.detect_variant().unwrap();
        assert_eq!(variant, HandshakeVariant::Simple);
        assert!(digest.is_none());
    }

    #[test]
    fn test_complex_variant_offset_8_round_trips() {
        // Build a C1 with a verifiable digest at the offset-8 zone.
        let timestamp = current_timestamp();
        let zero = 0x01020304u32; // any non-zero value signals "complex"
        let mut random_data = generate_random_bytes(HANDSHAKE_SIZE - 8);

        let offset_field = u32::from_be_bytes([random_data[0], random_data[1], random_data[2], random_data[3]]);
        let digest_pos = 8 + 4 + (offset_field as usize % DIGEST_MODULUS);
        let rel = digest_pos - 8;

        let mut full = Vec::with_capacity(HANDSHAKE_SIZE);
        full.extend_from_slice(&timestamp.to_be_bytes());
        full.extend_from_slice(&zero.to_be_bytes());
        full.extend_from_slice(&random_data);

        let mut message = Vec::with_capacity(full.len() - 32);
        message.extend_from_slice(&full[..digest_pos]);
        message.extend_from_slice(&full[digest_pos + 32..]);
        let digest = calculate_hmac_sha256(FP_KEY_30, &message);
        random_data[rel..rel + 32].copy_from_slice(&digest);

        let c0c1 = C0C1 {
            version: RTMP_VERSION,
            timestamp,
            zero,
            random_data,
        };

        let (variant, client_digest) = c0c1.detect_variant().unwrap();
        match variant {
            HandshakeVariant::Complex { digest_pos: found } => assert_eq!(found, digest_pos),
            _ => panic!("expected complex variant"),
        }
        assert_eq!(&client_digest.unwrap()[..], &digest[..]);
    }
}
