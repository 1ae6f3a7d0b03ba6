use crate::{ByteBuffer, Error, Result};
use crate::handshake::c0c1::{C0C1, FMS_KEY_36, FMS_KEY_FULL, RTMP_VERSION, HANDSHAKE_SIZE};
use crate::handshake::state::HandshakeVariant;
use crate::utils::{generate_random_bytes, calculate_hmac_sha256, current_timestamp};

/// Digest zone base the server always uses when embedding the S1 digest. The scheme the
/// client picked for C1 is independent of the one the server picks for S1, so this is
/// fixed rather than mirrored from the client's zone (see DESIGN.md's Open Question note).
const S1_ZONE_BASE: usize = 8;

const DIGEST_MODULUS: usize = 728;

/// Server handshake (S0 + S1 + S2)
#[derive(Debug, Clone)]
pub struct S0S1S2 {
    /// RTMP version (S0)
    pub version: u8,

    /// S1 timestamp
    pub s1_timestamp: u32,

    /// S1 zero (non-zero only for the complex variant)
    pub s1_zero: u32,

    /// S1 random data (1528 bytes), carrying the embedded digest for the complex variant
    pub s1_random: Vec<u8>,

    /// S2 timestamp (echo of C1 timestamp)
    pub s2_timestamp: u32,

    /// S2 timestamp2 (current server time)
    pub s2_timestamp2: u32,

    /// S2 payload: random bytes for the simple variant, or 1504 random bytes followed by
    /// a 32-byte HMAC digest for the complex variant
    pub s2_random_echo: Vec<u8>,
}

impl S0S1S2 {
    /// Generate a simple-handshake S0+S1+S2 response for C0+C1.
    pub fn generate(c0c1: &C0C1) -> Result<Self> {
        if c0c1.version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported client version: {}",
                c0c1.version
            )));
        }

        let s1_random = generate_random_bytes(HANDSHAKE_SIZE - 8);

        Ok(S0S1S2 {
            version: RTMP_VERSION,
            s1_timestamp: current_timestamp(),
            s1_zero: 0,
            s1_random,
            s2_timestamp: c0c1.timestamp,
            s2_timestamp2: current_timestamp(),
            s2_random_echo: c0c1.random_data.clone(),
        })
    }

    /// Generate a complex-handshake (HMAC-SHA256 digest verified) S0+S1+S2 response.
    ///
    /// `client_digest` is the 32-byte digest `C0C1::detect_variant` already verified
    /// against the client's C1.
    pub fn generate_complex(c0c1: &C0C1, client_digest: &[u8; 32]) -> Result<Self> {
        if c0c1.version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported client version: {}",
                c0c1.version
            )));
        }

        // S1: a fresh 1528-byte random body with our own digest embedded at a fixed zone,
        // computed over the FMS key with the digest window itself excised.
        let mut s1_random = generate_random_bytes(HANDSHAKE_SIZE - 8);
        let s1_zero = 0x0102_0304u32;

        let offset_field = u32::from_be_bytes([
            s1_random[S1_ZONE_BASE - 8],
            s1_random[S1_ZONE_BASE - 8 + 1],
            s1_random[S1_ZONE_BASE - 8 + 2],
            s1_random[S1_ZONE_BASE - 8 + 3],
        ]);
        // s1_random starts at byte 8 of the full S1 body (timestamp+zero precede it), so
        // positions here are relative to s1_random itself.
        let digest_pos = 4 + (offset_field as usize % DIGEST_MODULUS);
        if digest_pos + 32 > s1_random.len() {
            return Err(Error::handshake("computed S1 digest position out of range"));
        }

        let mut full_s1 = Vec::with_capacity(HANDSHAKE_SIZE);
        full_s1.extend_from_slice(&current_timestamp().to_be_bytes());
        full_s1.extend_from_slice(&s1_zero.to_be_bytes());
        full_s1.extend_from_slice(&s1_random);

        let abs_digest_pos = 8 + digest_pos;
        let mut message = Vec::with_capacity(full_s1.len() - 32);
        message.extend_from_slice(&full_s1[..abs_digest_pos]);
        message.extend_from_slice(&full_s1[abs_digest_pos + 32..]);
        let digest = calculate_hmac_sha256(FMS_KEY_36, &message);
        s1_random[digest_pos..digest_pos + 32].copy_from_slice(&digest);

        let s1_timestamp = u32::from_be_bytes([full_s1[0], full_s1[1], full_s1[2], full_s1[3]]);

        // S2: 1504 random bytes followed by a digest keyed off the client's own C1 digest.
        let s2_key = calculate_hmac_sha256(FMS_KEY_FULL, client_digest);
        let mut s2_message = generate_random_bytes(HANDSHAKE_SIZE - 32);
        let s2_digest = calculate_hmac_sha256(&s2_key, &s2_message);
        s2_message.extend_from_slice(&s2_digest);

        Ok(S0S1S2 {
            version: RTMP_VERSION,
            s1_timestamp,
            s1_zero,
            s1_random,
            s2_timestamp: c0c1.timestamp,
            s2_timestamp2: current_timestamp(),
            s2_random_echo: s2_message,
        })
    }

    /// Dispatch to the simple or complex generator based on what `detect_variant` found.
    pub fn generate_for(c0c1: &C0C1, variant: HandshakeVariant, digest: Option<[u8; 32]>) -> Result<Self> {
        match variant {
            HandshakeVariant::Simple => Self::generate(c0c1),
            HandshakeVariant::Complex { .. } => {
                let digest = digest.ok_or_else(|| {
                    Error::handshake("complex variant requires a verified client digest")
                })?;
                Self::generate_complex(c0c1, &digest)
            }
        }
    }

    /// Encode to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(1 + HANDSHAKE_SIZE * 2);

        // S0
        result.push(self.version);

        // S1
        let mut s1_buffer = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        s1_buffer.write_u32_be(self.s1_timestamp).unwrap();
        s1_buffer.write_u32_be(self.s1_zero).unwrap();
        s1_buffer.write_bytes(&self.s1_random).unwrap();
        result.extend_from_slice(&s1_buffer.to_vec());

        // S2
        let mut s2_buffer = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        s2_buffer.write_u32_be(self.s2_timestamp).unwrap();
        s2_buffer.write_u32_be(self.s2_timestamp2).unwrap();
        s2_buffer.write_bytes(&self.s2_random_echo).unwrap();
        result.extend_from_slice(&s2_buffer.to_vec());

        result
    }

    /// Parse S0+S1+S2 from bytes (for test helpers emulating the client side)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 1 + HANDSHAKE_SIZE * 2 {
            return Err(Error::handshake(format!(
                "S0+S1+S2 too short: {} bytes",
                data.len()
            )));
        }

        let version = data[0];

        let s1_data = &data[1..1537];
        let mut s1_buffer = ByteBuffer::new(s1_data.to_vec());
        let s1_timestamp = s1_buffer.read_u32_be()?;
        let s1_zero = s1_buffer.read_u32_be()?;
        let s1_random = s1_buffer.read_bytes(HANDSHAKE_SIZE - 8)?;

        let s2_data = &data[1537..3073];
        let mut s2_buffer = ByteBuffer::new(s2_data.to_vec());
        let s2_timestamp = s2_buffer.read_u32_be()?;
        let s2_timestamp2 = s2_buffer.read_u32_be()?;
        let s2_random_echo = s2_buffer.read_bytes(HANDSHAKE_SIZE - 8)?;

        Ok(S0S1S2 {
            version,
            s1_timestamp,
            s1_zero,
            s1_random,
            s2_timestamp,
            s2_timestamp2,
            s2_random_echo,
        })
    }
}

/// C2 packet for completing the handshake
#[derive(Debug, Clone)]
pub struct C2 {
    pub timestamp: u32,
    pub timestamp2: u32,
    pub random_echo: Vec<u8>,
}

impl C2 {
    /// Create C2 from S0+S1+S2 (test helper emulating the client side)
    pub fn create_from_s1(s0s1s2: &S0S1S2) -> Self {
        C2 {
            timestamp: s0s1s2.s1_timestamp,
            timestamp2: current_timestamp(),
            random_echo: s0s1s2.s1_random.clone(),
        }
    }

    /// Parse C2 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HANDSHAKE_SIZE {
            return Err(Error::handshake(format!("C2 too short: {} bytes", data.len())));
        }

        let mut buffer = ByteBuffer::new(data.to_vec());
        let timestamp = buffer.read_u32_be()?;
        let timestamp2 = buffer.read_u32_be()?;
        let random_echo = buffer.read_bytes(HANDSHAKE_SIZE - 8)?;

        Ok(C2 {
            timestamp,
            timestamp2,
            random_echo,
        })
    }

    /// Validate C2 against the S1 we sent. The simple variant mandates an exact echo;
    /// the complex variant only requires the timestamp to round-trip, since clients are
    /// free to send fresh random bytes in C2 once the digest exchange has verified trust.
    pub fn validate(&self, s0s1s2: &S0S1S2, variant: HandshakeVariant) -> Result<()> {
        if self.timestamp != s0s1s2.s1_timestamp {
            return Err(Error::handshake("C2 timestamp mismatch"));
        }

        if let HandshakeVariant::Simple = variant {
            if self.random_echo != s0s1s2.s1_random {
                return Err(Error::handshake("C2 random echo mismatch"));
            }
        }

        Ok(())
    }

    /// Encode to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        buffer.write_u32_be(self.timestamp).unwrap();
        buffer.write_u32_be(self.timestamp2).unwrap();
        buffer.write_bytes(&self.random_echo).unwrap();
        buffer.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_handshake_flow() {
        let c0c1 = C0C1::create_client();
        let s0s1s2 = S0S1S2::generate(&c0c1).unwrap();
        assert_eq!(s0s1s2.version, RTMP_VERSION);
        assert_eq!(s0s1s2.s2_timestamp, c0c1.timestamp);

        let c2 = C2::create_from_s1(&s0s1s2);
        c2.validate(&s0s1s2, HandshakeVariant::Simple).unwrap();
    }

    #[test]
    fn test_complex_handshake_s1_digest_verifies() {
        // Build a client C1 carrying a verifiable digest at the offset-8 zone.
        let timestamp = current_timestamp();
        let zero = 0x0102_0304u32;
        let mut random_data = generate_random_bytes(HANDSHAKE_SIZE - 8);

        let offset_field = u32::from_be_bytes([random_data[0], random_data[1], random_data[2], random_data[3]]);
        let digest_pos = 4 + (offset_field as usize % DIGEST_MODULUS);

        let mut full = Vec::with_capacity(HANDSHAKE_SIZE);
        full.extend_from_slice(&timestamp.to_be_bytes());
        full.extend_from_slice(&zero.to_be_bytes());
        full.extend_from_slice(&random_data);

        let abs_pos = 8 + digest_pos;
        let mut message = Vec::with_capacity(full.len() - 32);
        message.extend_from_slice(&full[..abs_pos]);
        message.extend_from_slice(&full[abs_pos + 32..]);
        let digest = calculate_hmac_sha256(crate::handshake::c0c1::FP_KEY_30, &message);
        random_data[digest_pos..digest_pos + 32].copy_from_slice(&digest);

        let c0c1 = C0C1 {
            version: RTMP_VERSION,
            timestamp,
            zero,
            random_data,
        };

        let (variant, client_digest) = c0c1.detect_variant().unwrap();
        let client_digest = client_digest.unwrap();

        let s0s1s2 = S0S1S2::generate_for(&c0c1, variant, Some(client_digest)).unwrap();

        // The server's own S1 digest must verify against the FMS key the same way the
        // client's C1 digest verified against the Flash Player key.
        let full_s1 = {
            let mut v = Vec::with_capacity(HANDSHAKE_SIZE);
            v.extend_from_slice(&s0s1s2.s1_timestamp.to_be_bytes());
            v.extend_from_slice(&s0s1s2.s1_zero.to_be_bytes());
            v.extend_from_slice(&s0s1s2.s1_random);
            v
        };
        let offset_field = u32::from_be_bytes([
            full_s1[S1_ZONE_BASE],
            full_s1[S1_ZONE_BASE + 1],
            full_s1[S1_ZONE_BASE + 2],
            full_s1[S1_ZONE_BASE + 3],
        ]);
        let s1_digest_pos = S1_ZONE_BASE + 4 + (offset_field as usize % DIGEST_MODULUS);
        let mut s1_message = Vec::with_capacity(full_s1.len() - 32);
        s1_message.extend_from_slice(&full_s1[..s1_digest_pos]);
        s1_message.extend_from_slice(&full_s1[s1_digest_pos + 32..]);
        let expected = calculate_hmac_sha256(FMS_KEY_36, &s1_message);
        assert_eq!(&expected[..], &full_s1[s1_digest_pos..s1_digest_pos + 32]);

        // S2's digest must verify against HMAC(FMS_KEY_FULL, client_digest).
        let s2_key = calculate_hmac_sha256(FMS_KEY_FULL, &client_digest);
        let expected_s2_digest = calculate_hmac_sha256(&s2_key, &s0s1s2.s2_random_echo[..HANDSHAKE_SIZE - 32]);
        assert_eq!(&expected_s2_digest[..], &s0s1s2.s2_random_echo[HANDSHAKE_SIZE - 32..]);
    }
}
