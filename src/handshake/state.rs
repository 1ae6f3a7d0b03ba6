/// Which variant of the handshake a C1 turned out to carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandshakeVariant {
    /// Bytes 4..8 of C1 are all zero: no digest, plain random exchange.
    Simple,

    /// A verified HMAC-SHA256 digest was found in one of the two candidate zones.
    Complex {
        /// Absolute byte offset of the 32-byte digest within the 1536-byte C1 body.
        digest_pos: usize,
    },
}
