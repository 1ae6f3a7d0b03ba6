mod state;
mod c0c1;
mod s0s1s2;

pub use state::*;
pub use c0c1::*;
pub use s0s1s2::*;

use crate::Result;

/// Parse and verify C0+C1, returning the client packet plus the variant (and, for the
/// complex variant, the verified digest) detected by the zone-search algorithm.
pub fn validate_c0c1(data: &[u8]) -> Result<(C0C1, HandshakeVariant, Option<[u8; 32]>)> {
    let c0c1 = C0C1::parse(data)?;
    let (variant, digest) = c0c1.detect_variant()?;
    Ok((c0c1, variant, digest))
}

/// Build the S0+S1+S2 response matching the variant the client used.
pub fn generate_s0s1s2(c0c1: &C0C1, variant: HandshakeVariant, digest: Option<[u8; 32]>) -> Result<S0S1S2> {
    S0S1S2::generate_for(c0c1, variant, digest)
}

/// Validate a received C2 against the S0S1S2 we sent.
pub fn validate_c2(c2_data: &[u8], s0s1s2: &S0S1S2, variant: HandshakeVariant) -> Result<()> {
    let c2 = C2::parse(c2_data)?;
    c2.validate(s0s1s2, variant)
}
