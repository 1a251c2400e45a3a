//! Module to generate random identifiers for testing.

use rand::{rngs::OsRng, Rng};

/// Generates a random 32-byte transaction hash, hex-encoded with a `0x` prefix.
pub fn generate_hash() -> String {
    let mut hash = [0u8; 32];
    OsRng.fill(&mut hash);

    format!("0x{}", hex::encode(hash))
}

/// Generates a random 20-byte account or contract address, hex-encoded with a `0x` prefix.
pub fn generate_address() -> String {
    let mut address = [0u8; 20];
    OsRng.fill(&mut address);

    format!("0x{}", hex::encode(address))
}

/// Generates a random block height in a range that leaves room for the checkpoints of a test.
pub fn generate_height() -> u64 {
    OsRng.gen_range(1_000..1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_hashes_are_prefixed_hex() {
        let hash = generate_hash();
        assert_eq!(hash.len(), 66);
        assert!(hash.starts_with("0x"));
        assert!(hex::decode(&hash[2..]).is_ok());

        assert_ne!(generate_hash(), hash, "hashes must be random");
        assert_eq!(generate_address().len(), 42);
    }
}
