/// Identifier of a monitored chain, including the relay chain itself.
pub type ChainId = u64;

/// Height of a block on some chain.
pub type BlockHeight = u64;

/// Chain-agnostic unix timestamp in seconds.
pub type Timestamp = u64;

/// Lower-cases a hash so that lookups are case-insensitive.
pub fn normalize_hash(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}
