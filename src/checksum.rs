//! CRC-32 checksums and connect-cache key formatting.

/// Suffix appended to every cache key; marks the primary cache slot.
const PRIMARY_SLOT_SUFFIX: &str = "1";

/// Compute the standard CRC-32 (IEEE, reflected, `0xEDB88320`) of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Render a checksum as a cache key: uppercase hex with leading zeros removed,
/// followed by the primary slot suffix.
///
/// A zero checksum leaves no hex digits, so the key is just the suffix.
pub fn format_checksum_key(checksum: u32) -> String {
    let hex = format!("{:08X}", checksum);
    let mut key = hex.trim_start_matches('0').to_string();
    key.push_str(PRIMARY_SLOT_SUFFIX);
    key
}

/// Cache key for an account name.
pub fn format_cache_key(account_name: &str) -> String {
    format_checksum_key(crc32(account_name.as_bytes()))
}
