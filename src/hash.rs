//! Key distribution across the configured server list
//!
//! Same hash family names as libmemcached's `hash=` option. Server selection
//! is modula: `hash(key) % servers`.

use serde::Deserialize;
use tracing::debug;

/// Hashing algorithm used to pick a server for a physical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum HashAlgorithm {
    /// Bob Jenkins' one-at-a-time
    #[default]
    Default,
    Crc,
    Fnv1_64,
    Fnv1a64,
    Fnv1_32,
    Fnv1a32,
    Murmur,
}

impl HashAlgorithm {
    /// Parse an algorithm name; unknown names select `Default`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" | "one_at_a_time" => Self::Default,
            "crc" => Self::Crc,
            "fnv1_64" => Self::Fnv1_64,
            "fnv1a_64" => Self::Fnv1a64,
            "fnv1_32" => Self::Fnv1_32,
            "fnv1a_32" => Self::Fnv1a32,
            "murmur" => Self::Murmur,
            other => {
                debug!(hash = other, "unknown hash algorithm, using default");
                Self::Default
            }
        }
    }

    /// Hash a physical key
    pub fn hash(self, key: &[u8]) -> u32 {
        match self {
            Self::Default => one_at_a_time(key),
            Self::Crc => crc(key),
            Self::Fnv1_64 => fnv1_64(key),
            Self::Fnv1a64 => fnv1a_64(key),
            Self::Fnv1_32 => fnv1_32(key),
            Self::Fnv1a32 => fnv1a_32(key),
            Self::Murmur => murmur(key),
        }
    }

    /// Index of the server owning `key`
    #[inline]
    pub fn server_index(self, key: &[u8], servers: usize) -> usize {
        if servers <= 1 {
            return 0;
        }
        self.hash(key) as usize % servers
    }
}

impl From<String> for HashAlgorithm {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

const FNV_64_INIT: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_64_PRIME: u64 = 0x0000_0100_0000_01b3;
const FNV_32_INIT: u32 = 0x811c_9dc5;
const FNV_32_PRIME: u32 = 0x0100_0193;

fn one_at_a_time(key: &[u8]) -> u32 {
    let mut value: u32 = 0;
    for &b in key {
        value = value.wrapping_add(u32::from(b));
        value = value.wrapping_add(value << 10);
        value ^= value >> 6;
    }
    value = value.wrapping_add(value << 3);
    value ^= value >> 11;
    value.wrapping_add(value << 15)
}

fn crc(key: &[u8]) -> u32 {
    let hash = (crc32fast::hash(key) >> 16) & 0x7fff;
    if hash == 0 { 1 } else { hash }
}

fn fnv1_64(key: &[u8]) -> u32 {
    let mut hash = FNV_64_INIT;
    for &b in key {
        hash = hash.wrapping_mul(FNV_64_PRIME);
        hash ^= u64::from(b);
    }
    hash as u32
}

fn fnv1a_64(key: &[u8]) -> u32 {
    let mut hash = FNV_64_INIT;
    for &b in key {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_64_PRIME);
    }
    hash as u32
}

fn fnv1_32(key: &[u8]) -> u32 {
    let mut hash = FNV_32_INIT;
    for &b in key {
        hash = hash.wrapping_mul(FNV_32_PRIME);
        hash ^= u32::from(b);
    }
    hash
}

fn fnv1a_32(key: &[u8]) -> u32 {
    let mut hash = FNV_32_INIT;
    for &b in key {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(FNV_32_PRIME);
    }
    hash
}

/// MurmurHash2, seeded with the key length like libmemcached does
fn murmur(key: &[u8]) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let len = key.len() as u32;
    let seed = 0xdead_beef_u32.wrapping_mul(len);
    let mut h = seed ^ len;

    let mut chunks = key.chunks_exact(4);
    for chunk in chunks.by_ref() {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^ (h >> 15)
}
