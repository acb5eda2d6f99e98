//! Cartridge identity checksum
//!
//! Standard CRC-32 (reflected polynomial 0xEDB88320, as used by ZIP and PNG).
//! Identifies a cartridge semi-uniquely so its save-RAM can be keyed by it.

use std::sync::OnceLock;

const POLYNOMIAL: u32 = 0xEDB8_8320;

static CRC32_TABLE: OnceLock<[u32; 256]> = OnceLock::new();

fn crc32_table() -> &'static [u32; 256] {
    CRC32_TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (n, entry) in table.iter_mut().enumerate() {
            let mut c = n as u32;
            for _ in 0..8 {
                c = if c & 1 != 0 {
                    POLYNOMIAL ^ (c >> 1)
                } else {
                    c >> 1
                };
            }
            *entry = c;
        }
        table
    })
}

/// Compute the CRC-32 checksum of a byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    let table = crc32_table();
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc = (crc >> 8) ^ table[((crc ^ byte as u32) & 0xFF) as usize];
    }
    crc ^ 0xFFFF_FFFF
}

/// Storage key for a cartridge checksum (decimal string)
pub fn storage_key(checksum: u32) -> String {
    checksum.to_string()
}
