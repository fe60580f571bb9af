//! Raw chunk payload obfuscation
//!
//! Raw payloads are XORed with a single-byte key that starts at `0xAA` and
//! increments (wrapping) for every byte. This is a fixed, reversible
//! transform, not encryption.

/// First key byte of the schedule
pub const XOR_KEY_START: u8 = 0xAA;

/// Remove the obfuscation from a raw payload in place
pub fn deobfuscate(data: &mut [u8]) {
    apply_key_schedule(data);
}

/// Obfuscate a raw payload in place (used when writing containers)
pub fn obfuscate(data: &mut [u8]) {
    apply_key_schedule(data);
}

fn apply_key_schedule(data: &mut [u8]) {
    let mut key = XOR_KEY_START;
    for byte in data.iter_mut() {
        *byte ^= key;
        key = key.wrapping_add(1);
    }
}
