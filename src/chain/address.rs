const ADDRESS_BYTES: usize = 32;

/// A Solana address is the base58 encoding of a 32-byte public key.
pub fn is_valid_address(value: &str) -> bool {
    let value = value.trim();
    if !(32..=44).contains(&value.len()) {
        return false;
    }

    bs58::decode(value)
        .into_vec()
        .is_ok_and(|bytes| bytes.len() == ADDRESS_BYTES)
}
