/// Length of a decoded Solana public key.
pub const PUBKEY_LEN: usize = 32;

/// Whether `address` is base58 for exactly [`PUBKEY_LEN`] bytes.
pub fn is_valid_address(address: &str) -> bool {
    let mut buf = [0u8; PUBKEY_LEN];
    // A longer payload fails with BufferTooSmall; a shorter one decodes to
    // fewer bytes.
    matches!(bs58::decode(address).onto(&mut buf[..]), Ok(PUBKEY_LEN))
}
