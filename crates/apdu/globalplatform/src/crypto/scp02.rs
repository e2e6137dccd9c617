//! SCP02 session key derivation, cryptograms and command MACs

use super::block::{self, BLOCK_SIZE, Block, Mode};
use super::mac;
use crate::constants::derivation;
use crate::error::{CryptoInputError, CryptoInputKind};

/// Double-length session key
pub type SessionKey = [u8; 16];

/// Derive an SCP02 session key
///
/// The base key encrypts `constant ‖ sequence counter ‖ 00 * 12` with
/// triple-DES CBC and a zero IV.
pub fn derive_session_key(
    base_key: &[u8],
    sequence_counter: &[u8; 2],
    constant: &[u8; 2],
) -> Result<SessionKey, CryptoInputError> {
    let mut derivation_data = [0u8; 16];
    derivation_data[..2].copy_from_slice(constant);
    derivation_data[2..4].copy_from_slice(sequence_counter);

    let derived = block::tdes_encrypt(&derivation_data, base_key, Mode::cbc_zero())?;
    let mut key = [0u8; 16];
    key.copy_from_slice(&derived);
    Ok(key)
}

/// Derivation constant for each SCP02 session key, in C-MAC, R-MAC, S-ENC, DEK order
pub const ALL_CONSTANTS: [[u8; 2]; 4] = [
    derivation::CMAC,
    derivation::RMAC,
    derivation::ENC,
    derivation::DEK,
];

/// Cryptogram the card is expected to return from INITIALIZE UPDATE
pub fn card_cryptogram(
    enc_key: &[u8],
    sequence_counter: &[u8; 2],
    card_challenge: &[u8; 6],
    host_challenge: &[u8; 8],
) -> Result<Block, CryptoInputError> {
    let mut input = Vec::with_capacity(16);
    input.extend_from_slice(host_challenge);
    input.extend_from_slice(sequence_counter);
    input.extend_from_slice(card_challenge);
    cryptogram(enc_key, &input)
}

/// Cryptogram the host sends in EXTERNAL AUTHENTICATE
pub fn host_cryptogram(
    enc_key: &[u8],
    sequence_counter: &[u8; 2],
    card_challenge: &[u8; 6],
    host_challenge: &[u8; 8],
) -> Result<Block, CryptoInputError> {
    let mut input = Vec::with_capacity(16);
    input.extend_from_slice(sequence_counter);
    input.extend_from_slice(card_challenge);
    input.extend_from_slice(host_challenge);
    cryptogram(enc_key, &input)
}

/// Last block of triple-DES CBC (zero IV) over the padded challenge data
fn cryptogram(enc_key: &[u8], input: &[u8]) -> Result<Block, CryptoInputError> {
    let encrypted = block::tdes_encrypt(&mac::pad(input), enc_key, Mode::cbc_zero())?;
    let mut result = [0u8; BLOCK_SIZE];
    result.copy_from_slice(&encrypted[encrypted.len() - BLOCK_SIZE..]);
    Ok(result)
}

/// C-MAC over a command header and data, Lc already increased by 8
pub fn command_mac(apdu: &[u8], cmac_key: &[u8], icv: &Block) -> Result<Block, CryptoInputError> {
    mac::retail_mac(apdu, cmac_key, icv)
}

/// ICV for the next command in chained mode: the previous C-MAC encrypted
/// with single DES under the left half of the C-MAC key
pub fn encrypt_icv(previous_mac: &Block, cmac_key: &[u8]) -> Result<Block, CryptoInputError> {
    if cmac_key.len() < BLOCK_SIZE {
        return Err(CryptoInputError::new(
            "key",
            CryptoInputKind::KeyLength(cmac_key.len()),
        ));
    }
    let mut icv = *previous_mac;
    block::des_encrypt_block(&cmac_key[..BLOCK_SIZE], &mut icv)?;
    Ok(icv)
}
