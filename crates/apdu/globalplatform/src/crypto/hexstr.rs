//! Hex-string front end to the cipher and MAC primitives
//!
//! Scripts and the command line deal in hex text; these wrappers decode the
//! arguments, name the argument that failed, and return upper-case hex.

use super::block::{self, BLOCK_SIZE, Block, Mode};
use super::mac::{self, MacLength};
use super::scp02;
use crate::error::{CryptoInputError, CryptoInputKind};

/// Encrypt hex `data` with single DES; ECB without `iv`, CBC with it
pub fn des_encrypt(data: &str, key: &str, iv: Option<&str>) -> Result<String, CryptoInputError> {
    run(data, key, iv, block::des_encrypt)
}

/// Decrypt hex `data` with single DES; ECB without `iv`, CBC with it
pub fn des_decrypt(data: &str, key: &str, iv: Option<&str>) -> Result<String, CryptoInputError> {
    run(data, key, iv, block::des_decrypt)
}

/// Encrypt hex `data` with triple DES; ECB without `iv`, CBC with it
pub fn tdes_encrypt(data: &str, key: &str, iv: Option<&str>) -> Result<String, CryptoInputError> {
    run(data, key, iv, block::tdes_encrypt)
}

/// Decrypt hex `data` with triple DES; ECB without `iv`, CBC with it
pub fn tdes_decrypt(data: &str, key: &str, iv: Option<&str>) -> Result<String, CryptoInputError> {
    run(data, key, iv, block::tdes_decrypt)
}

/// Retail MAC of hex `text`; an empty `icv` means all zeros
pub fn mac(
    text: &str,
    key: &str,
    icv: &str,
    length: MacLength,
) -> Result<String, CryptoInputError> {
    let text = decode("text", text)?;
    let key = decode("key", key)?;
    let icv = if icv.is_empty() {
        [0; BLOCK_SIZE]
    } else {
        decode_block("icv", icv)?
    };
    let full = mac::retail_mac(&text, &key, &icv)?;
    Ok(hex::encode_upper(length.apply(&full)))
}

/// SCP02 session key derivation over hex arguments
pub fn derive(
    base_key: &str,
    sequence_counter: &str,
    constant: &str,
) -> Result<String, CryptoInputError> {
    let base_key = decode("base key", base_key)?;
    let sequence_counter = decode_array::<2>("sequence counter", sequence_counter)?;
    let constant = decode_array::<2>("constant", constant)?;
    let key = scp02::derive_session_key(&base_key, &sequence_counter, &constant)?;
    Ok(hex::encode_upper(key))
}

type Transform = fn(&[u8], &[u8], Mode) -> Result<Vec<u8>, CryptoInputError>;

fn run(
    data: &str,
    key: &str,
    iv: Option<&str>,
    transform: Transform,
) -> Result<String, CryptoInputError> {
    let data = decode("data", data)?;
    let key = decode("key", key)?;
    let mode = match iv {
        Some(iv) => Mode::Cbc(decode_block("iv", iv)?),
        None => Mode::Ecb,
    };
    transform(&data, &key, mode).map(hex::encode_upper)
}

fn decode(field: &'static str, value: &str) -> Result<Vec<u8>, CryptoInputError> {
    hex::decode(value).map_err(|_| CryptoInputError::new(field, CryptoInputKind::MalformedHex))
}

fn decode_block(field: &'static str, value: &str) -> Result<Block, CryptoInputError> {
    let bytes = decode(field, value)?;
    Block::try_from(bytes.as_slice())
        .map_err(|_| CryptoInputError::new(field, CryptoInputKind::IvLength(bytes.len())))
}

fn decode_array<const N: usize>(
    field: &'static str,
    value: &str,
) -> Result<[u8; N], CryptoInputError> {
    let bytes = decode(field, value)?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| CryptoInputError::new(field, CryptoInputKind::DataLength(bytes.len())))
}
