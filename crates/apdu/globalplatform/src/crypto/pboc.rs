//! PBOC sub-key diversification and length-prefixed encryption

use super::block::{self, BLOCK_SIZE, Block, Mode};
use crate::error::{CryptoInputError, CryptoInputKind};

/// One level of key diversification
///
/// The sub-key is `3DES(factor) ‖ 3DES(!factor)` under the double-length
/// master key, in ECB mode.
pub fn diversify_level1(key: &[u8], factor: &Block) -> Result<[u8; 16], CryptoInputError> {
    if key.len() != 16 {
        return Err(CryptoInputError::new("key", CryptoInputKind::KeyLength(key.len())));
    }
    let inverted = factor.map(|byte| !byte);

    let mut input = [0u8; 16];
    input[..8].copy_from_slice(factor);
    input[8..].copy_from_slice(&inverted);

    let encrypted = block::tdes_encrypt(&input, key, Mode::Ecb)?;
    let mut sub_key = [0u8; 16];
    sub_key.copy_from_slice(&encrypted);
    Ok(sub_key)
}

/// Two levels of diversification: the level-one sub-key diversified again
pub fn diversify_level2(
    key: &[u8],
    factor1: &Block,
    factor2: &Block,
) -> Result<[u8; 16], CryptoInputError> {
    let intermediate = diversify_level1(key, factor1)?;
    diversify_level1(&intermediate, factor2)
}

/// Triple-DES ECB encryption of `len(data) ‖ data`, padded with `80 00..`
/// only when the framed input is not block aligned
pub fn length_prefixed_encrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoInputError> {
    if key.len() != 16 {
        return Err(CryptoInputError::new("key", CryptoInputKind::KeyLength(key.len())));
    }
    let Ok(length) = u8::try_from(data.len()) else {
        return Err(CryptoInputError::new(
            "data",
            CryptoInputKind::TooLong(data.len()),
        ));
    };

    let mut framed = Vec::with_capacity(data.len() + 1 + BLOCK_SIZE);
    framed.push(length);
    framed.extend_from_slice(data);
    if framed.len() % BLOCK_SIZE != 0 {
        framed.push(0x80);
        framed.resize(framed.len().next_multiple_of(BLOCK_SIZE), 0x00);
    }
    block::tdes_encrypt(&framed, key, Mode::Ecb)
}
