//! DES and triple-DES block operations in ECB and CBC mode
//!
//! Single DES takes an 8-byte key. Triple DES takes a double-length key
//! (K1 ‖ K2, used as K1 K2 K1) or a triple-length key (K1 ‖ K2 ‖ K3) and runs
//! encrypt-decrypt-encrypt.

use cipher::{
    BlockCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit,
    KeyIvInit, block_padding::NoPadding, generic_array::GenericArray,
};
use des::{Des, TdesEde3};
use zeroize::Zeroizing;

use crate::error::{CryptoInputError, CryptoInputKind};

/// DES block size in bytes
pub const BLOCK_SIZE: usize = 8;

/// One DES block
pub type Block = [u8; BLOCK_SIZE];

/// Block chaining mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every block transformed independently
    Ecb,
    /// Cipher block chaining with the given IV
    Cbc(Block),
}

impl Mode {
    /// CBC with an all-zero IV
    pub const fn cbc_zero() -> Self {
        Self::Cbc([0; BLOCK_SIZE])
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Encrypt with single DES
pub fn des_encrypt(data: &[u8], key: &[u8], mode: Mode) -> Result<Vec<u8>, CryptoInputError> {
    check_des_key(key)?;
    transform::<Des>(data, key, mode, Direction::Encrypt)
}

/// Decrypt with single DES
pub fn des_decrypt(data: &[u8], key: &[u8], mode: Mode) -> Result<Vec<u8>, CryptoInputError> {
    check_des_key(key)?;
    transform::<Des>(data, key, mode, Direction::Decrypt)
}

/// Encrypt with triple DES (double or triple length key)
pub fn tdes_encrypt(data: &[u8], key: &[u8], mode: Mode) -> Result<Vec<u8>, CryptoInputError> {
    let key = expand_tdes_key(key)?;
    transform::<TdesEde3>(data, key.as_slice(), mode, Direction::Encrypt)
}

/// Decrypt with triple DES (double or triple length key)
pub fn tdes_decrypt(data: &[u8], key: &[u8], mode: Mode) -> Result<Vec<u8>, CryptoInputError> {
    let key = expand_tdes_key(key)?;
    transform::<TdesEde3>(data, key.as_slice(), mode, Direction::Decrypt)
}

/// Expand a double-length key to K1 ‖ K2 ‖ K1; triple-length keys pass through
pub fn expand_tdes_key(key: &[u8]) -> Result<Zeroizing<[u8; 24]>, CryptoInputError> {
    let mut expanded = Zeroizing::new([0u8; 24]);
    match key.len() {
        16 => {
            expanded[..16].copy_from_slice(key);
            expanded[16..].copy_from_slice(&key[..8]);
        }
        24 => expanded.copy_from_slice(key),
        n => return Err(CryptoInputError::new("key", CryptoInputKind::KeyLength(n))),
    }
    Ok(expanded)
}

/// Encrypt one block with single DES under `key`
pub(crate) fn des_encrypt_block(key: &[u8], block: &mut Block) -> Result<(), CryptoInputError> {
    let cipher = des_cipher(key)?;
    cipher.encrypt_block(GenericArray::from_mut_slice(block));
    Ok(())
}

/// Decrypt one block with single DES under `key`
pub(crate) fn des_decrypt_block(key: &[u8], block: &mut Block) -> Result<(), CryptoInputError> {
    let cipher = des_cipher(key)?;
    cipher.decrypt_block(GenericArray::from_mut_slice(block));
    Ok(())
}

fn des_cipher(key: &[u8]) -> Result<Des, CryptoInputError> {
    check_des_key(key)?;
    Des::new_from_slice(key)
        .map_err(|_| CryptoInputError::new("key", CryptoInputKind::KeyLength(key.len())))
}

const fn check_des_key(key: &[u8]) -> Result<(), CryptoInputError> {
    if key.len() == BLOCK_SIZE {
        Ok(())
    } else {
        Err(CryptoInputError::new("key", CryptoInputKind::KeyLength(key.len())))
    }
}

const fn check_data(data: &[u8]) -> Result<(), CryptoInputError> {
    if !data.is_empty() && data.len() % BLOCK_SIZE == 0 {
        Ok(())
    } else {
        Err(CryptoInputError::new("data", CryptoInputKind::DataLength(data.len())))
    }
}

fn transform<C>(
    data: &[u8],
    key: &[u8],
    mode: Mode,
    direction: Direction,
) -> Result<Vec<u8>, CryptoInputError>
where
    C: BlockCipher + BlockEncrypt + BlockDecrypt + KeyInit,
{
    check_data(data)?;
    let key_error = || CryptoInputError::new("key", CryptoInputKind::KeyLength(key.len()));
    let data_error = || CryptoInputError::new("data", CryptoInputKind::DataLength(data.len()));

    let mut buf = data.to_vec();
    let len = buf.len();
    match (mode, direction) {
        (Mode::Ecb, direction) => {
            let cipher = C::new_from_slice(key).map_err(|_| key_error())?;
            for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
                let block = GenericArray::from_mut_slice(chunk);
                match direction {
                    Direction::Encrypt => cipher.encrypt_block(block),
                    Direction::Decrypt => cipher.decrypt_block(block),
                }
            }
        }
        (Mode::Cbc(iv), Direction::Encrypt) => {
            cbc::Encryptor::<C>::new_from_slices(key, &iv)
                .map_err(|_| key_error())?
                .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                .map_err(|_| data_error())?;
        }
        (Mode::Cbc(iv), Direction::Decrypt) => {
            cbc::Decryptor::<C>::new_from_slices(key, &iv)
                .map_err(|_| key_error())?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| data_error())?;
        }
    }
    Ok(buf)
}
