//! ISO 9797-1 MAC algorithms over DES
//!
//! The workhorse is the retail MAC (algorithm 3): single-DES CBC under the
//! left key half, then one decrypt/encrypt round on the last block. The
//! single-DES and "final ECB" variants exist for legacy payment tooling.

use cbc_mac::{CbcMac, Mac};
use des::Des;

use super::block::{self, BLOCK_SIZE, Block, Mode};
use crate::error::{CryptoInputError, CryptoInputKind};

/// How many MAC bytes a caller keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MacLength {
    /// All eight bytes
    #[default]
    Full,
    /// The leftmost four bytes
    Truncated,
}

impl MacLength {
    /// Cut a computed MAC down to this length
    pub fn apply(self, mac: &Block) -> &[u8] {
        match self {
            Self::Full => mac,
            Self::Truncated => &mac[..4],
        }
    }
}

/// Apply ISO 9797-1 method 2 padding: `80` then zeros to the next block boundary
///
/// Input that is already aligned still gains a full padding block.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let mut padded = Vec::with_capacity(data.len() + BLOCK_SIZE);
    padded.extend_from_slice(data);
    padded.push(0x80);
    padded.resize(padded.len().next_multiple_of(BLOCK_SIZE), 0x00);
    padded
}

/// Retail MAC with a double or triple length key
///
/// A triple-length key uses K2 for the decrypt step and K3 for the final
/// encrypt.
pub fn retail_mac(data: &[u8], key: &[u8], icv: &Block) -> Result<Block, CryptoInputError> {
    let (key_a, key_b, key_c) = split_retail_key(key)?;
    let mut mac = des_cbc_mac(&pad(data), key_a, icv)?;
    block::des_decrypt_block(key_b, &mut mac)?;
    block::des_encrypt_block(key_c, &mut mac)?;
    Ok(mac)
}

/// Leftmost four bytes of [`retail_mac`], as used by PBOC/EMV issuer scripts
pub fn retail_mac32(data: &[u8], key: &[u8], icv: &Block) -> Result<[u8; 4], CryptoInputError> {
    retail_mac(data, key, icv).map(truncate)
}

/// Single-DES CBC MAC (ISO 9797-1 algorithm 1) with method 2 padding
pub fn single_des_mac(data: &[u8], key: &[u8], icv: &Block) -> Result<Block, CryptoInputError> {
    des_cbc_mac(&pad(data), key, icv)
}

/// Leftmost four bytes of [`single_des_mac`]
pub fn single_des_mac32(data: &[u8], key: &[u8], icv: &Block) -> Result<[u8; 4], CryptoInputError> {
    single_des_mac(data, key, icv).map(truncate)
}

/// Single-DES CBC under the left key half, finished with a full triple-DES
/// ECB encryption of the last block
pub fn tdes_mac_final_ecb(data: &[u8], key: &[u8], icv: &Block) -> Result<Block, CryptoInputError> {
    let (key_a, _, _) = split_retail_key(key)?;
    let chained = des_cbc_mac(&pad(data), key_a, icv)?;
    let encrypted = block::tdes_encrypt(&chained, key, Mode::Ecb)?;
    let mut mac = [0u8; BLOCK_SIZE];
    mac.copy_from_slice(&encrypted);
    Ok(mac)
}

/// Last block of single-DES CBC over already padded `data`
fn des_cbc_mac(padded: &[u8], key: &[u8], icv: &Block) -> Result<Block, CryptoInputError> {
    if key.len() != BLOCK_SIZE {
        return Err(CryptoInputError::new("key", CryptoInputKind::KeyLength(key.len())));
    }
    let Some((first, rest)) = padded.split_first_chunk::<BLOCK_SIZE>() else {
        return Err(CryptoInputError::new(
            "data",
            CryptoInputKind::DataLength(padded.len()),
        ));
    };

    let mut mac = <CbcMac<Des> as Mac>::new_from_slice(key)
        .map_err(|_| CryptoInputError::new("key", CryptoInputKind::KeyLength(key.len())))?;

    // the ICV enters the chain by whitening the first block
    let mut head = *first;
    head.iter_mut().zip(icv).for_each(|(byte, iv)| *byte ^= iv);
    mac.update(&head);
    mac.update(rest);

    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split_retail_key(key: &[u8]) -> Result<(&[u8], &[u8], &[u8]), CryptoInputError> {
    match key.len() {
        16 => Ok((&key[..8], &key[8..16], &key[..8])),
        24 => Ok((&key[..8], &key[8..16], &key[16..24])),
        n => Err(CryptoInputError::new("key", CryptoInputKind::KeyLength(n))),
    }
}

fn truncate(mac: Block) -> [u8; 4] {
    [mac[0], mac[1], mac[2], mac[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const ZERO: Block = [0; 8];
    const TEXT: [u8; 16] = hex!("0F591D96D2A1BB4499D8A17DAFE0C637");

    #[test]
    fn test_padding() {
        assert_eq!(pad(&[]), hex!("8000000000000000"));
        assert_eq!(pad(&hex!("01020304050607")), hex!("0102030405060780"));
        assert_eq!(
            pad(&hex!("0102030405060708")),
            hex!("01020304050607088000000000000000")
        );
        assert_eq!(pad(&hex!("0102")).len(), 8);
    }

    #[test]
    fn test_retail_mac_external_authenticate() {
        let mac = retail_mac(
            &hex!("8482010010810b098a8fbb88da"),
            &hex!("5b02e75ad63190aece0622936f11abab"),
            &ZERO,
        )
        .unwrap();
        assert_eq!(mac, hex!("5271D7174A5A166A"));
    }

    #[test]
    fn test_retail_mac_triple_length_key() {
        let key = hex!("0123456789ABCDEFFEDCBA987654321089ABCDEF01234567");
        assert_eq!(retail_mac(&TEXT, &key, &ZERO).unwrap(), hex!("8258443560E31F03"));
    }

    #[test]
    fn test_retail_mac32_with_icv() {
        let mac = retail_mac32(
            &hex!("514602B602261D20"),
            &hex!("514602B602261D21514602B602261D21"),
            &hex!("514602B602261D22"),
        )
        .unwrap();
        assert_eq!(mac, hex!("10D82B28"));
    }

    #[test]
    fn test_tdes_mac32() {
        let key = hex!("94832174819274987483217481927499");
        assert_eq!(retail_mac32(&TEXT, &key, &ZERO).unwrap(), hex!("6D6979E6"));
        assert_eq!(
            retail_mac32(&TEXT, &key, &hex!("6D6979E600000000")).unwrap(),
            hex!("505D95DA")
        );
    }

    #[test]
    fn test_single_des_mac() {
        let key = hex!("7483217481927498");
        assert_eq!(single_des_mac(&TEXT, &key, &ZERO).unwrap(), hex!("2BC78D189A3D21E0"));
        assert_eq!(single_des_mac32(&TEXT, &key, &ZERO).unwrap(), hex!("2BC78D18"));
        assert_eq!(single_des_mac32(&TEXT, &key, &key).unwrap(), hex!("423BC334"));
    }

    #[test]
    fn test_tdes_mac_final_ecb() {
        let key = hex!("94832174819274987483217481927499");
        assert_eq!(
            tdes_mac_final_ecb(&TEXT, &key, &ZERO).unwrap(),
            hex!("A248736B1C4FDD0F")
        );
    }

    #[test]
    fn test_mac_length() {
        let mac = hex!("0102030405060708");
        assert_eq!(MacLength::Full.apply(&mac), &mac);
        assert_eq!(MacLength::Truncated.apply(&mac), &hex!("01020304"));
    }

    #[test]
    fn test_retail_mac_rejects_single_length_key() {
        let err = retail_mac(&TEXT, &hex!("7483217481927498"), &ZERO).unwrap_err();
        assert_eq!(err.kind, CryptoInputKind::KeyLength(8));
        let err = single_des_mac(&TEXT, &hex!("94832174819274987483217481927499"), &ZERO)
            .unwrap_err();
        assert_eq!(err.kind, CryptoInputKind::KeyLength(16));
    }
}
