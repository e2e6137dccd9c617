//! Cryptographic operations for the GlobalPlatform SCP02 protocol
//!
//! This module provides the DES/3DES block primitives, the ISO 9797-1 MAC
//! family, SCP02 session key derivation and cryptograms, and the legacy
//! PBOC helpers used by personalization scripts.

pub mod block;
pub mod hexstr;
pub mod mac;
pub mod pboc;
pub mod scp02;

pub use block::{BLOCK_SIZE, Block, Mode, des_decrypt, des_encrypt, tdes_decrypt, tdes_encrypt};
pub use mac::{
    MacLength, pad, retail_mac, retail_mac32, single_des_mac, single_des_mac32, tdes_mac_final_ecb,
};
pub use pboc::{diversify_level1, diversify_level2, length_prefixed_encrypt};
pub use scp02::{
    SessionKey, card_cryptogram, command_mac, derive_session_key, encrypt_icv, host_cryptogram,
};

/// Sequence counter from INITIALIZE UPDATE
pub type SequenceCounter = [u8; 2];
/// Card challenge from INITIALIZE UPDATE
pub type CardChallenge = [u8; 6];
/// Host challenge sent in INITIALIZE UPDATE
pub type HostChallenge = [u8; 8];
/// Card or host cryptogram
pub type Cryptogram = [u8; 8];
