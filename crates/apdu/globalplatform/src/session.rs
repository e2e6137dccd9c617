//! Key material for the SCP02 secure channel
//!
//! [`StaticKeys`] are the long-lived card keys shared with the issuer,
//! [`SessionKeys`] the per-session keys derived from them, and
//! [`SessionContext`] everything a single authenticated session needs.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    Result,
    commands::InitializeUpdateResponse,
    error::{CryptoInputError, CryptoInputKind},
    constants::{DEFAULT_KEY, derivation},
    crypto::{
        CardChallenge, Cryptogram, HostChallenge, SequenceCounter, SessionKey, card_cryptogram,
        derive_session_key, host_cryptogram,
    },
};

/// Static card keys (ENC, MAC, DEK)
///
/// Each key is double-length (16 bytes) or triple-length (24 bytes) 3DES
/// material.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct StaticKeys {
    enc: Vec<u8>,
    mac: Vec<u8>,
    dek: Vec<u8>,
}

impl StaticKeys {
    /// Create a key set from its three keys
    pub fn new(enc: &[u8], mac: &[u8], dek: &[u8]) -> Result<Self> {
        Ok(Self {
            enc: static_key("enc", enc)?,
            mac: static_key("mac", mac)?,
            dek: static_key("dek", dek)?,
        })
    }

    /// Create a key set where all keys are the same
    pub fn from_single_key(key: &[u8]) -> Result<Self> {
        Self::new(key, key, key)
    }

    /// Static encryption key
    pub fn enc(&self) -> &[u8] {
        &self.enc
    }

    /// Static MAC key
    pub fn mac(&self) -> &[u8] {
        &self.mac
    }

    /// Static data encryption key
    pub fn dek(&self) -> &[u8] {
        &self.dek
    }
}

impl Default for StaticKeys {
    fn default() -> Self {
        Self {
            enc: DEFAULT_KEY.to_vec(),
            mac: DEFAULT_KEY.to_vec(),
            dek: DEFAULT_KEY.to_vec(),
        }
    }
}

fn static_key(field: &'static str, key: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 | 24 => Ok(key.to_vec()),
        n => Err(CryptoInputError::new(field, CryptoInputKind::KeyLength(n)).into()),
    }
}

impl fmt::Debug for StaticKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeys").finish_non_exhaustive()
    }
}

/// Session keys derived for one secure channel session
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    enc: SessionKey,
    cmac: SessionKey,
    rmac: SessionKey,
    dek: SessionKey,
}

impl SessionKeys {
    /// Derive all four session keys for `sequence_counter`
    ///
    /// S-ENC comes from the static ENC key, C-MAC and R-MAC from the static
    /// MAC key and the session DEK from the static DEK.
    pub fn derive(keys: &StaticKeys, sequence_counter: &SequenceCounter) -> Result<Self> {
        Ok(Self {
            enc: derive_session_key(keys.enc(), sequence_counter, &derivation::ENC)?,
            cmac: derive_session_key(keys.mac(), sequence_counter, &derivation::CMAC)?,
            rmac: derive_session_key(keys.mac(), sequence_counter, &derivation::RMAC)?,
            dek: derive_session_key(keys.dek(), sequence_counter, &derivation::DEK)?,
        })
    }

    /// S-ENC session key
    pub const fn enc(&self) -> &SessionKey {
        &self.enc
    }

    /// C-MAC session key
    pub const fn cmac(&self) -> &SessionKey {
        &self.cmac
    }

    /// R-MAC session key
    pub const fn rmac(&self) -> &SessionKey {
        &self.rmac
    }

    /// Session data encryption key
    pub const fn dek(&self) -> &SessionKey {
        &self.dek
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

/// State of one secure channel session after INITIALIZE UPDATE
#[derive(Debug, Clone)]
pub struct SessionContext {
    keys: SessionKeys,
    host_challenge: HostChallenge,
    card: InitializeUpdateResponse,
}

impl SessionContext {
    /// Derive the session keys for the card's answer to INITIALIZE UPDATE
    pub fn new(
        static_keys: &StaticKeys,
        host_challenge: HostChallenge,
        card: InitializeUpdateResponse,
    ) -> Result<Self> {
        let keys = SessionKeys::derive(static_keys, &card.sequence_counter)?;
        Ok(Self {
            keys,
            host_challenge,
            card,
        })
    }

    /// Session keys
    pub const fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Host challenge sent in INITIALIZE UPDATE
    pub const fn host_challenge(&self) -> &HostChallenge {
        &self.host_challenge
    }

    /// Parsed INITIALIZE UPDATE response
    pub const fn card(&self) -> &InitializeUpdateResponse {
        &self.card
    }

    /// Sequence counter
    pub const fn sequence_counter(&self) -> &SequenceCounter {
        &self.card.sequence_counter
    }

    /// Card challenge
    pub const fn card_challenge(&self) -> &CardChallenge {
        &self.card.card_challenge
    }

    /// Card cryptogram this session should have received
    pub fn expected_card_cryptogram(&self) -> Result<Cryptogram> {
        Ok(card_cryptogram(
            self.keys.enc(),
            self.sequence_counter(),
            self.card_challenge(),
            &self.host_challenge,
        )?)
    }

    /// Host cryptogram for EXTERNAL AUTHENTICATE
    pub fn host_cryptogram(&self) -> Result<Cryptogram> {
        Ok(host_cryptogram(
            self.keys.enc(),
            self.sequence_counter(),
            self.card_challenge(),
            &self.host_challenge,
        )?)
    }
}
