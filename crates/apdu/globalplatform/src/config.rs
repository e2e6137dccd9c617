//! Harness configuration
//!
//! Loaded from a TOML file and `CARDCHECK_`-prefixed environment variables,
//! where `__` separates nesting levels (`CARDCHECK_SECURE_CHANNEL__KEY_VERSION=1`).
//! Every field has a default, so an empty or missing file is valid.

use std::path::Path;

use cardcheck_apdu_core::TransportConfig;
use cardcheck_apdu_pcsc::{ConnectStrategy, PcscConfig, ShareMode};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    constants::{CARD_MANAGER_AID, DEFAULT_KEY},
    error::{CryptoInputError, CryptoInputKind},
    load::BLOCK_SIZE,
    secure_channel::{ChannelOptions, IcvMode, SecurityLevel},
    session::StaticKeys,
};

/// Prefix of environment variables overriding the file
pub const ENV_PREFIX: &str = "CARDCHECK_";

/// Complete harness configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Reader selection
    pub reader: ReaderConfig,
    /// APDU exchange behaviour
    pub transport: TransportSection,
    /// Secure channel keys and options
    pub secure_channel: SecureChannelConfig,
    /// LOAD segmentation
    pub load: LoadConfig,
}

/// Reader selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Reader name; the first reader with a card is used when absent
    pub name: Option<String>,
    /// Power-cycle the card in `card()` instead of a warm reset
    pub cold_reset: bool,
    /// PC/SC share mode
    pub share_mode: ShareMode,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            name: None,
            cold_reset: true,
            share_mode: ShareMode::Shared,
        }
    }
}

/// APDU exchange behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Answer 61xx with GET RESPONSE
    pub auto_get_response: bool,
    /// Reissue with Le = xx on 6Cxx
    pub auto_correct_le: bool,
    /// Raise expectation mismatches instead of logging them
    pub stop_on_error: bool,
    /// GET RESPONSE chain limit
    pub max_response_chain: usize,
}

impl Default for TransportSection {
    fn default() -> Self {
        TransportConfig::default().into()
    }
}

impl From<TransportConfig> for TransportSection {
    fn from(config: TransportConfig) -> Self {
        Self {
            auto_get_response: config.auto_get_response,
            auto_correct_le: config.auto_correct_le,
            stop_on_error: config.stop_on_error,
            max_response_chain: config.max_response_chain,
        }
    }
}

/// Secure channel keys and options, keys and AIDs in hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecureChannelConfig {
    /// Key version number for INITIALIZE UPDATE
    pub key_version: u8,
    /// Static encryption key
    pub enc: String,
    /// Static MAC key
    pub mac: String,
    /// Static data encryption key
    pub dek: String,
    /// Security level requested in EXTERNAL AUTHENTICATE
    pub security_level: SecurityLevel,
    /// ICV policy for command MACs
    pub icv: IcvMode,
    /// AID selected by `card()` and used as security domain for uploads
    pub card_manager_aid: String,
}

impl Default for SecureChannelConfig {
    fn default() -> Self {
        let key = hex::encode_upper(DEFAULT_KEY);
        Self {
            key_version: 0,
            enc: key.clone(),
            mac: key.clone(),
            dek: key,
            security_level: SecurityLevel::default(),
            icv: IcvMode::default(),
            card_manager_aid: hex::encode_upper(CARD_MANAGER_AID),
        }
    }
}

/// LOAD segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Bytes of the load file data block per LOAD command
    pub block_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
        }
    }
}

impl HarnessConfig {
    /// Configuration sources: the TOML file (if any), then the environment
    pub fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::new();
        let figment = match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from the TOML file (if any) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(path))
    }

    /// Extract from an arbitrary figment
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    /// Exchange settings for the transport session
    pub const fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            auto_get_response: self.transport.auto_get_response,
            auto_correct_le: self.transport.auto_correct_le,
            stop_on_error: self.transport.stop_on_error,
            max_response_chain: self.transport.max_response_chain,
        }
    }

    /// PC/SC connection settings
    pub fn pcsc_config(&self) -> PcscConfig {
        PcscConfig::default().with_share_mode(self.reader.share_mode)
    }

    /// Reader selection strategy
    pub fn connect_strategy(&self) -> ConnectStrategy {
        ConnectStrategy::from_name(self.reader.name.as_deref())
    }
}

impl SecureChannelConfig {
    /// Decode the static key set
    pub fn static_keys(&self) -> Result<StaticKeys> {
        StaticKeys::new(
            &decode_hex("enc", &self.enc)?,
            &decode_hex("mac", &self.mac)?,
            &decode_hex("dek", &self.dek)?,
        )
    }

    /// Channel options without a fixed host challenge
    pub const fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            key_version: self.key_version,
            security_level: self.security_level,
            icv_mode: self.icv,
            host_challenge: None,
        }
    }

    /// Decode the card manager AID
    pub fn card_manager_aid(&self) -> Result<Vec<u8>> {
        decode_hex("card_manager_aid", &self.card_manager_aid)
    }
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value)
        .map_err(|_| CryptoInputError::new(field, CryptoInputKind::MalformedHex).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use figment::providers::Serialized;
    use hex_literal::hex;

    fn from_toml(toml: &str) -> Result<HarnessConfig> {
        HarnessConfig::from_figment(&Figment::new().merge(Toml::string(toml)))
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert!(config.reader.cold_reset);
        assert_eq!(config.load.block_size, 247);
        assert_eq!(config.transport_config(), TransportConfig::default());
        assert_eq!(config.connect_strategy(), ConnectStrategy::AnyCard);

        let keys = config.secure_channel.static_keys().unwrap();
        assert_eq!(keys, StaticKeys::default());
        assert_eq!(
            config.secure_channel.card_manager_aid().unwrap(),
            CARD_MANAGER_AID
        );
        assert_eq!(config.secure_channel.channel_options(), ChannelOptions::default());
    }

    #[test]
    fn test_toml_sections() {
        let config = from_toml(
            r#"
            [reader]
            name = "Identiv uTrust 4700 F Contact Reader 0"
            cold_reset = false

            [transport]
            stop_on_error = false
            max_response_chain = 4

            [secure_channel]
            key_version = 32
            enc = "00112233445566778899AABBCCDDEEFF"
            security_level = "none"
            icv = "chained"

            [load]
            block_size = 200
            "#,
        )
        .unwrap();

        assert_eq!(
            config.connect_strategy(),
            ConnectStrategy::Reader("Identiv uTrust 4700 F Contact Reader 0".into())
        );
        assert!(!config.reader.cold_reset);

        let transport = config.transport_config();
        assert!(!transport.stop_on_error);
        assert!(transport.auto_get_response);
        assert_eq!(transport.max_response_chain, 4);

        let options = config.secure_channel.channel_options();
        assert_eq!(options.key_version, 0x20);
        assert_eq!(options.security_level, SecurityLevel::NoSecureMessaging);
        assert_eq!(options.icv_mode, IcvMode::Chained);

        let keys = config.secure_channel.static_keys().unwrap();
        assert_eq!(keys.enc(), &hex!("00112233445566778899AABBCCDDEEFF"));
        assert_eq!(keys.mac(), &DEFAULT_KEY);
        assert_eq!(config.load.block_size, 200);
    }

    #[test]
    fn test_triple_length_keys() {
        let config = from_toml(
            r#"
            [secure_channel]
            enc = "404142434445464748494A4B4C4D4E4F5051525354555657"
            mac = "404142434445464748494A4B4C4D4E4F5051525354555657"
            dek = "404142434445464748494A4B4C4D4E4F5051525354555657"
            "#,
        )
        .unwrap();
        let keys = config.secure_channel.static_keys().unwrap();
        assert_eq!(keys.enc().len(), 24);
        assert_eq!(keys.dek(), &hex!("404142434445464748494A4B4C4D4E4F5051525354555657"));
    }

    #[test]
    fn test_later_sources_override() {
        let figment = Figment::new()
            .merge(Toml::string("[secure_channel]\nkey_version = 1"))
            .merge(Serialized::default("secure_channel.key_version", 2));
        let config = HarnessConfig::from_figment(&figment).unwrap();
        assert_eq!(config.secure_channel.key_version, 2);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            from_toml("[secure_channel]\nsecurity_level = \"enc\""),
            Err(Error::Config(_))
        ));

        let config = from_toml("[secure_channel]\nmac = \"4041\"").unwrap();
        assert!(matches!(
            config.secure_channel.static_keys(),
            Err(Error::CryptoInput(CryptoInputError {
                field: "mac",
                kind: CryptoInputKind::KeyLength(2)
            }))
        ));

        let config = from_toml("[secure_channel]\ndek = \"zz\"").unwrap();
        assert!(matches!(
            config.secure_channel.static_keys(),
            Err(Error::CryptoInput(CryptoInputError {
                field: "dek",
                kind: CryptoInputKind::MalformedHex
            }))
        ));
    }
}
