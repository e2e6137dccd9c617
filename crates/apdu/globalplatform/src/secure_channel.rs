//! SCP02 secure channel state machine
//!
//! The channel never touches the transport itself. The caller feeds it the
//! card's answers and sends the commands it produces:
//!
//! 1. [`SecureChannel::begin`] yields INITIALIZE UPDATE
//! 2. [`SecureChannel::process_initialize_update`] derives the session keys
//! 3. [`SecureChannel::external_authenticate`] checks the card cryptogram and
//!    yields the MAC-protected EXTERNAL AUTHENTICATE
//! 4. [`SecureChannel::finish_authentication`] records the card's verdict
//!
//! Once authenticated, [`SecureChannel::wrap`] adds the C-MAC to each
//! administrative command.

use bytes::{BufMut, BytesMut};
use cardcheck_apdu_core::{ApduCommand, Command};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Error, Result,
    commands::{ExternalAuthenticateCommand, InitializeUpdateCommand, InitializeUpdateResponse},
    constants::{MAC_LENGTH, cla, security_level},
    crypto::{Block, HostChallenge, command_mac, encrypt_icv},
    error::AuthenticationFailure,
    session::{SessionContext, StaticKeys},
};

/// Where the channel stands in the SCP02 handshake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelState {
    /// No session; INITIALIZE UPDATE has not succeeded yet
    #[default]
    Unauthenticated,
    /// Session keys derived, EXTERNAL AUTHENTICATE pending
    Initialized,
    /// Mutual authentication completed
    Authenticated,
    /// Authentication failed; the session must not be used
    Rejected,
}

/// Security level requested in EXTERNAL AUTHENTICATE
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// Commands after authentication travel without MAC
    #[serde(rename = "none")]
    NoSecureMessaging,
    /// Every command after authentication carries a C-MAC
    #[default]
    #[serde(rename = "mac")]
    CMac,
}

impl SecurityLevel {
    /// P1 value of EXTERNAL AUTHENTICATE
    pub const fn p1(self) -> u8 {
        match self {
            Self::NoSecureMessaging => security_level::NONE,
            Self::CMac => security_level::CMAC,
        }
    }
}

/// How the MAC ICV evolves between commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcvMode {
    /// Every C-MAC starts from an all-zero ICV
    #[default]
    Zero,
    /// The ICV is the previous C-MAC encrypted under the left C-MAC key half
    Chained,
}

/// Parameters of one secure channel session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Key version number sent as P1 of INITIALIZE UPDATE
    pub key_version: u8,
    /// Security level requested in EXTERNAL AUTHENTICATE
    pub security_level: SecurityLevel,
    /// ICV policy for command MACs
    pub icv_mode: IcvMode,
    /// Fixed host challenge; a random one is drawn when absent
    pub host_challenge: Option<HostChallenge>,
}

impl ChannelOptions {
    /// Set the key version number
    pub const fn with_key_version(mut self, key_version: u8) -> Self {
        self.key_version = key_version;
        self
    }

    /// Set the security level
    pub const fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    /// Set the ICV policy
    pub const fn with_icv_mode(mut self, mode: IcvMode) -> Self {
        self.icv_mode = mode;
        self
    }

    /// Use a fixed host challenge instead of a random one
    pub const fn with_host_challenge(mut self, challenge: HostChallenge) -> Self {
        self.host_challenge = Some(challenge);
        self
    }
}

/// SCP02 secure channel
#[derive(Debug)]
pub struct SecureChannel {
    keys: StaticKeys,
    options: ChannelOptions,
    state: ChannelState,
    host_challenge: Option<HostChallenge>,
    context: Option<SessionContext>,
    last_mac: Option<Block>,
}

impl SecureChannel {
    /// Create an unauthenticated channel
    pub const fn new(keys: StaticKeys, options: ChannelOptions) -> Self {
        Self {
            keys,
            options,
            state: ChannelState::Unauthenticated,
            host_challenge: None,
            context: None,
            last_mac: None,
        }
    }

    /// Current state
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether mutual authentication has completed
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, ChannelState::Authenticated)
    }

    /// Session options
    pub const fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Session context, present once INITIALIZE UPDATE succeeded
    pub const fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    /// Replace keys and options; drops any session
    pub fn configure(&mut self, keys: StaticKeys, options: ChannelOptions) {
        self.keys = keys;
        self.options = options;
        self.reset();
    }

    /// Drop the session and return to [`ChannelState::Unauthenticated`]
    ///
    /// Required after a card reset; session keys are zeroized on drop.
    pub fn reset(&mut self) {
        if self.state != ChannelState::Unauthenticated {
            debug!(from = ?self.state, "Secure channel reset");
        }
        self.state = ChannelState::Unauthenticated;
        self.host_challenge = None;
        self.context = None;
        self.last_mac = None;
    }

    /// Start a handshake and build INITIALIZE UPDATE
    ///
    /// Any earlier session, rejected or not, is discarded first.
    pub fn begin(&mut self) -> InitializeUpdateCommand {
        self.reset();
        let host_challenge = self.options.host_challenge.unwrap_or_else(|| {
            let mut challenge = HostChallenge::default();
            rand::rng().fill(&mut challenge);
            challenge
        });
        self.host_challenge = Some(host_challenge);
        InitializeUpdateCommand::new(self.options.key_version, host_challenge)
    }

    /// Derive the session keys from the card's INITIALIZE UPDATE answer
    pub fn process_initialize_update(&mut self, response: InitializeUpdateResponse) -> Result<()> {
        self.require(ChannelState::Unauthenticated)?;
        let Some(host_challenge) = self.host_challenge else {
            return Err(self.invalid_state(ChannelState::Unauthenticated));
        };

        self.context = Some(SessionContext::new(&self.keys, host_challenge, response)?);
        self.transition(ChannelState::Initialized);
        Ok(())
    }

    /// Verify the card cryptogram and build EXTERNAL AUTHENTICATE
    ///
    /// A cryptogram mismatch moves the channel to [`ChannelState::Rejected`].
    pub fn external_authenticate(&mut self) -> Result<Command> {
        self.require(ChannelState::Initialized)?;
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| self.invalid_state(ChannelState::Initialized))?;

        let expected = context.expected_card_cryptogram()?;
        let actual = context.card().card_cryptogram;
        if expected != actual {
            self.transition(ChannelState::Rejected);
            return Err(AuthenticationFailure::CardCryptogramMismatch { expected, actual }.into());
        }

        let host_cryptogram = context.host_cryptogram()?;
        let command =
            ExternalAuthenticateCommand::new(self.options.security_level, host_cryptogram)
                .to_command();
        // the first MAC of a session always starts from a zero ICV
        self.last_mac = None;
        self.mac_command(&command)
    }

    /// Record the outcome of EXTERNAL AUTHENTICATE
    pub fn finish_authentication(&mut self, outcome: Result<()>) -> Result<()> {
        self.require(ChannelState::Initialized)?;
        match outcome {
            Ok(()) => {
                self.transition(ChannelState::Authenticated);
                Ok(())
            }
            Err(error) => {
                self.transition(ChannelState::Rejected);
                Err(error)
            }
        }
    }

    /// Protect an administrative command according to the security level
    pub fn wrap(&mut self, command: &Command) -> Result<Command> {
        self.require(ChannelState::Authenticated)?;
        match self.options.security_level {
            SecurityLevel::NoSecureMessaging => Ok(command.clone()),
            SecurityLevel::CMac => self.mac_command(command),
        }
    }

    /// Append a C-MAC: CLA gains the secure messaging bit, Lc grows by 8
    fn mac_command(&mut self, command: &Command) -> Result<Command> {
        let Some(context) = self.context.as_ref() else {
            return Err(self.invalid_state(ChannelState::Authenticated));
        };
        let cmac_key = context.keys().cmac();

        let data = command.data.as_deref().unwrap_or_default();
        let lc = data.len() + MAC_LENGTH;
        let Ok(lc_byte) = u8::try_from(lc) else {
            return Err(cardcheck_apdu_core::Error::DataTooLong(lc).into());
        };
        let cla = command.cla | cla::SECURE_MESSAGING;

        let mut mac_input = BytesMut::with_capacity(5 + data.len());
        mac_input.put_slice(&[cla, command.ins, command.p1, command.p2, lc_byte]);
        mac_input.put_slice(data);

        let icv = match (self.options.icv_mode, self.last_mac) {
            (IcvMode::Chained, Some(previous)) => encrypt_icv(&previous, cmac_key)?,
            _ => Block::default(),
        };
        let mac = command_mac(&mac_input, cmac_key, &icv)?;
        self.last_mac = Some(mac);

        let mut wrapped = BytesMut::with_capacity(lc);
        wrapped.put_slice(data);
        wrapped.put_slice(&mac);

        let mut protected = Command::new(cla, command.ins, command.p1, command.p2)
            .with_data(wrapped.freeze());
        protected.le = command.le;
        Ok(protected)
    }

    fn require(&self, expected: ChannelState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(expected))
        }
    }

    const fn invalid_state(&self, expected: ChannelState) -> Error {
        Error::InvalidState {
            expected,
            actual: self.state,
        }
    }

    fn transition(&mut self, to: ChannelState) {
        debug!(from = ?self.state, ?to, "Secure channel transition");
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const CARD_ANSWER: [u8; 28] =
        hex!("000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce4");
    const HOST_CHALLENGE: HostChallenge = hex!("f0467f908e5ca23f");

    fn channel(options: ChannelOptions) -> SecureChannel {
        SecureChannel::new(
            StaticKeys::default(),
            options.with_host_challenge(HOST_CHALLENGE),
        )
    }

    fn initialized(options: ChannelOptions) -> SecureChannel {
        let mut channel = channel(options);
        let command = channel.begin();
        assert_eq!(
            command.to_bytes().as_ref(),
            hex!("8050000008f0467f908e5ca23f")
        );
        channel
            .process_initialize_update(InitializeUpdateResponse::parse(&CARD_ANSWER).unwrap())
            .unwrap();
        assert_eq!(channel.state(), ChannelState::Initialized);
        channel
    }

    fn authenticated(options: ChannelOptions) -> SecureChannel {
        let mut channel = initialized(options);
        channel.external_authenticate().unwrap();
        channel.finish_authentication(Ok(())).unwrap();
        channel
    }

    #[test]
    fn test_external_authenticate_with_cmac_level() {
        let mut channel = initialized(ChannelOptions::default());
        let command = channel.external_authenticate().unwrap();
        assert_eq!(
            command.to_bytes().as_ref(),
            hex!("84820100103CE060483AACE927A3CDA954B0E88839")
        );
        channel.finish_authentication(Ok(())).unwrap();
        assert!(channel.is_authenticated());
    }

    #[test]
    fn test_external_authenticate_without_secure_messaging() {
        let options =
            ChannelOptions::default().with_security_level(SecurityLevel::NoSecureMessaging);
        let mut channel = initialized(options);
        let command = channel.external_authenticate().unwrap();
        assert_eq!(
            command.to_bytes().as_ref(),
            hex!("84820000103CE060483AACE927BE1A4733452DEC7A")
        );
    }

    #[test]
    fn test_card_cryptogram_mismatch_rejects() {
        let mut answer = CARD_ANSWER;
        answer[27] ^= 0x01;
        let mut channel = channel(ChannelOptions::default());
        channel.begin();
        channel
            .process_initialize_update(InitializeUpdateResponse::parse(&answer).unwrap())
            .unwrap();

        let err = channel.external_authenticate().unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication(AuthenticationFailure::CardCryptogramMismatch { .. })
        ));
        assert!(err.is_security_failure());
        assert_eq!(channel.state(), ChannelState::Rejected);
        assert!(channel.wrap(&Command::new(0x80, 0xE4, 0x00, 0x00)).is_err());
    }

    #[test]
    fn test_refused_external_authenticate_rejects() {
        let mut channel = initialized(ChannelOptions::default());
        channel.external_authenticate().unwrap();
        let refused = Err(AuthenticationFailure::Rejected(0x6982u16.into()).into());
        assert!(channel.finish_authentication(refused).is_err());
        assert_eq!(channel.state(), ChannelState::Rejected);

        // a new handshake starts from scratch
        channel.begin();
        assert_eq!(channel.state(), ChannelState::Unauthenticated);
        assert!(channel.context().is_none());
    }

    fn delete_command() -> Command {
        Command::new_with_data(0x80, 0xE4, 0x00, 0x00, hex!("4F050102030405").to_vec())
    }

    #[test]
    fn test_wrap_with_zero_icv() {
        let mut channel = authenticated(ChannelOptions::default());
        let delete = delete_command();
        let wrapped = channel.wrap(&delete).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84E400000F4F05010203040592CEAA7B49448EAE")
        );
        // no chaining: the same command yields the same MAC
        assert_eq!(channel.wrap(&delete).unwrap(), wrapped);
    }

    #[test]
    fn test_wrap_with_chained_icv() {
        let mut channel = authenticated(ChannelOptions::default().with_icv_mode(IcvMode::Chained));
        let delete = delete_command();
        let wrapped = channel.wrap(&delete).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84E400000F4F0501020304059561A7EB03EE01DF")
        );
        assert_ne!(channel.wrap(&delete).unwrap(), wrapped);
    }

    #[test]
    fn test_wrap_keeps_le_and_skips_level_none() {
        let mut channel = authenticated(ChannelOptions::default());
        let command = Command::new_with_le(0x80, 0xF2, 0x80, 0x00, 0x00);
        let wrapped = channel.wrap(&command).unwrap();
        assert_eq!(wrapped.cla, 0x84);
        assert_eq!(wrapped.data_len(), 8);
        assert_eq!(wrapped.le, Some(0x00));

        let options =
            ChannelOptions::default().with_security_level(SecurityLevel::NoSecureMessaging);
        let mut channel = authenticated(options);
        assert_eq!(channel.wrap(&command).unwrap(), command);
    }

    #[test]
    fn test_wrap_rejects_oversized_data() {
        let mut channel = authenticated(ChannelOptions::default());
        let command = Command::new_with_data(0x80, 0xE8, 0x00, 0x00, vec![0u8; 248]);
        assert!(matches!(
            channel.wrap(&command),
            Err(Error::Apdu(cardcheck_apdu_core::Error::DataTooLong(256)))
        ));
    }

    #[test]
    fn test_operations_out_of_order() {
        let mut channel = channel(ChannelOptions::default());
        assert!(matches!(
            channel.external_authenticate(),
            Err(Error::InvalidState {
                expected: ChannelState::Initialized,
                actual: ChannelState::Unauthenticated
            })
        ));
        // no INITIALIZE UPDATE was built, so there is no host challenge
        let answer = InitializeUpdateResponse::parse(&CARD_ANSWER).unwrap();
        assert!(channel.process_initialize_update(answer).is_err());
    }

    #[test]
    fn test_random_host_challenge() {
        let mut channel = SecureChannel::new(StaticKeys::default(), ChannelOptions::default());
        let first = channel.begin().host_challenge();
        let second = channel.begin().host_challenge();
        assert_ne!(first, second);
    }
}
