//! INITIALIZE UPDATE command for GlobalPlatform
//!
//! This command is used to start a secure channel session.

use cardcheck_apdu_core::{ApduCommand, ExpectedLength, Response};

use crate::constants::{INITIALIZE_UPDATE_RESPONSE_LENGTH, cla, ins, scp};
use crate::crypto::{CardChallenge, Cryptogram, HostChallenge, SequenceCounter};
use crate::error::ProtocolFailure;
use crate::{Error, Result};

/// INITIALIZE UPDATE (`80 50 kvn 00 08 host-challenge`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeUpdateCommand {
    key_version: u8,
    host_challenge: HostChallenge,
}

impl InitializeUpdateCommand {
    /// Create the command for a key version and host challenge
    pub const fn new(key_version: u8, host_challenge: HostChallenge) -> Self {
        Self {
            key_version,
            host_challenge,
        }
    }

    /// Host challenge carried in the data field
    pub const fn host_challenge(&self) -> HostChallenge {
        self.host_challenge
    }
}

impl ApduCommand for InitializeUpdateCommand {
    type Success = InitializeUpdateResponse;
    type Error = Error;

    const NAME: &'static str = "INITIALIZE UPDATE";

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::INITIALIZE_UPDATE
    }

    fn p1(&self) -> u8 {
        self.key_version
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.host_challenge)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        None
    }

    fn parse_response(response: Response) -> Result<Self::Success> {
        super::check_status(Self::NAME, &response)?;
        InitializeUpdateResponse::parse(response.data())
            .map_err(|reason| Error::protocol(Self::NAME, response.status(), reason))
    }
}

/// Card's answer to INITIALIZE UPDATE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeUpdateResponse {
    /// Key diversification data
    pub key_diversification_data: [u8; 10],
    /// Key version number the card used
    pub key_version: u8,
    /// Secure channel protocol identifier
    pub scp_id: u8,
    /// Sequence counter
    pub sequence_counter: SequenceCounter,
    /// Card challenge
    pub card_challenge: CardChallenge,
    /// Card cryptogram
    pub card_cryptogram: Cryptogram,
}

impl InitializeUpdateResponse {
    /// Split the 28-byte response data into its fields
    ///
    /// Fails on short data and on any protocol other than SCP02.
    pub fn parse(data: &[u8]) -> std::result::Result<Self, ProtocolFailure> {
        let Some(data) = data.first_chunk::<INITIALIZE_UPDATE_RESPONSE_LENGTH>() else {
            return Err(ProtocolFailure::TooShort {
                expected: INITIALIZE_UPDATE_RESPONSE_LENGTH,
                actual: data.len(),
            });
        };

        let mut response = Self {
            key_diversification_data: [0; 10],
            key_version: data[10],
            scp_id: data[11],
            sequence_counter: [data[12], data[13]],
            card_challenge: [0; 6],
            card_cryptogram: [0; 8],
        };
        if response.scp_id != scp::SCP02 {
            return Err(ProtocolFailure::UnsupportedScp(response.scp_id));
        }

        response.key_diversification_data.copy_from_slice(&data[..10]);
        response.card_challenge.copy_from_slice(&data[14..20]);
        response.card_cryptogram.copy_from_slice(&data[20..28]);
        Ok(response)
    }
}
