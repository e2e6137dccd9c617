//! EXTERNAL AUTHENTICATE command for GlobalPlatform
//!
//! This command is used to authenticate the host to the card. It always
//! travels with a C-MAC, added by the secure channel.

use cardcheck_apdu_core::{ApduCommand, ExpectedLength, Response};

use crate::constants::{cla, ins};
use crate::crypto::Cryptogram;
use crate::error::AuthenticationFailure;
use crate::secure_channel::SecurityLevel;
use crate::{Error, Result};

/// EXTERNAL AUTHENTICATE before MAC protection (`80 82 level 00 08 host-cryptogram`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalAuthenticateCommand {
    security_level: SecurityLevel,
    host_cryptogram: Cryptogram,
}

impl ExternalAuthenticateCommand {
    /// Create the command from the host cryptogram
    pub const fn new(security_level: SecurityLevel, host_cryptogram: Cryptogram) -> Self {
        Self {
            security_level,
            host_cryptogram,
        }
    }
}

impl ApduCommand for ExternalAuthenticateCommand {
    type Success = ();
    type Error = Error;

    const NAME: &'static str = "EXTERNAL AUTHENTICATE";

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::EXTERNAL_AUTHENTICATE
    }

    fn p1(&self) -> u8 {
        self.security_level.p1()
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.host_cryptogram)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        None
    }

    /// Any status other than success is an authentication failure
    fn parse_response(response: Response) -> Result<Self::Success> {
        if response.is_success() {
            Ok(())
        } else {
            Err(AuthenticationFailure::Rejected(response.status()).into())
        }
    }
}
