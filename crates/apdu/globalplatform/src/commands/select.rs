//! SELECT command for GlobalPlatform
//!
//! This command is used to select an application or the card manager by AID.

use bytes::Bytes;
use cardcheck_apdu_core::{ApduCommand, ExpectedLength, Response};

use crate::constants::{CARD_MANAGER_AID, cla, ins, select_p1};
use crate::{Error, Result};

/// SELECT by name (`00 A4 04 00 Lc AID`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectCommand {
    aid: Bytes,
}

impl SelectCommand {
    /// Select the application with the given AID
    pub fn by_name(aid: impl AsRef<[u8]>) -> Self {
        Self {
            aid: Bytes::copy_from_slice(aid.as_ref()),
        }
    }

    /// Select the GlobalPlatform card manager
    pub fn card_manager() -> Self {
        Self::by_name(CARD_MANAGER_AID)
    }

    /// AID being selected
    pub fn aid(&self) -> &[u8] {
        &self.aid
    }
}

impl ApduCommand for SelectCommand {
    /// File control information returned by the card
    type Success = Bytes;
    type Error = Error;

    const NAME: &'static str = "SELECT";

    fn class(&self) -> u8 {
        cla::ISO7816
    }

    fn instruction(&self) -> u8 {
        ins::SELECT
    }

    fn p1(&self) -> u8 {
        select_p1::BY_NAME
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.aid)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        None
    }

    fn parse_response(response: Response) -> Result<Self::Success> {
        super::check_status(Self::NAME, &response)?;
        Ok(response.into_data())
    }
}
