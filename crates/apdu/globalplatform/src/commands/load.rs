//! LOAD command for GlobalPlatform
//!
//! This command is used to transfer a load file to the card block by block.

use bytes::Bytes;
use cardcheck_apdu_core::{ApduCommand, ExpectedLength, Response};

use crate::constants::{cla, ins, load_p1};
use crate::{Error, Result};

/// LOAD (`80 E8 p1 block-number Lc block`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCommand {
    p1: u8,
    block_number: u8,
    data: Bytes,
}

impl LoadCommand {
    /// One LOAD block; the last block sets bit 8 of P1
    pub fn block(block_number: u8, data: impl Into<Bytes>, last: bool) -> Self {
        Self {
            p1: if last {
                load_p1::LAST_BLOCK
            } else {
                load_p1::MORE_BLOCKS
            },
            block_number,
            data: data.into(),
        }
    }

    /// Whether this is the final block
    pub const fn is_last(&self) -> bool {
        self.p1 & load_p1::LAST_BLOCK != 0
    }

    /// Block sequence number (P2)
    pub const fn block_number(&self) -> u8 {
        self.block_number
    }

    /// Block payload
    pub fn payload(&self) -> &[u8] {
        &self.data
    }
}

impl ApduCommand for LoadCommand {
    /// Response data, `00` after the last block on most cards
    type Success = Bytes;
    type Error = Error;

    const NAME: &'static str = "LOAD";

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::LOAD
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.block_number
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        None
    }

    fn parse_response(response: Response) -> Result<Self::Success> {
        super::check_status(Self::NAME, &response)?;
        Ok(response.into_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_load_blocks() {
        let first = LoadCommand::block(0, hex!("C48201000102").to_vec(), false);
        assert!(!first.is_last());
        assert_eq!(first.to_bytes().as_ref(), hex!("80E8000006C48201000102"));

        let last = LoadCommand::block(0x12, hex!("0304").to_vec(), true);
        assert!(last.is_last());
        assert_eq!(last.block_number(), 0x12);
        assert_eq!(last.to_bytes().as_ref(), hex!("80E88012020304"));
    }
}
