//! DELETE command for GlobalPlatform
//!
//! This command is used to delete applications, packages, and other objects.

use bytes::{BufMut, Bytes, BytesMut};
use cardcheck_apdu_core::{ApduCommand, ExpectedLength, Response};

use crate::constants::{cla, delete_p2, ins, tags};
use crate::{Error, Result};

/// DELETE (`80 E4 00 p2 Lc 4F len AID`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCommand {
    p2: u8,
    data: Bytes,
}

impl DeleteCommand {
    /// Delete the object with `aid`, and its related objects when `related` is set
    pub fn with_aid(aid: impl AsRef<[u8]>, related: bool) -> Result<Self> {
        let aid = aid.as_ref();
        let mut data = BytesMut::with_capacity(2 + aid.len());
        data.put_u8(tags::AID);
        super::put_lv(&mut data, "AID", aid)?;

        Ok(Self {
            p2: if related {
                delete_p2::OBJECT_AND_RELATED
            } else {
                delete_p2::OBJECT
            },
            data: data.freeze(),
        })
    }

    /// Delete a single object
    pub fn delete_object(aid: impl AsRef<[u8]>) -> Result<Self> {
        Self::with_aid(aid, false)
    }

    /// Delete an object and its related objects
    pub fn delete_object_and_related(aid: impl AsRef<[u8]>) -> Result<Self> {
        Self::with_aid(aid, true)
    }
}

impl ApduCommand for DeleteCommand {
    type Success = ();
    type Error = Error;

    const NAME: &'static str = "DELETE";

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::DELETE
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        None
    }

    fn parse_response(response: Response) -> Result<Self::Success> {
        super::check_status(Self::NAME, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_delete_command() {
        let aid = hex!("0102030405");
        let cmd = DeleteCommand::delete_object(aid).unwrap();

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::DELETE);
        assert_eq!(cmd.p1(), 0x00);
        assert_eq!(cmd.p2(), delete_p2::OBJECT);
        assert_eq!(cmd.data(), Some(hex!("4F050102030405").as_ref()));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E40000074F050102030405"));
    }

    #[test]
    fn test_delete_object_and_related() {
        let cmd = DeleteCommand::delete_object_and_related(hex!("A0000000030000")).unwrap();
        assert_eq!(cmd.p2(), delete_p2::OBJECT_AND_RELATED);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E40080094F07A0000000030000"));
    }

    #[test]
    fn test_delete_response() {
        assert!(DeleteCommand::parse_response(Response::status_only(0x9000u16)).is_ok());
        let err = DeleteCommand::parse_response(Response::status_only(0x6A88u16)).unwrap_err();
        assert_eq!(err.status().map(|sw| sw.to_u16()), Some(0x6A88));
    }

    #[test]
    fn test_delete_rejects_oversized_aid() {
        assert!(matches!(
            DeleteCommand::delete_object([0u8; 300]),
            Err(Error::FieldTooLong { field: "AID", length: 300 })
        ));
    }
}
