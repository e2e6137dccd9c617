//! INSTALL command for GlobalPlatform
//!
//! This command is used to install applications and load files. Every
//! variant carries a sequence of length-prefixed fields.

use bytes::{BufMut, Bytes, BytesMut};
use cardcheck_apdu_core::{ApduCommand, ExpectedLength, Response};

use crate::constants::{cla, ins, install_p1, tags};
use crate::{Error, Result};

/// INSTALL (`80 E6 p1 00 Lc fields`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    p1: u8,
    data: Bytes,
}

impl InstallCommand {
    /// INSTALL [for load]
    ///
    /// An empty `security_domain_aid` lets the card pick its issuer domain.
    pub fn for_load(
        load_file_aid: &[u8],
        security_domain_aid: &[u8],
        data_block_hash: &[u8],
        load_parameters: &[u8],
        load_token: &[u8],
    ) -> Result<Self> {
        let mut data = BytesMut::new();
        super::put_lv(&mut data, "load file AID", load_file_aid)?;
        super::put_lv(&mut data, "security domain AID", security_domain_aid)?;
        super::put_lv(&mut data, "load file data block hash", data_block_hash)?;
        super::put_lv(&mut data, "load parameters", load_parameters)?;
        super::put_lv(&mut data, "load token", load_token)?;
        Ok(Self {
            p1: install_p1::FOR_LOAD,
            data: data.freeze(),
        })
    }

    /// INSTALL [for install], optionally also making the application selectable
    ///
    /// `install_parameters` are wrapped in the C9 application specific
    /// parameters tag.
    pub fn for_install(
        load_file_aid: &[u8],
        module_aid: &[u8],
        application_aid: &[u8],
        privileges: &[u8],
        install_parameters: &[u8],
        install_token: &[u8],
        make_selectable: bool,
    ) -> Result<Self> {
        let mut parameters = BytesMut::with_capacity(2 + install_parameters.len());
        parameters.put_u8(tags::INSTALL_PARAMETERS);
        super::put_lv(&mut parameters, "install parameters", install_parameters)?;

        let mut data = BytesMut::new();
        super::put_lv(&mut data, "load file AID", load_file_aid)?;
        super::put_lv(&mut data, "module AID", module_aid)?;
        super::put_lv(&mut data, "application AID", application_aid)?;
        super::put_lv(&mut data, "privileges", privileges)?;
        super::put_lv(&mut data, "install parameters", &parameters)?;
        super::put_lv(&mut data, "install token", install_token)?;

        Ok(Self {
            p1: if make_selectable {
                install_p1::FOR_INSTALL_AND_MAKE_SELECTABLE
            } else {
                install_p1::FOR_INSTALL
            },
            data: data.freeze(),
        })
    }
}

impl ApduCommand for InstallCommand {
    /// Response data, `00` on most cards
    type Success = Bytes;
    type Error = Error;

    const NAME: &'static str = "INSTALL";

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::INSTALL
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        0x00
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
