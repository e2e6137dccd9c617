//! GlobalPlatform command definitions
//!
//! Each command implements [`ApduCommand`](cardcheck_apdu_core::ApduCommand)
//! and turns a non-success status word into [`Error::Protocol`].

use bytes::{BufMut, BytesMut};
use cardcheck_apdu_core::{Response, response::status::common};

use crate::{Error, Result, error::ProtocolFailure};

pub mod delete;
pub mod external_authenticate;
pub mod initialize_update;
pub mod install;
pub mod load;
pub mod select;

pub use delete::DeleteCommand;
pub use external_authenticate::ExternalAuthenticateCommand;
pub use initialize_update::{InitializeUpdateCommand, InitializeUpdateResponse};
pub use install::InstallCommand;
pub use load::LoadCommand;
pub use select::SelectCommand;

/// Fail `step` unless the card answered 9000 (or 61xx)
pub(crate) fn check_status(step: &'static str, response: &Response) -> Result<()> {
    if response.status().satisfies(common::SUCCESS) {
        Ok(())
    } else {
        Err(Error::protocol(step, response.status(), ProtocolFailure::Status))
    }
}

/// Append `len(value) ‖ value`, refusing values a one-byte length cannot describe
pub(crate) fn put_lv(buf: &mut BytesMut, field: &'static str, value: &[u8]) -> Result<()> {
    let length = u8::try_from(value.len()).map_err(|_| Error::FieldTooLong {
        field,
        length: value.len(),
    })?;
    buf.put_u8(length);
    buf.put_slice(value);
    Ok(())
}
