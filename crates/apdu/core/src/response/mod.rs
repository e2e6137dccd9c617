//! APDU response definitions
//!
//! A response always pairs a (possibly empty) data field with the two
//! trailing status bytes SW1 SW2.

pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{Error, Result};
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data, empty when the card returned only a status word
    data: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with data and status
    pub fn new(data: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            data: data.into(),
            status: status.into(),
        }
    }

    /// Create a success response
    pub fn success(data: impl Into<Bytes>) -> Self {
        Self::new(data, status::common::SUCCESS)
    }

    /// Create a data-less response carrying only a status word
    pub fn status_only(status: impl Into<StatusWord>) -> Self {
        Self::new(Bytes::new(), status)
    }

    /// Parse response from raw bytes (data followed by SW1 SW2)
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let Some(split) = raw.len().checked_sub(2) else {
            return Err(Error::ResponseTooShort(raw.len()));
        };
        let status = StatusWord::new(raw[split], raw[split + 1]);
        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            data_len = split,
            "Parsed APDU response"
        );
        Ok(Self {
            data: Bytes::copy_from_slice(&raw[..split]),
            status,
        })
    }

    /// Response data without the status word
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the response and keep its data
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// The status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Response data as upper-case hex
    pub fn data_hex(&self) -> String {
        hex::encode_upper(&self.data)
    }

    /// Serialize back to data followed by SW1 SW2
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 2);
        buf.put_slice(&self.data);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(raw: &[u8]) -> Result<Self> {
        Self::from_bytes(raw)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}
