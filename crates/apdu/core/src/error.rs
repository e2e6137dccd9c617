//! Error type for APDU exchanges
//!
//! Every failure that can surface from building a command, talking to a reader
//! or checking a card's answer against an expectation is represented here.

use crate::StatusWord;
use crate::transport::TransportError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while encoding, sending or checking APDUs
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Raw APDU too short to carry CLA, INS, P1, P2 and P3
    #[error("APDU of {0} bytes is shorter than the 5-byte header")]
    ApduTooShort(usize),

    /// Body after the header is neither Lc nor Lc + 1 (Le) bytes long
    #[error("APDU body of {actual} bytes does not match Lc {lc:#04x}")]
    LcMismatch {
        /// P3 as found in the header
        lc: u8,
        /// Bytes following the header
        actual: usize,
    },

    /// Command data does not fit a short APDU
    #[error("command data of {0} bytes exceeds the 255-byte short APDU limit")]
    DataTooLong(usize),

    /// Response shorter than the two status bytes
    #[error("response of {0} bytes carries no status word")]
    ResponseTooShort(usize),

    /// A hex argument could not be decoded
    #[error("{field} is not valid hex")]
    InvalidHex {
        /// Argument that failed to decode
        field: &'static str,
    },

    /// Card answered with a status word other than the expected one
    #[error("unexpected status word {actual} for {name} (expected {expected})")]
    UnexpectedStatusWord {
        /// Name of the exchange
        name: String,
        /// Status word the caller asked for
        expected: StatusWord,
        /// Status word the card returned
        actual: StatusWord,
    },

    /// Card answered with response data other than the expected bytes
    #[error(
        "unexpected response data for {name}: got [{}], expected [{}]",
        hex::encode_upper(actual),
        hex::encode_upper(expected)
    )]
    UnexpectedResponseData {
        /// Name of the exchange
        name: String,
        /// Data the caller asked for
        expected: Vec<u8>,
        /// Data the card returned
        actual: Vec<u8>,
    },

    /// The card kept answering 61xx beyond the configured limit
    #[error("GET RESPONSE chain exceeded {0} exchanges")]
    ChainLimitExceeded(usize),

    /// A stop was requested before the next exchange
    #[error("operation cancelled before transmission")]
    Cancelled,

    /// Failure reported by the reader backend
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Status word carried by the error, if it came from the card
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::UnexpectedStatusWord { actual, .. } => Some(*actual),
            _ => None,
        }
    }

    /// Whether this error reflects a card answer rather than a local or reader problem
    pub const fn is_card_answer(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatusWord { .. } | Self::UnexpectedResponseData { .. }
        )
    }
}
