//! Error types for GlobalPlatform operations

use cardcheck_apdu_core::StatusWord;
use thiserror::Error;

use crate::secure_channel::ChannelState;

/// Result type for GlobalPlatform operations
pub type Result<T> = std::result::Result<T, Error>;

/// What was wrong with a cryptographic input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoInputKind {
    /// Not valid hex
    #[error("malformed hex")]
    MalformedHex,
    /// Key length not accepted by the algorithm
    #[error("unsupported key length of {0} bytes")]
    KeyLength(usize),
    /// Data length not a positive multiple of the block size
    #[error("data length of {0} bytes is not a positive multiple of 8")]
    DataLength(usize),
    /// IV is not one block long
    #[error("IV length of {0} bytes, expected 8")]
    IvLength(usize),
    /// Input longer than the algorithm can frame
    #[error("input of {0} bytes is too long")]
    TooLong(usize),
}

/// Invalid key, IV or data handed to a cipher or MAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid {field}: {kind}")]
pub struct CryptoInputError {
    /// Offending argument
    pub field: &'static str,
    /// What was wrong with it
    pub kind: CryptoInputKind,
}

impl CryptoInputError {
    /// Create a new input error
    pub const fn new(field: &'static str, kind: CryptoInputKind) -> Self {
        Self { field, kind }
    }
}

/// Why a protocol step could not proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolFailure {
    /// Card answered with a non-success status word
    #[error("card returned a failure status word")]
    Status,
    /// Response data shorter than the step requires
    #[error("response too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Required length
        expected: usize,
        /// Received length
        actual: usize,
    },
    /// Card proposed a secure channel protocol other than SCP02
    #[error("unsupported secure channel protocol {0:#04x}")]
    UnsupportedScp(u8),
}

/// Why mutual authentication failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthenticationFailure {
    /// The card cryptogram does not match the one computed from the session keys
    #[error(
        "card cryptogram mismatch: card sent {}, expected {}",
        hex::encode_upper(actual),
        hex::encode_upper(expected)
    )]
    CardCryptogramMismatch {
        /// Cryptogram computed on the host
        expected: [u8; 8],
        /// Cryptogram returned by the card
        actual: [u8; 8],
    },
    /// EXTERNAL AUTHENTICATE was refused
    #[error("EXTERNAL AUTHENTICATE rejected with {0}")]
    Rejected(StatusWord),
}

/// Error type for GlobalPlatform operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cryptographic input
    #[error(transparent)]
    CryptoInput(#[from] CryptoInputError),

    /// Malformed or unsuccessful card response during a protocol step
    #[error("{step} failed ({status}): {reason}")]
    Protocol {
        /// Protocol step
        step: &'static str,
        /// Status word of the failing response
        status: StatusWord,
        /// Failure detail
        reason: ProtocolFailure,
    },

    /// Mutual authentication failed; the session must not be used
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthenticationFailure),

    /// Operation attempted in the wrong secure channel state
    #[error("secure channel is {actual:?}, expected {expected:?}")]
    InvalidState {
        /// State the operation needs
        expected: ChannelState,
        /// Current state
        actual: ChannelState,
    },

    /// Load file needs more blocks than P2 can number
    #[error("load file needs {blocks} LOAD blocks, at most 256 are addressable")]
    LoadFileTooLarge {
        /// Required block count
        blocks: usize,
    },

    /// LOAD block size outside 1..=255
    #[error("invalid LOAD block size {0}")]
    InvalidBlockSize(usize),

    /// Length does not fit a BER-TLV length field
    #[error("length {0} does not fit a BER-TLV length field")]
    LengthOverflow(usize),

    /// A length-prefixed field is longer than 255 bytes
    #[error("{field} of {length} bytes does not fit a one-byte length")]
    FieldTooLong {
        /// Offending field
        field: &'static str,
        /// Its length
        length: usize,
    },

    /// APDU exchange errors
    #[error(transparent)]
    Apdu(#[from] cardcheck_apdu_core::Error),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for Error {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}

impl Error {
    /// Shorthand for a failed protocol step
    pub const fn protocol(step: &'static str, status: StatusWord, reason: ProtocolFailure) -> Self {
        Self::Protocol {
            step,
            status,
            reason,
        }
    }

    /// Status word returned by the card, if this error carries one
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            Self::Authentication(AuthenticationFailure::Rejected(status)) => Some(*status),
            Self::Apdu(error) => error.status(),
            _ => None,
        }
    }

    /// Whether this error means the secure channel cannot be trusted
    pub const fn is_security_failure(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}
