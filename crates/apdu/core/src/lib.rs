//! Core traits and types for APDU (Application Protocol Data Unit) exchanges
//!
//! This crate provides the foundational types for talking to smart cards
//! according to ISO/IEC 7816-4:
//!
//! - Creating and parsing APDU commands and responses
//! - Status word interpretation
//! - The [`CardTransport`] abstraction over reader backends
//! - [`TransportSession`], which applies GET RESPONSE chaining, Le correction
//!   and expectation checks on top of a transport and records the last exchange
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod session;
pub mod transport;

mod error;
pub use error::{Error, Result};

pub use command::{ApduCommand, Command, ExpectedLength};
pub use response::Response;
pub use response::status::StatusWord;
pub use session::{Exchange, Expectation, TransportConfig, TransportSession};
#[cfg(any(test, feature = "mock"))]
pub use transport::MockTransport;
pub use transport::{CardTransport, ResetKind, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        ApduCommand, Bytes, BytesMut, CardTransport, Command, Error, Expectation, ResetKind,
        Response, Result, StatusWord, TransportError, TransportSession,
    };
}
