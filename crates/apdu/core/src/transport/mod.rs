//! Transport traits for APDU communication with cards
//!
//! A transport moves raw bytes to and from a reader. It has no knowledge of
//! command structure, secure channels, or protocol details such as GET RESPONSE;
//! those live in [`TransportSession`](crate::TransportSession).

pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
use tracing::{debug, trace};

/// How a card is reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResetKind {
    /// Power the card down and up again
    #[default]
    Cold,
    /// Reset the card without removing power
    Warm,
}

/// Trait for basic card transports
pub trait CardTransport: fmt::Debug {
    /// Send raw APDU bytes to card and return response bytes (data followed by SW1 SW2)
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode_upper(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;

    /// Reset the card and return its answer-to-reset
    fn reset(&mut self, kind: ResetKind) -> Result<Bytes, TransportError>;
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self, kind: ResetKind) -> Result<Bytes, TransportError> {
        (**self).reset(kind)
    }
}
