//! Scripted in-memory transport

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;

use super::{CardTransport, ResetKind, TransportError};

type Handler = Box<dyn FnMut(&[u8]) -> Bytes + Send>;

/// Transport that replays queued responses or answers through a closure
///
/// Every command is recorded so tests can assert on the exact bytes sent.
pub struct MockTransport {
    /// Queued raw responses (data followed by SW1 SW2), consumed in order
    pub responses: VecDeque<Bytes>,
    /// Commands that were sent
    pub commands: Vec<Bytes>,
    /// Resets performed, in order
    pub resets: Vec<ResetKind>,
    /// Answer-to-reset returned by [`CardTransport::reset`]
    pub atr: Bytes,
    /// Whether the transport is connected
    pub connected: bool,
    handler: Option<Handler>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("responses", &self.responses.len())
            .field("commands", &self.commands.len())
            .field("resets", &self.resets)
            .field("connected", &self.connected)
            .field("scripted", &self.handler.is_some())
            .finish()
    }
}

impl MockTransport {
    /// Create a new mock transport with the given responses
    pub fn new<I, B>(responses: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            commands: Vec::new(),
            resets: Vec::new(),
            atr: Bytes::from_static(&[0x3B, 0x00]),
            connected: true,
            handler: None,
        }
    }

    /// Create a mock transport that answers every command through `handler`
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: FnMut(&[u8]) -> Bytes + Send + 'static,
    {
        let mut transport = Self::new(Vec::<Bytes>::new());
        transport.handler = Some(Box::new(handler));
        transport
    }

    /// Queue one more response
    pub fn push_response(&mut self, response: impl Into<Bytes>) {
        self.responses.push_back(response.into());
    }
}

impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::Connection);
        }

        self.commands.push(Bytes::copy_from_slice(command));

        if let Some(response) = self.responses.pop_front() {
            return Ok(response);
        }
        match self.handler.as_mut() {
            Some(handler) => Ok(handler(command)),
            None => Err(TransportError::Transmission),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self, kind: ResetKind) -> Result<Bytes, TransportError> {
        self.connected = true;
        self.resets.push(kind);
        Ok(self.atr.clone())
    }
}
