//! PC/SC transport implementation

use std::{ffi::CString, fmt};

use bytes::Bytes;
use cardcheck_apdu_core::{CardTransport, ResetKind, TransportError};
use pcsc::{Attribute, Card, Context, Disposition};
use tracing::debug;

use crate::{config::PcscConfig, error::PcscError};

/// Transport implementation using PC/SC
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PcscTransport {
    /// Create a new PC/SC transport for the specified reader
    pub(crate) fn new(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let mut transport = Self {
            context,
            card: None,
            reader_name: reader_name.to_owned(),
            config,
        };

        // An empty reader is not an error until the first exchange
        if let Err(e) = transport.connect_card() {
            debug!(error = %e, reader = %transport.reader_name, "Card not connected yet");
        }

        Ok(transport)
    }

    /// Try to connect to the card
    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader = CString::new(self.reader_name.as_str())
            .map_err(|_| PcscError::ReaderNotFound(self.reader_name.clone()))?;

        match self
            .context
            .connect(&reader, self.config.share_mode.into(), self.config.protocols)
        {
            Ok(card) => {
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard) => Err(PcscError::NoCard(self.reader_name.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the ATR of the current card
    pub fn atr(&self) -> Result<Vec<u8>, PcscError> {
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))?;
        Ok(card.get_attribute_owned(Attribute::AtrString)?)
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Check if the transport is connected to a card
    pub const fn has_card(&self) -> bool {
        self.card.is_some()
    }

    /// Transmit a command to the card
    fn transmit_command(&mut self, command: &[u8], retry: bool) -> Result<Bytes, PcscError> {
        self.connect_card()?;

        let card = self
            .card
            .as_mut()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))?;

        let mut response_buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        match card.transmit(command, &mut response_buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(e @ (pcsc::Error::ResetCard | pcsc::Error::RemovedCard)) => {
                // the handle is stale either way
                self.card = None;
                if retry && self.config.auto_reconnect && e == pcsc::Error::ResetCard {
                    debug!(reader = %self.reader_name, "Card was reset, reconnecting");
                    return self.transmit_command(command, false);
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Power-cycle or warm-reset the card and read the new ATR
    fn reset_card(&mut self, kind: ResetKind) -> Result<Bytes, PcscError> {
        let disposition = match kind {
            ResetKind::Cold => Disposition::UnpowerCard,
            ResetKind::Warm => Disposition::ResetCard,
        };

        match self.card.as_mut() {
            Some(card) => {
                card.reconnect(self.config.share_mode.into(), self.config.protocols, disposition)?;
            }
            None => self.connect_card()?,
        }

        self.atr().map(Bytes::from)
    }
}

impl CardTransport for PcscTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.transmit_command(command, true).map_err(TransportError::from)
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn reset(&mut self, kind: ResetKind) -> Result<Bytes, TransportError> {
        self.reset_card(kind).map_err(TransportError::from)
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                debug!(error = %e, "Failed to disconnect card");
            }
        }
    }
}
