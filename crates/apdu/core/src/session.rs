//! Transport session: one reader connection plus the exchange contract
//!
//! [`TransportSession`] owns a [`CardTransport`] and turns single raw
//! exchanges into the contract scripted card operations rely on:
//! - commands are validated before they reach the reader
//! - 6Cxx answers are reissued with the corrected Le
//! - 61xx answers are drained with GET RESPONSE
//! - status word and response data are checked against an [`Expectation`]
//! - the last exchange is recorded for introspection

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, instrument, warn};

use crate::command::{ApduCommand, Command};
use crate::response::status::{StatusWord, common};
use crate::transport::{CardTransport, ResetKind};
use crate::{Error, Response, Result};

/// INS of GET RESPONSE
const GET_RESPONSE: u8 = 0xC0;

/// Behaviour switches for a [`TransportSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Issue GET RESPONSE when the card answers 61xx
    pub auto_get_response: bool,
    /// Reissue the command with Le = xx when the card answers 6Cxx
    pub auto_correct_le: bool,
    /// Raise expectation mismatches instead of only logging them
    pub stop_on_error: bool,
    /// Maximum number of chained GET RESPONSE exchanges for one command
    pub max_response_chain: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            auto_get_response: true,
            auto_correct_le: true,
            stop_on_error: true,
            max_response_chain: 10,
        }
    }
}

impl TransportConfig {
    /// Set whether 61xx triggers GET RESPONSE
    pub const fn with_auto_get_response(mut self, enabled: bool) -> Self {
        self.auto_get_response = enabled;
        self
    }

    /// Set whether 6Cxx triggers a reissue with the corrected Le
    pub const fn with_auto_correct_le(mut self, enabled: bool) -> Self {
        self.auto_correct_le = enabled;
        self
    }

    /// Set whether expectation mismatches are raised
    pub const fn with_stop_on_error(mut self, enabled: bool) -> Self {
        self.stop_on_error = enabled;
        self
    }

    /// Set the GET RESPONSE chain limit
    pub const fn with_max_response_chain(mut self, limit: usize) -> Self {
        self.max_response_chain = limit;
        self
    }
}

/// What the caller expects back from one exchange
///
/// Empty expectations accept anything. The name and info only label the
/// exchange in logs, errors and the [`Exchange`] record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectation {
    data: Option<Bytes>,
    sw: Option<StatusWord>,
    name: Cow<'static, str>,
    info: Cow<'static, str>,
}

impl Expectation {
    /// Accept any answer
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect 9000
    pub fn success() -> Self {
        Self::new().sw(common::SUCCESS)
    }

    /// Build from the hex arguments of the scripted interface, where an empty
    /// string means "don't check"
    pub fn from_hex(expect_data: &str, expect_sw: &str) -> Result<Self> {
        let mut expectation = Self::new();
        if !expect_data.is_empty() {
            expectation = expectation.data(decode_hex("expected data", expect_data)?);
        }
        if !expect_sw.is_empty() {
            let sw = expect_sw.parse().map_err(|_| Error::InvalidHex {
                field: "expected status word",
            })?;
            expectation = expectation.sw(sw);
        }
        Ok(expectation)
    }

    /// Require exactly this response data
    ///
    /// Compared only when the status word is the expected one, or 9000 when
    /// no status word is expected.
    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Require this status word
    pub const fn sw(mut self, sw: StatusWord) -> Self {
        self.sw = Some(sw);
        self
    }

    /// Label the exchange
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach free-form information to the exchange
    pub fn info(mut self, info: impl Into<Cow<'static, str>>) -> Self {
        self.info = info.into();
        self
    }

    /// Expected response data, if checked
    pub fn expected_data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Expected status word, if checked
    pub const fn expected_sw(&self) -> Option<StatusWord> {
        self.sw
    }

    /// Label of the exchange
    pub fn label(&self) -> &str {
        if self.name.is_empty() { "APDU" } else { &self.name }
    }

    /// Free-form information attached to the exchange
    pub fn information(&self) -> &str {
        &self.info
    }
}

/// Record of the most recent exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Command as sent, split into its fields
    pub command: Command,
    /// Command bytes as sent
    pub raw: Bytes,
    /// Final response after 6Cxx/61xx handling
    pub response: Response,
    /// What the caller expected
    pub expectation: Expectation,
    /// Duration of the primary exchange with the reader
    pub elapsed: Duration,
}

impl Exchange {
    /// P3 of the command: Lc when data is present, otherwise Le
    pub fn p3(&self) -> Option<u8> {
        self.raw.get(4).copied()
    }
}

/// A reader connection with the APDU exchange contract applied on top
#[derive(Debug)]
pub struct TransportSession<T: CardTransport> {
    transport: T,
    config: TransportConfig,
    last: Option<Exchange>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T: CardTransport> TransportSession<T> {
    /// Create a session with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, TransportConfig::default())
    }

    /// Create a session with a custom configuration
    pub const fn with_config(transport: T, config: TransportConfig) -> Self {
        Self {
            transport,
            config,
            last: None,
            cancel: None,
        }
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take ownership of the transport and return it
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Current configuration
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Mutable configuration
    pub const fn config_mut(&mut self) -> &mut TransportConfig {
        &mut self.config
    }

    /// The most recent exchange, overwritten by every send
    pub const fn last_exchange(&self) -> Option<&Exchange> {
        self.last.as_ref()
    }

    /// Execution time of the most recent exchange
    pub fn exec_time(&self) -> Option<Duration> {
        self.last.as_ref().map(|exchange| exchange.elapsed)
    }

    /// Handle that stops the session before its next exchange once set
    pub fn stop_handle(&mut self) -> Arc<AtomicBool> {
        Arc::clone(
            self.cancel
                .get_or_insert_with(|| Arc::new(AtomicBool::new(false))),
        )
    }

    /// Share an existing stop flag with this session
    pub fn set_stop_handle(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    /// Clear a previously requested stop
    pub fn resume(&self) {
        if let Some(flag) = &self.cancel {
            flag.store(false, Ordering::SeqCst);
        }
    }

    /// Whether a stop has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Fail with [`Error::Cancelled`] if a stop has been requested
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Reset the card and return its ATR
    pub fn reset(&mut self, kind: ResetKind) -> Result<Bytes> {
        let atr = self.transport.reset(kind)?;
        debug!(?kind, atr = %hex::encode_upper(&atr), "Card reset");
        Ok(atr)
    }

    /// Send a typed command and parse its response
    pub fn execute<C: ApduCommand>(
        &mut self,
        command: &C,
        expect: Expectation,
    ) -> std::result::Result<C::Success, C::Error> {
        let expect = if expect.name.is_empty() {
            expect.name(C::NAME)
        } else {
            expect
        };
        let response = self.send_command(&command.to_command(), &expect)?;
        C::parse_response(response)
    }

    /// Serialize and send a command
    pub fn send_command(&mut self, command: &Command, expect: &Expectation) -> Result<Response> {
        command.validate()?;
        self.send(&command.to_bytes(), expect)
    }

    /// Hex form of [`send`](Self::send): returns response data and status word as hex
    pub fn send_hex(
        &mut self,
        apdu: &str,
        expect_data: &str,
        expect_sw: &str,
    ) -> Result<(String, String)> {
        let raw = decode_hex("apdu", apdu)?;
        let expect = Expectation::from_hex(expect_data, expect_sw)?;
        let response = self.send(&raw, &expect)?;
        Ok((response.data_hex(), response.status().to_string()))
    }

    /// Send raw APDU bytes and check the answer against `expect`
    #[instrument(level = "trace", skip_all, fields(name = %expect.label()))]
    pub fn send(&mut self, apdu: &[u8], expect: &Expectation) -> Result<Response> {
        let command = Command::from_bytes(apdu)?;
        self.check_cancelled()?;

        let started = Instant::now();
        let mut response = self.exchange(apdu)?;
        let elapsed = started.elapsed();

        if self.config.auto_correct_le {
            if let Some(le) = response.status().corrected_le() {
                let reissued = command.clone().with_le(le).to_bytes();
                response = self.exchange(&reissued)?;
            }
        }
        if self.config.auto_get_response {
            response = self.collect_remaining(response)?;
        }

        let (header, body) = apdu.split_at(5);
        debug!(
            name = %expect.label(),
            info = %expect.information(),
            header = %hex::encode_upper(header),
            body = %hex::encode_upper(body),
            response = %response.data_hex(),
            sw = %response.status(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "APDU exchange"
        );

        self.last = Some(Exchange {
            command,
            raw: Bytes::copy_from_slice(apdu),
            response: response.clone(),
            expectation: expect.clone(),
            elapsed,
        });

        self.check(&response, expect)?;
        Ok(response)
    }

    fn exchange(&mut self, apdu: &[u8]) -> Result<Response> {
        let raw = self.transport.transmit_raw(apdu)?;
        Response::from_bytes(&raw)
    }

    /// Drain 61xx answers with GET RESPONSE, concatenating the data
    fn collect_remaining(&mut self, mut response: Response) -> Result<Response> {
        let mut data = BytesMut::from(response.data());
        let mut rounds = 0;
        while let Some(remaining) = response.status().remaining_bytes() {
            if rounds == self.config.max_response_chain {
                return Err(Error::ChainLimitExceeded(rounds));
            }
            rounds += 1;
            let get_response = Command::new_with_le(0x00, GET_RESPONSE, 0x00, 0x00, remaining);
            response = self.exchange(&get_response.to_bytes())?;
            data.extend_from_slice(response.data());
        }
        Ok(Response::new(data.freeze(), response.status()))
    }

    fn check(&self, response: &Response, expect: &Expectation) -> Result<()> {
        let expected_sw = expect.sw.unwrap_or(common::SUCCESS);
        if let Some(expected) = expect.sw {
            if !response.status().satisfies(expected) {
                self.escalate(Error::UnexpectedStatusWord {
                    name: expect.label().to_owned(),
                    expected,
                    actual: response.status(),
                })?;
            }
        }
        // data is only meaningful when the card accepted the command
        if let Some(expected) = &expect.data {
            if response.status().satisfies(expected_sw) && response.data() != expected.as_ref() {
                self.escalate(Error::UnexpectedResponseData {
                    name: expect.label().to_owned(),
                    expected: expected.to_vec(),
                    actual: response.data().to_vec(),
                })?;
            }
        }
        Ok(())
    }

    fn escalate(&self, error: Error) -> Result<()> {
        if self.config.stop_on_error {
            Err(error)
        } else {
            warn!(%error, "Expectation mismatch ignored");
            Ok(())
        }
    }
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|_| Error::InvalidHex { field })
}
