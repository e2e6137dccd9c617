//! APDU command definitions and traits
//!
//! This module provides types and traits for working with short APDU commands
//! according to ISO/IEC 7816-4: a 4-byte header, an optional Lc + data field
//! and an optional Le.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Response, Result};

/// Expected length type for APDU commands
pub type ExpectedLength = u8;

/// Largest data field a short APDU can carry
pub const MAX_SHORT_DATA: usize = 255;

/// Core trait for APDU commands
pub trait ApduCommand {
    /// Success response type
    type Success;

    /// Error response type
    type Error: fmt::Debug + From<Error>;

    /// Name of the command as it appears in exchange logs
    const NAME: &'static str;

    /// Command class (CLA)
    fn class(&self) -> u8;

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload data (optional)
    fn data(&self) -> Option<&[u8]>;

    /// Expected response length (optional)
    fn expected_length(&self) -> Option<ExpectedLength>;

    /// Convert to raw APDU bytes
    fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.class());
        buffer.put_u8(self.instruction());
        buffer.put_u8(self.p1());
        buffer.put_u8(self.p2());

        if let Some(data) = self.data() {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.expected_length() {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Calculate length of serialized command
    fn command_length(&self) -> usize {
        4 + self.data().map_or(0, |data| 1 + data.len())
            + usize::from(self.expected_length().is_some())
    }

    /// Convert to a generic Command
    fn to_command(&self) -> Command {
        Command {
            cla: self.class(),
            ins: self.instruction(),
            p1: self.p1(),
            p2: self.p2(),
            data: self.data().map(Bytes::copy_from_slice),
            le: self.expected_length(),
        }
    }

    /// Parse response into the command's response type
    fn parse_response(response: Response) -> std::result::Result<Self::Success, Self::Error>;
}

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: ExpectedLength) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }

    /// The four header bytes
    pub const fn header(&self) -> [u8; 4] {
        [self.cla, self.ins, self.p1, self.p2]
    }

    /// Whether CLA marks a proprietary (GlobalPlatform) command
    pub const fn is_proprietary(&self) -> bool {
        self.cla & 0x80 != 0
    }

    /// Data field length, zero when absent
    pub fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, Bytes::len)
    }

    /// Reject data fields a short APDU cannot encode
    pub fn validate(&self) -> Result<()> {
        match self.data_len() {
            len if len > MAX_SHORT_DATA => Err(Error::DataTooLong(len)),
            _ => Ok(()),
        }
    }

    /// Parse a command from raw bytes
    ///
    /// The fifth byte is Le when nothing follows it, otherwise Lc, and the
    /// remainder must then be exactly Lc data bytes optionally followed by Le.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let [cla, ins, p1, p2, p3, body @ ..] = raw else {
            return Err(Error::ApduTooShort(raw.len()));
        };

        let mut command = Self::new(*cla, *ins, *p1, *p2);
        if body.is_empty() {
            command.le = Some(*p3);
            return Ok(command);
        }

        let lc = usize::from(*p3);
        if body.len() != lc && body.len() != lc + 1 {
            return Err(Error::LcMismatch {
                lc: *p3,
                actual: body.len(),
            });
        }

        command.data = Some(Bytes::copy_from_slice(&body[..lc]));
        command.le = body.get(lc).copied();
        Ok(command)
    }
}

impl ApduCommand for Command {
    type Success = Response;
    type Error = Error;

    const NAME: &'static str = "APDU";

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        self.ins
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        self.le
    }

    fn parse_response(response: Response) -> Result<Self::Success> {
        Ok(response)
    }
}
