//! ADAC command framing on top of the mailbox.
//!
//! A request is an 8-byte header followed by the command payload, zero-padded to a
//! whole number of words:
//!
//! ```text
//! <u16 reserved = 0> <u16 command> <u32 data_count> <data...> <padding>
//! ```
//!
//! A response has the same shape, with the status code in place of the command:
//!
//! ```text
//! <u16 reserved> <u16 status> <u32 data_count> <data words...>
//! ```
//!
//! All fields are little-endian.

pub mod commands;
pub mod registry;

use std::fmt;

use scroll::{Pread, LE};

use crate::{
    clock::{Clock, StdClock},
    mailbox::{Mailbox, MailboxRegisters, PollConfig},
    probe::DebugProbeLink,
    CommandError, DecodeError, Error, WORD_SIZE,
};

use self::commands::{AdacCommand, Command, CommandOutput};

/// Opcodes of the ADAC vendor commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Version = 0xA300,
    MemCfg = 0xA301,
    Revert = 0xA302,
    Reset = 0xA303,
    MemErase = 0xA304,
    LcsGet = 0xA305,
    LcsSet = 0xA306,
    Ssf = 0xA307,
    Purge = 0xA308,
}

impl Opcode {
    /// Every opcode, in numeric order.
    pub const ALL: [Opcode; 9] = [
        Opcode::Version,
        Opcode::MemCfg,
        Opcode::Revert,
        Opcode::Reset,
        Opcode::MemErase,
        Opcode::LcsGet,
        Opcode::LcsSet,
        Opcode::Ssf,
        Opcode::Purge,
    ];
}

impl From<Opcode> for u16 {
    fn from(opcode: Opcode) -> Self {
        opcode as u16
    }
}

impl TryFrom<u16> for Opcode {
    type Error = DecodeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Opcode::ALL
            .into_iter()
            .find(|opcode| *opcode as u16 == value)
            .ok_or(DecodeError::UnknownOpcode(value))
    }
}

/// Status code of an ADAC response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AdacStatus {
    Success = 0,
    Failure = 1,
    NeedMoreData = 2,
    Unsupported = 3,
    InvalidCommand = 0x7FFF,
}

impl AdacStatus {
    /// The status name as the firmware documents it.
    pub fn name(self) -> &'static str {
        match self {
            AdacStatus::Success => "SUCCESS",
            AdacStatus::Failure => "FAILURE",
            AdacStatus::NeedMoreData => "NEED_MORE_DATA",
            AdacStatus::Unsupported => "UNSUPPORTED",
            AdacStatus::InvalidCommand => "INVALID_COMMAND",
        }
    }
}

impl fmt::Display for AdacStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u16> for AdacStatus {
    type Error = DecodeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => AdacStatus::Success,
            1 => AdacStatus::Failure,
            2 => AdacStatus::NeedMoreData,
            3 => AdacStatus::Unsupported,
            0x7FFF => AdacStatus::InvalidCommand,
            other => return Err(DecodeError::UnknownAdacStatus(other)),
        })
    }
}

/// A command ready to be framed.
///
/// The data count on the wire is always derived from `data`, so it can never
/// disagree with the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdacRequest {
    command: Opcode,
    data: Vec<u8>,
}

impl AdacRequest {
    /// Size of the request header in bytes.
    pub const HEADER_LEN: usize = 8;

    /// Create a request for `command` carrying `data`.
    ///
    /// Fails if `data` is too long for the 32-bit data count.
    pub fn new(command: Opcode, data: Vec<u8>) -> Result<Self, CommandError> {
        check_data_len(data.len())?;
        Ok(Self { command, data })
    }

    /// The command opcode.
    pub fn command(&self) -> Opcode {
        self.command
    }

    /// The command payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of payload bytes, as sent in the header.
    pub fn data_count(&self) -> u32 {
        // `new` rejects longer payloads.
        self.data.len() as u32
    }

    /// Serialize the header and payload, padded with zeros to a multiple of 4 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = (Self::HEADER_LEN + self.data.len()).div_ceil(WORD_SIZE) * WORD_SIZE;
        let mut bytes = Vec::with_capacity(len);

        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&u16::from(self.command).to_le_bytes());
        bytes.extend_from_slice(&self.data_count().to_le_bytes());
        bytes.extend_from_slice(&self.data);
        bytes.resize(len, 0);

        bytes
    }

    /// The serialized request split into mailbox words.
    pub fn to_words(&self) -> Vec<[u8; WORD_SIZE]> {
        self.to_bytes()
            .chunks_exact(WORD_SIZE)
            .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
            .collect()
    }

    /// Parse a request from its serialized form.
    ///
    /// Padding after the payload is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < Self::HEADER_LEN {
            return Err(DecodeError::NotEnoughData {
                expected: Self::HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let offset = &mut 0;
        let _reserved: u16 = bytes.gread_with(offset, LE).map_err(|_| short(bytes, 2))?;
        let command: u16 = bytes.gread_with(offset, LE).map_err(|_| short(bytes, 4))?;
        let data_count: u32 = bytes.gread_with(offset, LE).map_err(|_| short(bytes, 8))?;

        let end = Self::HEADER_LEN + data_count as usize;
        let data = bytes
            .get(Self::HEADER_LEN..end)
            .ok_or(DecodeError::NotEnoughData {
                expected: end,
                actual: bytes.len(),
            })?;

        Ok(Self {
            command: Opcode::try_from(command)?,
            data: data.to_vec(),
        })
    }
}

fn check_data_len(len: usize) -> Result<u32, CommandError> {
    u32::try_from(len).map_err(|_| CommandError::PayloadTooLarge(len))
}

fn short(bytes: &[u8], expected: usize) -> DecodeError {
    DecodeError::NotEnoughData {
        expected,
        actual: bytes.len(),
    }
}

/// The answer of the firmware to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdacResponse {
    /// Outcome of the command.
    pub status: AdacStatus,
    /// Response payload. Its length is always a multiple of 4.
    pub data: Vec<u8>,
}

impl AdacResponse {
    /// Create a response. `data` is zero-padded to whole words.
    pub fn new(status: AdacStatus, mut data: Vec<u8>) -> Self {
        data.resize(data.len().div_ceil(WORD_SIZE) * WORD_SIZE, 0);
        Self { status, data }
    }

    /// The response as the firmware puts it on the wire.
    pub fn to_words(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(2 + self.data.len() / WORD_SIZE);
        words.push(u32::from(self.status as u16) << 16);
        words.push(self.data.len() as u32);
        words.extend(
            self.data
                .chunks(WORD_SIZE)
                .map(|chunk| {
                    let mut word = [0u8; WORD_SIZE];
                    word[..chunk.len()].copy_from_slice(chunk);
                    u32::from_le_bytes(word)
                }),
        );
        words
    }
}

/// Phase of the current mailbox transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction in flight.
    Idle,
    /// Request words are being written.
    Sending,
    /// The request is complete and the firmware is composing its response.
    TargetReadyWait,
    /// Response words are being read.
    Receiving,
}

/// Anything that can run one ADAC request/response exchange.
pub trait AdacTransport {
    /// Send `request` and wait for the complete response.
    fn request(&mut self, request: &AdacRequest) -> Result<AdacResponse, Error>;

    /// Run a typed command.
    ///
    /// Fails with [`Error::AdacFailure`] unless the firmware answered `SUCCESS`.
    fn execute<C: AdacCommand>(&mut self, command: &C) -> Result<C::Response, Error>
    where
        Self: Sized,
    {
        let response = self.request(&command.to_request()?)?;
        if response.status != AdacStatus::Success {
            return Err(Error::AdacFailure(response.status));
        }
        Ok(command.parse_response(&response.data)?)
    }

    /// Run a command picked at runtime, e.g. from the [`registry`].
    fn run(&mut self, command: &Command) -> Result<CommandOutput, Error> {
        let response = self.request(&command.to_request()?)?;
        if response.status != AdacStatus::Success {
            return Err(Error::AdacFailure(response.status));
        }
        Ok(command.parse_response(&response.data)?)
    }
}

impl<T: AdacTransport + ?Sized> AdacTransport for &mut T {
    fn request(&mut self, request: &AdacRequest) -> Result<AdacResponse, Error> {
        (**self).request(request)
    }
}

/// Drives ADAC transactions over a [`Mailbox`].
///
/// One call to [`AdacTransport::request`] is one transaction. Transactions never
/// overlap; the `&mut self` receiver keeps a single owner from interleaving them.
#[derive(Debug)]
pub struct Adac<L, C = StdClock> {
    mailbox: Mailbox<L, C>,
    state: TransactionState,
}

impl<L: DebugProbeLink> Adac<L> {
    /// Create a protocol driver that polls on the wall clock.
    pub fn new(link: L, registers: MailboxRegisters, poll: PollConfig) -> Self {
        Self::from_mailbox(Mailbox::new(link, registers, poll))
    }
}

impl<L: DebugProbeLink, C: Clock> Adac<L, C> {
    /// Wrap an existing mailbox.
    pub fn from_mailbox(mailbox: Mailbox<L, C>) -> Self {
        Self {
            mailbox,
            state: TransactionState::Idle,
        }
    }

    /// The phase the last transaction reached.
    ///
    /// Anything but [`TransactionState::Idle`] after a failed request tells where the
    /// exchange was aborted.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Access the mailbox, e.g. to adjust the poll configuration.
    pub fn mailbox_mut(&mut self) -> &mut Mailbox<L, C> {
        &mut self.mailbox
    }

    /// Release the underlying link.
    pub fn into_link(self) -> L {
        self.mailbox.into_link()
    }

    fn enter(&mut self, state: TransactionState) {
        tracing::trace!("ADAC transaction: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn receive_response(&mut self) -> Result<AdacResponse, Error> {
        let header = self.mailbox.read()?;
        let status = AdacStatus::try_from(u16::from_le_bytes([header[2], header[3]]))?;

        let data_count = u32::from_le_bytes(self.mailbox.read()?);
        if data_count % WORD_SIZE as u32 != 0 {
            return Err(DecodeError::UnalignedDataCount(data_count).into());
        }

        let words = data_count as usize / WORD_SIZE;
        tracing::debug!(
            "Receiving {} response ({} bytes)",
            status,
            data_count
        );

        let mut data = Vec::new();
        for _ in 0..words {
            data.extend_from_slice(&self.mailbox.read()?);
        }

        Ok(AdacResponse { status, data })
    }
}

impl<L: DebugProbeLink, C: Clock> AdacTransport for Adac<L, C> {
    fn request(&mut self, request: &AdacRequest) -> Result<AdacResponse, Error> {
        if self.state != TransactionState::Idle {
            tracing::warn!(
                "Starting a new ADAC transaction while the previous one was aborted in {:?}",
                self.state
            );
            self.state = TransactionState::Idle;
        }

        tracing::debug!(
            "Sending ADAC {:?} ({:#06x}) with {} bytes of data",
            request.command(),
            u16::from(request.command()),
            request.data_count()
        );

        self.mailbox.wait_for_ready()?;

        self.enter(TransactionState::Sending);
        for word in request.to_words() {
            self.mailbox.write(word)?;
        }

        self.enter(TransactionState::TargetReadyWait);
        self.mailbox.wait_for_ready()?;

        self.enter(TransactionState::Receiving);
        let response = self.receive_response()?;

        self.enter(TransactionState::Idle);
        Ok(response)
    }
}
