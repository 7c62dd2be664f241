//! Word-granular transport over the CTRL-AP mailbox registers.
//!
//! The host and the SDFW exchange 32-bit words through two data registers. Each
//! direction has a status register signalling whether a word is pending, and a
//! separate READY register tells the host when the firmware is able to take part
//! in an exchange. All blocking operations poll with the same [`PollConfig`].

use std::{fmt, time::Duration};

use crate::{
    clock::{Clock, StdClock},
    probe::DebugProbeLink,
    Error, WORD_SIZE,
};

/// Offsets of the mailbox registers within the access port's register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxRegisters {
    /// Firmware readiness, see [`ReadyStatus`].
    pub ready: u32,
    /// Host to target data.
    pub txdata: u32,
    /// Host to target status, see [`MailboxStatus`].
    pub txstatus: u32,
    /// Target to host data.
    pub rxdata: u32,
    /// Target to host status, see [`MailboxStatus`].
    pub rxstatus: u32,
}

impl MailboxRegisters {
    /// Layout of the nRF54H CTRL-AP.
    pub const CTRL_AP: Self = Self {
        ready: 0x004,
        txdata: 0x010,
        txstatus: 0x014,
        rxdata: 0x020,
        rxstatus: 0x024,
    };

    /// The offset of `register`.
    pub fn address(&self, register: MailboxRegister) -> u32 {
        match register {
            MailboxRegister::Ready => self.ready,
            MailboxRegister::TxData => self.txdata,
            MailboxRegister::TxStatus => self.txstatus,
            MailboxRegister::RxData => self.rxdata,
            MailboxRegister::RxStatus => self.rxstatus,
        }
    }
}

impl Default for MailboxRegisters {
    fn default() -> Self {
        Self::CTRL_AP
    }
}

/// Names the registers of the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailboxRegister {
    Ready,
    TxData,
    TxStatus,
    RxData,
    RxStatus,
}

impl MailboxRegister {
    /// Register name as used in the reference manual.
    pub fn name(self) -> &'static str {
        match self {
            MailboxRegister::Ready => "READY",
            MailboxRegister::TxData => "TXDATA",
            MailboxRegister::TxStatus => "TXSTATUS",
            MailboxRegister::RxData => "RXDATA",
            MailboxRegister::RxStatus => "RXSTATUS",
        }
    }
}

impl fmt::Display for MailboxRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of the READY register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ReadyStatus {
    Ready = 0,
    NotReady = 1,
}

/// Value of the TXSTATUS and RXSTATUS registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MailboxStatus {
    NoDataPending = 0,
    DataPending = 1,
}

/// Bounds for every polling loop of the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// How long a single wait may take before it fails with [`Error::Timeout`].
    pub timeout: Duration,
    /// Pause between two reads of a status register.
    pub poll_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// The mailbox of one access port.
///
/// `write` and `read` block until the firmware has consumed, or provided, a word.
/// There is no cancellation: once a wait times out the exchange is broken and the
/// caller has to reconnect.
#[derive(Debug)]
pub struct Mailbox<L, C = StdClock> {
    link: L,
    registers: MailboxRegisters,
    poll: PollConfig,
    clock: C,
}

impl<L: DebugProbeLink> Mailbox<L> {
    /// Create a mailbox that waits on the wall clock.
    pub fn new(link: L, registers: MailboxRegisters, poll: PollConfig) -> Self {
        Self::with_clock(link, registers, poll, StdClock)
    }
}

impl<L: DebugProbeLink, C: Clock> Mailbox<L, C> {
    /// Create a mailbox with a custom time source.
    pub fn with_clock(link: L, registers: MailboxRegisters, poll: PollConfig, clock: C) -> Self {
        Self {
            link,
            registers,
            poll,
            clock,
        }
    }

    /// The polling bounds in use.
    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    /// Change the polling bounds for subsequent operations.
    pub fn set_poll_config(&mut self, poll: PollConfig) {
        self.poll = poll;
    }

    /// Release the underlying link.
    pub fn into_link(self) -> L {
        self.link
    }

    /// Block until the firmware reports READY.
    pub fn wait_for_ready(&mut self) -> Result<(), Error> {
        self.poll_while(MailboxRegister::Ready, |value| {
            value == ReadyStatus::NotReady as u32
        })?;
        Ok(())
    }

    /// Send one word and wait until the firmware has consumed it.
    pub fn write(&mut self, word: [u8; WORD_SIZE]) -> Result<(), Error> {
        let value = u32::from_le_bytes(word);
        tracing::trace!("TXDATA <- {:#010x}", value);
        self.link
            .write_register(self.registers.address(MailboxRegister::TxData), value)?;

        self.poll_while(MailboxRegister::TxStatus, |value| {
            value == MailboxStatus::DataPending as u32
        })?;
        Ok(())
    }

    /// Wait until the firmware provides a word and read it.
    pub fn read(&mut self) -> Result<[u8; WORD_SIZE], Error> {
        self.poll_while(MailboxRegister::RxStatus, |value| {
            value == MailboxStatus::NoDataPending as u32
        })?;

        let value = self
            .link
            .read_register(self.registers.address(MailboxRegister::RxData))?;
        tracing::trace!("RXDATA -> {:#010x}", value);
        Ok(value.to_le_bytes())
    }

    /// Poll `register` as long as `busy` holds for its value.
    ///
    /// The register is always read at least once, so a zero timeout still succeeds
    /// when the awaited value is already present.
    fn poll_while(
        &mut self,
        register: MailboxRegister,
        busy: impl Fn(u32) -> bool,
    ) -> Result<u32, Error> {
        let address = self.registers.address(register);
        let start = self.clock.now();

        loop {
            let value = self.link.read_register(address)?;
            if !busy(value) {
                tracing::trace!("{} = {:#x}", register, value);
                return Ok(value);
            }

            if self.clock.now().duration_since(start) >= self.poll.timeout {
                tracing::debug!(
                    "Timed out waiting on {} (last value {:#x})",
                    register,
                    value
                );
                return Err(Error::Timeout {
                    register,
                    timeout: self.poll.timeout,
                });
            }

            self.clock.sleep(self.poll.poll_interval);
        }
    }
}
