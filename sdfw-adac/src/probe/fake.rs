#![allow(missing_docs)] // Don't require docs for test code
use std::collections::VecDeque;

use crate::{
    adac::{AdacRequest, AdacResponse, AdacStatus},
    mailbox::{MailboxRegisters, MailboxStatus, ReadyStatus},
    DecodeError, WORD_SIZE,
};

use super::{DebugProbeLink, LinkError};

/// Behaviour knobs of a [`FakeTarget`].
#[derive(Debug, Clone, Copy)]
pub struct FakeTargetConfig {
    pub registers: MailboxRegisters,
    /// READY never leaves NOT_READY.
    pub never_ready: bool,
    /// Number of READY reads answered with NOT_READY before the firmware is ready.
    pub not_ready_polls: usize,
    /// Number of TXSTATUS reads that report a written word as still pending.
    pub tx_pending_polls: usize,
    /// Written words are never consumed.
    pub stall_tx: bool,
    /// Every access to this register fails with a probe error.
    pub failing_register: Option<u32>,
}

impl Default for FakeTargetConfig {
    fn default() -> Self {
        Self {
            registers: MailboxRegisters::default(),
            never_ready: false,
            not_ready_polls: 0,
            tx_pending_polls: 0,
            stall_tx: false,
            failing_register: None,
        }
    }
}

/// One register access seen by the fake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAccess {
    Read { address: u32, value: u32 },
    Write { address: u32, value: u32 },
}

impl RegisterAccess {
    pub fn address(&self) -> u32 {
        match self {
            RegisterAccess::Read { address, .. } | RegisterAccess::Write { address, .. } => {
                *address
            }
        }
    }
}

type ResponseHandler = Box<dyn FnMut(&AdacRequest) -> AdacResponse + Send>;
type RawHandler = Box<dyn FnMut(&AdacRequest) -> Vec<u32> + Send>;

enum Handler {
    Response(ResponseHandler),
    Raw(RawHandler),
}

/// Simulates the SDFW side of the CTRL-AP mailbox at register level.
///
/// Words written to TXDATA are collected until a complete ADAC request has arrived.
/// The request is then handed to the installed handler and the response is queued
/// on RXDATA, word by word.
pub struct FakeTarget {
    config: FakeTargetConfig,
    handler: Handler,

    ready_polls_left: usize,
    tx_pending_left: usize,
    tx_written: bool,

    inbox: Vec<u8>,
    outbox: VecDeque<u32>,

    requests: Vec<AdacRequest>,
    accesses: Vec<RegisterAccess>,
}

impl std::fmt::Debug for FakeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeTarget")
            .field("config", &self.config)
            .field("inbox", &self.inbox)
            .field("outbox", &self.outbox)
            .finish_non_exhaustive()
    }
}

impl FakeTarget {
    /// A target that answers every request with an empty `SUCCESS` response.
    pub fn new(config: FakeTargetConfig) -> Self {
        Self {
            ready_polls_left: config.not_ready_polls,
            config,
            handler: Handler::Response(Box::new(|_| AdacResponse::new(AdacStatus::Success, vec![]))),
            tx_pending_left: 0,
            tx_written: false,
            inbox: vec![],
            outbox: VecDeque::new(),
            requests: vec![],
            accesses: vec![],
        }
    }

    /// Answer requests with the response built by `handler`.
    pub fn on_request(
        mut self,
        handler: impl FnMut(&AdacRequest) -> AdacResponse + Send + 'static,
    ) -> Self {
        self.handler = Handler::Response(Box::new(handler));
        self
    }

    /// Answer requests with raw response words, bypassing the response encoder.
    pub fn on_request_raw(
        mut self,
        handler: impl FnMut(&AdacRequest) -> Vec<u32> + Send + 'static,
    ) -> Self {
        self.handler = Handler::Raw(Box::new(handler));
        self
    }

    /// All complete requests received so far.
    pub fn requests(&self) -> &[AdacRequest] {
        &self.requests
    }

    /// Every register access in order.
    pub fn accesses(&self) -> &[RegisterAccess] {
        &self.accesses
    }

    /// All values written to TXDATA.
    pub fn written_words(&self) -> Vec<u32> {
        self.accesses
            .iter()
            .filter_map(|access| match access {
                RegisterAccess::Write { address, value } if *address == self.config.registers.txdata => {
                    Some(*value)
                }
                _ => None,
            })
            .collect()
    }

    fn status(pending: bool) -> u32 {
        if pending {
            MailboxStatus::DataPending as u32
        } else {
            MailboxStatus::NoDataPending as u32
        }
    }

    fn read_ready(&mut self) -> u32 {
        if self.config.never_ready {
            return ReadyStatus::NotReady as u32;
        }
        if self.ready_polls_left > 0 {
            self.ready_polls_left -= 1;
            return ReadyStatus::NotReady as u32;
        }
        ReadyStatus::Ready as u32
    }

    fn read_txstatus(&mut self) -> u32 {
        if !self.tx_written {
            return Self::status(false);
        }
        if self.config.stall_tx {
            return Self::status(true);
        }
        if self.tx_pending_left > 0 {
            self.tx_pending_left -= 1;
            return Self::status(true);
        }
        Self::status(false)
    }

    fn receive_word(&mut self, value: u32) {
        self.tx_written = true;
        self.tx_pending_left = self.config.tx_pending_polls;
        self.inbox.extend_from_slice(&value.to_le_bytes());

        if let Some(total) = Self::expected_request_len(&self.inbox) {
            if self.inbox.len() >= total {
                let bytes = std::mem::take(&mut self.inbox);
                self.process_request(&bytes);
            }
        }
    }

    /// Length of the padded request once its header is complete.
    fn expected_request_len(inbox: &[u8]) -> Option<usize> {
        let count = inbox.get(4..8)?;
        let count = u32::from_le_bytes([count[0], count[1], count[2], count[3]]) as usize;
        Some((AdacRequest::HEADER_LEN + count).div_ceil(WORD_SIZE) * WORD_SIZE)
    }

    fn process_request(&mut self, bytes: &[u8]) {
        let words = match AdacRequest::from_bytes(bytes) {
            Ok(request) => {
                let words = match &mut self.handler {
                    Handler::Response(handler) => handler(&request).to_words(),
                    Handler::Raw(handler) => handler(&request),
                };
                self.requests.push(request);
                words
            }
            Err(DecodeError::UnknownOpcode(_)) => {
                AdacResponse::new(AdacStatus::InvalidCommand, vec![]).to_words()
            }
            Err(error) => {
                tracing::warn!("Fake target dropped malformed request: {error}");
                AdacResponse::new(AdacStatus::Failure, vec![]).to_words()
            }
        };

        self.outbox.extend(words);
    }

    fn check_failure(&self, address: u32) -> Result<(), LinkError> {
        if self.config.failing_register == Some(address) {
            return Err(LinkError::probe_specific(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "probe disconnected",
            )));
        }
        Ok(())
    }
}

impl DebugProbeLink for FakeTarget {
    fn read_register(&mut self, address: u32) -> Result<u32, LinkError> {
        self.check_failure(address)?;

        let registers = self.config.registers;
        let value = if address == registers.ready {
            self.read_ready()
        } else if address == registers.txstatus {
            self.read_txstatus()
        } else if address == registers.rxstatus {
            Self::status(!self.outbox.is_empty())
        } else if address == registers.rxdata {
            self.outbox.pop_front().unwrap_or(0)
        } else if address == registers.txdata {
            0
        } else {
            return Err(LinkError::UnknownRegister(address));
        };

        tracing::trace!("[fake] read {:#05x} = {:#010x}", address, value);
        self.accesses.push(RegisterAccess::Read { address, value });
        Ok(value)
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), LinkError> {
        self.check_failure(address)?;

        if address != self.config.registers.txdata {
            return Err(LinkError::UnknownRegister(address));
        }

        tracing::trace!("[fake] write {:#05x} = {:#010x}", address, value);
        self.accesses.push(RegisterAccess::Write { address, value });
        self.receive_word(value);
        Ok(())
    }
}
