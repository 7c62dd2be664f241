use std::{convert::Infallible, time::Duration};

use crate::{
    adac::AdacStatus,
    mailbox::MailboxRegister,
    probe::LinkError,
    ssf::SsfError,
};

/// Errors raised while running a mailbox transaction.
///
/// None of these are retried by the stack. After a [`Error::Timeout`] or a
/// [`Error::Link`] error the mailbox state is undefined and the connection should be
/// re-established before the next request.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum Error {
    /// Timed out after {timeout:?} waiting on the {register} register.
    Timeout {
        /// The status register that never reached the awaited value.
        register: MailboxRegister,
        /// The configured timeout.
        timeout: Duration,
    },
    /// The target rejected the ADAC command with status {0}.
    AdacFailure(AdacStatus),
    /// The SSF service responded with {0}.
    SsfFailure(SsfError),
    /// The target sent a malformed response.
    Decode(#[from] DecodeError),
    /// The command could not be constructed.
    InvalidCommand(#[from] CommandError),
    /// The SSF request envelope could not be encoded.
    Encode(#[source] minicbor::encode::Error<Infallible>),
    /// Accessing the debug probe failed.
    Link(#[from] LinkError),
}

/// A response (or request byte stream) that violates the wire format.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum DecodeError {
    /// The response data count {0} is not a multiple of the word size.
    UnalignedDataCount(u32),
    /// Unknown ADAC status {0:#06x}.
    UnknownAdacStatus(u16),
    /// Unknown ADAC opcode {0:#06x}.
    UnknownOpcode(u16),
    /// Unknown SSF status code {0}.
    UnknownSsfStatus(i128),
    /// Expected at least {expected} bytes, got {actual}.
    NotEnoughData {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes available.
        actual: usize,
    },
    /// The SSF response is not valid CBOR.
    Cbor(#[source] minicbor::decode::Error),
    /// The SSF response is not a CBOR array.
    NotAnArray,
    /// The SSF response array is empty.
    MissingSsfStatus,
    /// The SSF status element is not an integer.
    InvalidSsfStatus,
    /// Found non-zero data after the SSF response at offset {0}.
    TrailingData(usize),
}

impl From<minicbor::decode::Error> for DecodeError {
    fn from(error: minicbor::decode::Error) -> Self {
        DecodeError::Cbor(error)
    }
}

/// A command whose fields are rejected before anything is put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub enum CommandError {
    /// Unknown command '{0}'.
    UnknownCommand(String),
    /// Missing value for field '{0}'.
    MissingField(&'static str),
    /// Field '{field}' expects {expected}.
    WrongKind {
        /// Field name.
        field: &'static str,
        /// Human readable description of the expected kind.
        expected: &'static str,
    },
    /// Value {value:#x} does not fit into field '{field}' (max {max:#x}).
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// The rejected value.
        value: u64,
        /// Largest accepted value.
        max: u64,
    },
    /// The memory range must not be empty.
    EmptyRange,
    /// The range starting at {address:#010x} with {length:#x} bytes exceeds the 32-bit address space.
    RangeOverflow {
        /// Start address.
        address: u32,
        /// Length of the range in bytes.
        length: u64,
    },
    /// Erase address {0:#010x} is not aligned to a 16-byte erase word.
    UnalignedEraseAddress(u32),
    /// The new life-cycle state equals the current one ({0:#x}).
    UnchangedLifeCycleState(u32),
    /// The SSF payload must not be empty.
    EmptySsfPayload,
    /// Opcode {0:#06x} is outside the ADAC command range.
    OpcodeOutOfRange(u16),
    /// A payload of {0} bytes does not fit the 32-bit data count.
    PayloadTooLarge(usize),
}
