//! The ADAC vendor command catalog.
//!
//! Every command is a plain value that validates its fields on construction and
//! encodes itself without any I/O. [`Command`] collects them into one closed type
//! for callers that pick the command at runtime.

use scroll::{Pread, LE};

use crate::{CommandError, DecodeError};

use super::{AdacRequest, Opcode};

/// Size of one erase unit of [`MemErase`] in bytes.
pub const ERASE_WORD_SIZE: u32 = 16;

/// A command with a fixed payload layout and a typed response.
pub trait AdacCommand {
    /// The opcode sent in the request header.
    const OPCODE: Opcode;

    /// What a successful response decodes to.
    type Response;

    /// Encode the command payload.
    fn to_payload(&self) -> Vec<u8>;

    /// Decode the data of a `SUCCESS` response.
    fn parse_response(&self, data: &[u8]) -> Result<Self::Response, DecodeError>;

    /// The request that carries this command.
    fn to_request(&self) -> Result<AdacRequest, CommandError> {
        AdacRequest::new(Self::OPCODE, self.to_payload())
    }
}

fn read_u32(data: &[u8]) -> Result<u32, DecodeError> {
    data.pread_with::<u32>(0, LE)
        .map_err(|_| DecodeError::NotEnoughData {
            expected: 4,
            actual: data.len(),
        })
}

/// Query the version of the ADAC vendor commands of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub kind: u32,
}

impl Version {
    pub fn new(kind: u32) -> Self {
        Self { kind }
    }
}

impl AdacCommand for Version {
    const OPCODE: Opcode = Opcode::Version;
    type Response = u32;

    fn to_payload(&self) -> Vec<u8> {
        self.kind.to_le_bytes().to_vec()
    }

    fn parse_response(&self, data: &[u8]) -> Result<u32, DecodeError> {
        read_u32(data)
    }
}

/// Grant a local domain access to a memory range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemCfg {
    domain_id: u16,
    address: u32,
    length: u32,
}

impl MemCfg {
    /// The range `address..address + length` must be non-empty and inside the
    /// 32-bit address space.
    pub fn new(domain_id: u16, address: u32, length: u32) -> Result<Self, CommandError> {
        if length == 0 {
            return Err(CommandError::EmptyRange);
        }
        check_range(address, u64::from(length))?;

        Ok(Self {
            domain_id,
            address,
            length,
        })
    }

    pub fn domain_id(&self) -> u16 {
        self.domain_id
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn length(&self) -> u32 {
        self.length
    }
}

fn check_range(address: u32, length: u64) -> Result<(), CommandError> {
    if u64::from(address) + length > 1 << 32 {
        return Err(CommandError::RangeOverflow { address, length });
    }
    Ok(())
}

impl AdacCommand for MemCfg {
    const OPCODE: Opcode = Opcode::MemCfg;
    type Response = ();

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(12);
        payload.extend_from_slice(&self.domain_id.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&self.address.to_le_bytes());
        payload.extend_from_slice(&self.length.to_le_bytes());
        payload
    }

    fn parse_response(&self, _data: &[u8]) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Undo the configuration applied through ADAC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revert;

impl AdacCommand for Revert {
    const OPCODE: Opcode = Opcode::Revert;
    type Response = ();

    fn to_payload(&self) -> Vec<u8> {
        vec![]
    }

    fn parse_response(&self, _data: &[u8]) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Reset the whole system or a single local domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reset {
    pub domain_id: u8,
    pub mode: u8,
}

impl Reset {
    pub fn new(domain_id: u8, mode: u8) -> Self {
        Self { domain_id, mode }
    }
}

impl AdacCommand for Reset {
    const OPCODE: Opcode = Opcode::Reset;
    type Response = ();

    fn to_payload(&self) -> Vec<u8> {
        vec![0, 0, self.domain_id, self.mode]
    }

    fn parse_response(&self, _data: &[u8]) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Erase `num_words` erase words of 16 bytes starting at `address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemErase {
    address: u32,
    num_words: u32,
}

impl MemErase {
    pub fn new(address: u32, num_words: u32) -> Result<Self, CommandError> {
        if num_words == 0 {
            return Err(CommandError::EmptyRange);
        }
        if address % ERASE_WORD_SIZE != 0 {
            return Err(CommandError::UnalignedEraseAddress(address));
        }
        check_range(address, u64::from(num_words) * u64::from(ERASE_WORD_SIZE))?;

        Ok(Self { address, num_words })
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn num_words(&self) -> u32 {
        self.num_words
    }
}

impl AdacCommand for MemErase {
    const OPCODE: Opcode = Opcode::MemErase;
    type Response = ();

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&self.address.to_le_bytes());
        payload.extend_from_slice(&self.num_words.to_le_bytes());
        payload
    }

    fn parse_response(&self, _data: &[u8]) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Read the life-cycle state of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcsGet {
    pub domain_id: u32,
}

impl LcsGet {
    pub fn new(domain_id: u32) -> Self {
        Self { domain_id }
    }
}

impl AdacCommand for LcsGet {
    const OPCODE: Opcode = Opcode::LcsGet;
    type Response = u32;

    fn to_payload(&self) -> Vec<u8> {
        self.domain_id.to_le_bytes().to_vec()
    }

    fn parse_response(&self, data: &[u8]) -> Result<u32, DecodeError> {
        read_u32(data)
    }
}

/// Move a domain from the `current` life-cycle state to `new`.
///
/// The firmware refuses the transition if `current` does not match the actual state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcsSet {
    domain_id: u32,
    current: u32,
    new: u32,
}

impl LcsSet {
    pub fn new(domain_id: u32, current: u32, new: u32) -> Result<Self, CommandError> {
        if current == new {
            return Err(CommandError::UnchangedLifeCycleState(current));
        }
        Ok(Self {
            domain_id,
            current,
            new,
        })
    }

    pub fn domain_id(&self) -> u32 {
        self.domain_id
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn new_state(&self) -> u32 {
        self.new
    }
}

impl AdacCommand for LcsSet {
    const OPCODE: Opcode = Opcode::LcsSet;
    type Response = ();

    fn to_payload(&self) -> Vec<u8> {
        [self.domain_id, self.current, self.new]
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect()
    }

    fn parse_response(&self, _data: &[u8]) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// An opaque SSF request, see [`crate::ssf`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ssf {
    payload: Vec<u8>,
}

impl Ssf {
    pub fn new(payload: Vec<u8>) -> Result<Self, CommandError> {
        if payload.is_empty() {
            return Err(CommandError::EmptySsfPayload);
        }
        Ok(Self { payload })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl AdacCommand for Ssf {
    const OPCODE: Opcode = Opcode::Ssf;
    type Response = Vec<u8>;

    fn to_payload(&self) -> Vec<u8> {
        self.payload.clone()
    }

    fn parse_response(&self, data: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(data.to_vec())
    }
}

/// Purge the persisted state of a local domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purge {
    pub domain_id: u32,
}

impl Purge {
    pub fn new(domain_id: u32) -> Self {
        Self { domain_id }
    }
}

impl AdacCommand for Purge {
    const OPCODE: Opcode = Opcode::Purge;
    type Response = ();

    fn to_payload(&self) -> Vec<u8> {
        self.domain_id.to_le_bytes().to_vec()
    }

    fn parse_response(&self, _data: &[u8]) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Any command of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Version(Version),
    MemCfg(MemCfg),
    Revert(Revert),
    Reset(Reset),
    MemErase(MemErase),
    LcsGet(LcsGet),
    LcsSet(LcsSet),
    Ssf(Ssf),
    Purge(Purge),
}

/// The decoded result of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// The command has no result beyond success.
    Done,
    /// A single 32-bit value.
    Value(u32),
    /// Raw response data.
    Data(Vec<u8>),
}

impl Command {
    /// The opcode of the wrapped command.
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Version(_) => Version::OPCODE,
            Command::MemCfg(_) => MemCfg::OPCODE,
            Command::Revert(_) => Revert::OPCODE,
            Command::Reset(_) => Reset::OPCODE,
            Command::MemErase(_) => MemErase::OPCODE,
            Command::LcsGet(_) => LcsGet::OPCODE,
            Command::LcsSet(_) => LcsSet::OPCODE,
            Command::Ssf(_) => Ssf::OPCODE,
            Command::Purge(_) => Purge::OPCODE,
        }
    }

    /// The request that carries the wrapped command.
    pub fn to_request(&self) -> Result<AdacRequest, CommandError> {
        match self {
            Command::Version(command) => command.to_request(),
            Command::MemCfg(command) => command.to_request(),
            Command::Revert(command) => command.to_request(),
            Command::Reset(command) => command.to_request(),
            Command::MemErase(command) => command.to_request(),
            Command::LcsGet(command) => command.to_request(),
            Command::LcsSet(command) => command.to_request(),
            Command::Ssf(command) => command.to_request(),
            Command::Purge(command) => command.to_request(),
        }
    }

    /// Decode the data of a `SUCCESS` response to the wrapped command.
    pub fn parse_response(&self, data: &[u8]) -> Result<CommandOutput, DecodeError> {
        Ok(match self {
            Command::Version(command) => CommandOutput::Value(command.parse_response(data)?),
            Command::LcsGet(command) => CommandOutput::Value(command.parse_response(data)?),
            Command::Ssf(command) => CommandOutput::Data(command.parse_response(data)?),
            Command::MemCfg(_)
            | Command::Revert(_)
            | Command::Reset(_)
            | Command::MemErase(_)
            | Command::LcsSet(_)
            | Command::Purge(_) => CommandOutput::Done,
        })
    }
}

macro_rules! impl_from_command {
    ($($name:ident),*) => {
        $(
            impl From<$name> for Command {
                fn from(command: $name) -> Self {
                    Command::$name(command)
                }
            }
        )*
    };
}

impl_from_command!(Version, MemCfg, Revert, Reset, MemErase, LcsGet, LcsSet, Ssf, Purge);

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn lcs_get_payload() {
        let request = LcsGet::new(3).to_request().unwrap();

        assert_eq!(request.command(), Opcode::LcsGet);
        assert_eq!(u16::from(request.command()), 0xA305);
        assert_eq!(request.data(), b"\x03\x00\x00\x00");
    }

    #[test]
    fn reset_payload() {
        let request = Reset::new(2, 1).to_request().unwrap();

        assert_eq!(u16::from(request.command()), 0xA303);
        assert_eq!(request.data(), b"\x00\x00\x02\x01");
    }

    #[test]
    fn mem_cfg_payload() {
        let request = MemCfg::new(1, 0x2000, 0x100).unwrap().to_request().unwrap();

        let mut expected = vec![];
        expected.extend_from_slice(&1u16.to_le_bytes());
        expected.extend_from_slice(&0u16.to_le_bytes());
        expected.extend_from_slice(&0x2000u32.to_le_bytes());
        expected.extend_from_slice(&0x100u32.to_le_bytes());

        assert_eq!(u16::from(request.command()), 0xA301);
        assert_eq!(request.data(), expected);
    }

    #[test]
    fn version_payload() {
        let request = Version::new(0x0102_0304).to_request().unwrap();

        assert_eq!(u16::from(request.command()), 0xA300);
        assert_eq!(request.data(), [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn revert_has_no_payload() {
        let request = Revert.to_request().unwrap();

        assert_eq!(u16::from(request.command()), 0xA302);
        assert_eq!(request.data_count(), 0);
    }

    #[test]
    fn mem_erase_payload() {
        let request = MemErase::new(0x0e0a_0000, 4).unwrap().to_request().unwrap();

        assert_eq!(u16::from(request.command()), 0xA304);
        assert_eq!(
            request.data(),
            [0x00, 0x00, 0x0a, 0x0e, 0x04, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn lcs_set_payload() {
        let request = LcsSet::new(2, 0x10, 0x20).unwrap().to_request().unwrap();

        assert_eq!(u16::from(request.command()), 0xA306);
        assert_eq!(
            request.data(),
            [2, 0, 0, 0, 0x10, 0, 0, 0, 0x20, 0, 0, 0]
        );
    }

    #[test]
    fn purge_payload() {
        let request = Purge::new(4).to_request().unwrap();

        assert_eq!(u16::from(request.command()), 0xA308);
        assert_eq!(request.data(), [4, 0, 0, 0]);
    }

    #[test]
    fn ssf_payload_is_opaque() {
        let request = Ssf::new(vec![0x83, 0x18, 0xa5, 0x18]).unwrap().to_request().unwrap();

        assert_eq!(u16::from(request.command()), 0xA307);
        assert_eq!(request.data(), [0x83, 0x18, 0xa5, 0x18]);
    }

    #[test_case(0x2000, 0 => CommandError::EmptyRange; "empty")]
    #[test_case(0xffff_ff00, 0x101 => CommandError::RangeOverflow { address: 0xffff_ff00, length: 0x101 }; "overflow")]
    fn mem_cfg_rejects(address: u32, length: u32) -> CommandError {
        MemCfg::new(1, address, length).unwrap_err()
    }

    #[test]
    fn mem_cfg_accepts_range_up_to_end_of_address_space() {
        assert!(MemCfg::new(1, 0xffff_ff00, 0x100).is_ok());
    }

    #[test_case(0x1000, 0 => CommandError::EmptyRange; "no words")]
    #[test_case(0x1008, 1 => CommandError::UnalignedEraseAddress(0x1008); "unaligned")]
    #[test_case(0xffff_fff0, 2 => CommandError::RangeOverflow { address: 0xffff_fff0, length: 32 }; "overflow")]
    fn mem_erase_rejects(address: u32, num_words: u32) -> CommandError {
        MemErase::new(address, num_words).unwrap_err()
    }

    #[test]
    fn lcs_set_rejects_unchanged_state() {
        assert_eq!(
            LcsSet::new(2, 0x30, 0x30).unwrap_err(),
            CommandError::UnchangedLifeCycleState(0x30)
        );
    }

    #[test]
    fn ssf_rejects_empty_payload() {
        assert_eq!(Ssf::new(vec![]).unwrap_err(), CommandError::EmptySsfPayload);
    }

    #[test]
    fn value_responses_need_a_word() {
        assert_eq!(LcsGet::new(1).parse_response(&[0x00, 0x30, 0, 0]).unwrap(), 0x3000);
        assert!(matches!(
            Version::new(0).parse_response(&[1, 2]),
            Err(DecodeError::NotEnoughData {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn command_dispatches_to_variant() {
        let command = Command::from(Reset::new(0, 1));

        assert_eq!(command.opcode(), Opcode::Reset);
        assert_eq!(command.to_request().unwrap(), Reset::new(0, 1).to_request().unwrap());
        assert_eq!(
            command.parse_response(&[0xde, 0xad, 0xbe, 0xef]).unwrap(),
            CommandOutput::Done
        );

        let command = Command::from(LcsGet::new(2));
        assert_eq!(
            command.parse_response(&[7, 0, 0, 0]).unwrap(),
            CommandOutput::Value(7)
        );
    }
}
