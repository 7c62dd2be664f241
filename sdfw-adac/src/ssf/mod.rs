//! SDFW service framework (SSF) requests carried by the ADAC `Ssf` command.
//!
//! Every request starts with a CBOR envelope naming the remote, the service and its
//! version, followed by the service specific CBOR payload:
//!
//! ```text
//! [165, service_id, service_version] <service request...>
//! ```
//!
//! The response is one CBOR array whose first element is an [`SsfError`] status.

mod errno;
mod value;

pub use errno::SsfError;
pub use value::CborValue;

use minicbor::{
    encode::{self, Write},
    Encode, Encoder,
};

use crate::{
    adac::{
        commands::{AdacCommand, Ssf},
        AdacStatus, AdacTransport,
    },
    DecodeError, Error,
};

/// Remote identifier of the SDFW in the SSF envelope.
pub const REMOTE_ID: u8 = 165;

/// Identifies a versioned SSF service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SsfService {
    pub id: u16,
    pub version: u16,
}

impl SsfService {
    /// The SUIT update delivery service.
    pub const SUIT: SsfService = SsfService::new(0x69, 1);

    pub const fn new(id: u16, version: u16) -> Self {
        Self { id, version }
    }
}

/// The envelope in front of every service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsfHeader {
    pub remote_id: u8,
    pub service: SsfService,
}

impl SsfHeader {
    pub fn new(service: SsfService) -> Self {
        Self {
            remote_id: REMOTE_ID,
            service,
        }
    }

    /// The CBOR encoding of the header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        minicbor::to_vec(self).map_err(Error::Encode)
    }
}

impl<C> Encode<C> for SsfHeader {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.array(3)?
            .u8(self.remote_id)?
            .u16(self.service.id)?
            .u16(self.service.version)?;
        Ok(())
    }
}

/// Decode the data of a successful `Ssf` ADAC response.
///
/// Returns the whole response array, status included, if the status is
/// [`SsfError::Success`].
pub fn decode_response(data: &[u8]) -> Result<Vec<CborValue>, Error> {
    let items = decode_array(data)?;

    let status = items
        .first()
        .ok_or(DecodeError::MissingSsfStatus)?
        .as_integer()
        .ok_or(DecodeError::InvalidSsfStatus)?;

    match SsfError::from_status(status)? {
        SsfError::Success => Ok(items),
        error => Err(Error::SsfFailure(error)),
    }
}

fn decode_array(data: &[u8]) -> Result<Vec<CborValue>, DecodeError> {
    let mut decoder = minicbor::Decoder::new(data);
    let value: CborValue = decoder.decode()?;

    // The ADAC response is padded to whole words.
    let end = decoder.position();
    if let Some(offset) = data[end..].iter().position(|byte| *byte != 0) {
        return Err(DecodeError::TrailingData(end + offset));
    }

    match value {
        CborValue::Array(items) => Ok(items),
        _ => Err(DecodeError::NotAnArray),
    }
}

/// Sends requests to one SSF service through an [`AdacTransport`].
#[derive(Debug)]
pub struct SsfClient<T> {
    transport: T,
    service: SsfService,
}

impl<T: AdacTransport> SsfClient<T> {
    pub fn new(transport: T, service: SsfService) -> Self {
        Self { transport, service }
    }

    pub fn service(&self) -> SsfService {
        self.service
    }

    /// Access the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send the CBOR encoded `service_request` and return the decoded response array.
    ///
    /// Fails with [`Error::AdacFailure`] if the ADAC command itself failed and with
    /// [`Error::SsfFailure`] if the service reported a non-zero status.
    pub fn request(&mut self, service_request: &[u8]) -> Result<Vec<CborValue>, Error> {
        let mut payload = SsfHeader::new(self.service).to_bytes()?;
        payload.extend_from_slice(service_request);

        tracing::debug!(
            "SSF request to service {:#x} v{} ({} bytes)",
            self.service.id,
            self.service.version,
            payload.len()
        );

        let response = self.transport.request(&Ssf::new(payload)?.to_request()?)?;
        if response.status != AdacStatus::Success {
            return Err(Error::AdacFailure(response.status));
        }

        decode_response(&response.data)
    }
}
