//! The debug probe seam.
//!
//! Opening a probe, selecting the wire protocol, powering up the debug port and
//! selecting the CTRL-AP are done once when a link is created. After that the
//! protocol stack only needs 32-bit register reads and writes on that access port.

#[cfg(any(test, feature = "test"))]
mod fake;

#[cfg(any(test, feature = "test"))]
pub use fake::{FakeTarget, FakeTargetConfig, RegisterAccess};

/// Register level access to the mailbox access port.
///
/// Implementations own the probe connection for their whole lifetime. Only one
/// transaction may use a link at a time, which `&mut self` enforces for a single
/// owner.
pub trait DebugProbeLink {
    /// Read the 32-bit register at `address` on the selected access port.
    fn read_register(&mut self, address: u32) -> Result<u32, LinkError>;

    /// Write `value` to the 32-bit register at `address` on the selected access port.
    fn write_register(&mut self, address: u32, value: u32) -> Result<(), LinkError>;
}

impl<T: DebugProbeLink + ?Sized> DebugProbeLink for &mut T {
    fn read_register(&mut self, address: u32) -> Result<u32, LinkError> {
        (**self).read_register(address)
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), LinkError> {
        (**self).write_register(address, value)
    }
}

impl<T: DebugProbeLink + ?Sized> DebugProbeLink for Box<T> {
    fn read_register(&mut self, address: u32) -> Result<u32, LinkError> {
        (**self).read_register(address)
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), LinkError> {
        (**self).write_register(address, value)
    }
}

/// Errors reported by a [`DebugProbeLink`].
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum LinkError {
    /// The debug probe reported an error.
    ProbeSpecific(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Register {0:#05x} is not accessible through this link.
    UnknownRegister(u32),
}

impl LinkError {
    /// Wrap a probe driver error.
    pub fn probe_specific(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::ProbeSpecific(Box::new(error))
    }
}
