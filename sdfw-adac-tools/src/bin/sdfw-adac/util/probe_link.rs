//! [`DebugProbeLink`] on top of a probe-rs ARM debug interface.

use probe_rs::{
    architecture::arm::{
        dp::DpAddress, sequences::DefaultArmSequence, ArmDebugInterface, ArmError,
        FullyQualifiedApAddress,
    },
    probe::Probe,
};
use sdfw_adac::{DebugProbeLink, LinkError};

#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum ConnectError {
    /// Failed to attach to the target.
    Attach(#[source] probe_rs::Error),
    /// The probe does not provide an ARM debug interface.
    ArmInterface(#[source] ArmError),
    /// Failed to select the default debug port.
    DebugPort(#[source] ArmError),
}

/// Raw register access to the CTRL-AP of the default debug port.
pub struct ProbeRsLink {
    interface: Box<dyn ArmDebugInterface>,
    ctrl_ap: FullyQualifiedApAddress,
}

impl ProbeRsLink {
    /// Attach to the target behind `probe` and open the access port with index `ctrl_ap`.
    ///
    /// The probe is expected to be configured already (protocol and speed).
    pub fn connect(mut probe: Probe, ctrl_ap: u8) -> Result<Self, ConnectError> {
        probe.attach_to_unspecified().map_err(ConnectError::Attach)?;

        let mut interface = probe
            .try_into_arm_debug_interface(DefaultArmSequence::create())
            .map_err(|(_probe, error)| ConnectError::ArmInterface(error))?;

        interface
            .select_debug_port(DpAddress::Default)
            .map_err(ConnectError::DebugPort)?;

        tracing::debug!("Connected to CTRL-AP {}", ctrl_ap);

        Ok(Self {
            interface,
            ctrl_ap: FullyQualifiedApAddress::v1_with_default_dp(ctrl_ap),
        })
    }

    /// Close the debug interface and hand back the probe.
    pub fn disconnect(self) -> Probe {
        tracing::debug!("Disconnecting from the CTRL-AP");
        self.interface.close()
    }
}

impl DebugProbeLink for ProbeRsLink {
    fn read_register(&mut self, address: u32) -> Result<u32, LinkError> {
        let value = self
            .interface
            .read_raw_ap_register(&self.ctrl_ap, u64::from(address))
            .map_err(LinkError::probe_specific)?;
        tracing::trace!("AP read {:#05x} = {:#010x}", address, value);
        Ok(value)
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), LinkError> {
        tracing::trace!("AP write {:#05x} = {:#010x}", address, value);
        self.interface
            .write_raw_ap_register(&self.ctrl_ap, u64::from(address), value)
            .map_err(LinkError::probe_specific)
    }
}
