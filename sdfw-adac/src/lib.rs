//! # sdfw-adac
//!
//! Host-side protocol stack for controlling the Secure Domain Firmware (SDFW) of a
//! target SoC through its CTRL-AP mailbox. Nothing runs on the target except the
//! firmware itself; every exchange is driven from the host through a debug probe.
//!
//! The stack has three layers:
//!
//! - [`mailbox::Mailbox`] moves single 32-bit words through the READY/TX/RX status
//!   register handshake.
//! - [`adac::Adac`] frames a command and its payload into words, sends them and
//!   collects the response.
//! - [`ssf::SsfClient`] carries CBOR encoded service requests inside the `Ssf` ADAC
//!   command.
//!
//! The probe itself is abstracted by [`DebugProbeLink`]. This crate does not open
//! probes; a link implementation is provided by the caller.
//!
//! ```no_run
//! use sdfw_adac::{adac::{Adac, AdacTransport, commands::LcsGet}, mailbox::PollConfig};
//! # fn link() -> Box<dyn sdfw_adac::DebugProbeLink> { unimplemented!() }
//!
//! let mut adac = Adac::new(link(), Default::default(), PollConfig::default());
//! let lcs = adac.execute(&LcsGet::new(2))?;
//! println!("life cycle state: {lcs:#x}");
//! # Ok::<(), sdfw_adac::Error>(())
//! ```

pub mod adac;
pub mod clock;
mod error;
pub mod mailbox;
pub mod probe;
pub mod ssf;

pub use crate::error::{CommandError, DecodeError, Error};
pub use crate::probe::{DebugProbeLink, LinkError};

/// Size of a mailbox word in bytes.
pub const WORD_SIZE: usize = 4;
