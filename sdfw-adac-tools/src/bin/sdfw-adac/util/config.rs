use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use figment::{
    providers::{Env, Format, Toml},
    Figment, Provider,
};
use probe_rs::probe::WireProtocol;
use sdfw_adac::mailbox::{MailboxRegisters, PollConfig};
use serde::Deserialize;

use super::logging::LevelFilter;

/// Configuration file looked up in the working directory if `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "sdfw-adac.toml";

/// Prefix of environment variables overriding the configuration.
///
/// Nested keys are separated by a double underscore, e.g. `SDFW_ADAC_MAILBOX__CTRL_AP=3`.
pub const ENV_PREFIX: &str = "SDFW_ADAC_";

/// The main struct holding all the possible config options.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub log_level: Option<LevelFilter>,
    pub probe: Probe,
    pub mailbox: Mailbox,
}

/// Which probe to open and how to talk to it.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Probe {
    /// `VID:PID` or `VID:PID:Serial`.
    pub selector: Option<String>,
    pub protocol: Option<WireProtocol>,
    /// Protocol speed in kHz.
    pub speed: Option<u32>,
}

/// Location and timing of the CTRL-AP mailbox.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mailbox {
    pub ctrl_ap: u8,
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub registers: Registers,
}

impl Mailbox {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Register offsets within the CTRL-AP.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Registers {
    pub ready: u32,
    pub txdata: u32,
    pub txstatus: u32,
    pub rxdata: u32,
    pub rxstatus: u32,
}

impl From<Registers> for MailboxRegisters {
    fn from(registers: Registers) -> Self {
        MailboxRegisters {
            ready: registers.ready,
            txdata: registers.txdata,
            txstatus: registers.txstatus,
            rxdata: registers.rxdata,
            rxstatus: registers.rxstatus,
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// The built-in defaults are overridden by the configuration file, which is in turn
    /// overridden by `SDFW_ADAC_*` environment variables. A file given explicitly has to
    /// exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => {
                anyhow::ensure!(
                    path.is_file(),
                    "The configuration file '{}' does not exist.",
                    path.display()
                );
                path.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        Self::extract(
            Figment::new()
                .merge(Toml::file(file))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Merge `overrides` over the built-in defaults.
    pub(crate) fn extract(overrides: impl Provider) -> anyhow::Result<Self> {
        Figment::new()
            .merge(Toml::string(include_str!("default.toml")))
            .merge(overrides)
            .extract()
            .context("Failed to parse the configuration.")
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_the_library() {
        let config = Config::extract(Figment::new()).unwrap();

        assert_eq!(config.log_level, None);
        assert_eq!(config.probe.selector, None);
        assert_eq!(config.mailbox.ctrl_ap, 2);
        assert_eq!(
            MailboxRegisters::from(config.mailbox.registers),
            MailboxRegisters::default()
        );
        assert_eq!(config.mailbox.poll_config(), PollConfig::default());
    }

    #[test]
    fn nested_values_are_merged() {
        let config = Config::extract(Toml::string(
            r#"
            log_level = "DEBUG"

            [probe]
            protocol = "Jtag"
            speed = 1000

            [mailbox]
            ctrl_ap = 3

            [mailbox.registers]
            ready = 0x100
            "#,
        ))
        .unwrap();

        assert_eq!(config.log_level, Some(LevelFilter::Debug));
        assert_eq!(config.probe.protocol, Some(WireProtocol::Jtag));
        assert_eq!(config.probe.speed, Some(1000));
        assert_eq!(config.mailbox.ctrl_ap, 3);
        assert_eq!(config.mailbox.timeout_ms, 5000);
        assert_eq!(config.mailbox.registers.ready, 0x100);
        assert_eq!(config.mailbox.registers.rxstatus, 0x024);
    }

    #[test]
    fn unknown_config_items_fail() {
        Config::extract(Toml::string("[mailbox]\nctrl_aps = 3")).unwrap_err();
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        Config::load(Some(Path::new("does-not-exist/sdfw-adac.toml"))).unwrap_err();
    }
}
