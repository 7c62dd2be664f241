use std::time::Duration;

use anyhow::Context;
use probe_rs::probe::{
    list::Lister, DebugProbeError, DebugProbeInfo, DebugProbeSelector, Probe, WireProtocol,
};
use sdfw_adac::{
    adac::{Adac, TransactionState},
    mailbox::{MailboxRegisters, PollConfig},
};

use super::{
    config::Config,
    parse_u64, parse_u8,
    probe_link::{ConnectError, ProbeRsLink},
};

/// Common options and logic when interfacing with a [Probe].
///
/// Every option falls back to the configuration if it is not given.
#[derive(clap::Parser, Debug)]
pub struct ProbeOptions {
    /// Use this flag to select a specific probe in the list.
    ///
    /// Use '--probe VID:PID' or '--probe VID:PID:Serial' if you have more than one
    /// probe with the same VID:PID.
    #[arg(long, help_heading = "PROBE CONFIGURATION")]
    pub probe: Option<DebugProbeSelector>,

    /// Protocol used to connect to chip. Possible options: [swd, jtag]
    #[arg(long, help_heading = "PROBE CONFIGURATION")]
    pub protocol: Option<WireProtocol>,

    /// The protocol speed in kHz.
    #[arg(long, help_heading = "PROBE CONFIGURATION")]
    pub speed: Option<u32>,

    /// Index of the CTRL-AP on the default debug port.
    #[arg(long, value_parser = parse_u8, help_heading = "MAILBOX CONFIGURATION")]
    pub ctrl_ap: Option<u8>,

    /// How long a single mailbox wait may take, in milliseconds.
    #[arg(long, value_parser = parse_u64, help_heading = "MAILBOX CONFIGURATION")]
    pub timeout_ms: Option<u64>,

    /// Pause between two reads of a mailbox status register, in milliseconds.
    #[arg(long, value_parser = parse_u64, help_heading = "MAILBOX CONFIGURATION")]
    pub poll_interval_ms: Option<u64>,
}

impl ProbeOptions {
    /// Resolve the options against `config`.
    pub fn load(self, config: &Config) -> anyhow::Result<LoadedProbeOptions> {
        let probe = match self.probe {
            Some(selector) => Some(selector),
            None => config
                .probe
                .selector
                .as_deref()
                .map(str::parse::<DebugProbeSelector>)
                .transpose()
                .context("Invalid probe selector in the configuration.")?,
        };

        let mailbox = &config.mailbox;
        let poll = mailbox.poll_config();
        Ok(LoadedProbeOptions {
            probe,
            protocol: self.protocol.or(config.probe.protocol),
            speed: self.speed.or(config.probe.speed),
            ctrl_ap: self.ctrl_ap.unwrap_or(mailbox.ctrl_ap),
            registers: mailbox.registers.into(),
            poll: PollConfig {
                timeout: self.timeout_ms.map_or(poll.timeout, Duration::from_millis),
                poll_interval: self
                    .poll_interval_ms
                    .map_or(poll.poll_interval, Duration::from_millis),
            },
        })
    }
}

/// Probe options merged with the configuration.
#[derive(Debug)]
pub struct LoadedProbeOptions {
    pub probe: Option<DebugProbeSelector>,
    pub protocol: Option<WireProtocol>,
    pub speed: Option<u32>,
    pub ctrl_ap: u8,
    pub registers: MailboxRegisters,
    pub poll: PollConfig,
}

impl LoadedProbeOptions {
    /// Selects a probe from a list of probes.
    /// If there is only one probe, it will be selected automatically.
    fn select_probe(lister: &Lister) -> Result<Probe, OperationError> {
        let list = lister.list_all();
        let selected = match list.len() {
            0 | 1 => list.first().ok_or(OperationError::NoProbesFound),
            _ => Err(OperationError::MultipleProbesFound { list }),
        };

        selected.and_then(|probe_info| Ok(lister.open(probe_info)?))
    }

    /// Opens the specified probe and configures it.
    pub fn attach_probe(&self, lister: &Lister) -> Result<Probe, OperationError> {
        // If we got a probe selector as an argument, open the probe
        // matching the selector if possible.
        let mut probe = match &self.probe {
            Some(selector) => lister.open(selector)?,
            None => Self::select_probe(lister)?,
        };

        if let Some(protocol) = self.protocol {
            probe.select_protocol(protocol).map_err(|error| {
                OperationError::FailedToSelectProtocol {
                    source: error,
                    protocol,
                }
            })?;
        }

        if let Some(speed) = self.speed {
            let _actual_speed = probe.set_speed(speed).map_err(|error| {
                OperationError::FailedToSelectProtocolSpeed {
                    source: error,
                    speed,
                }
            })?;

            // Warn the user if they specified a speed the debug probe does not support
            // and a fitting speed was automatically selected.
            let protocol_speed = probe.speed_khz();
            if protocol_speed < speed {
                tracing::warn!(
                    "Unable to use specified speed of {} kHz, actual speed used is {} kHz",
                    speed,
                    protocol_speed
                );
            }

            tracing::info!("Protocol speed {} kHz", protocol_speed);
        }

        Ok(probe)
    }

    /// Opens the probe and the CTRL-AP mailbox.
    pub fn connect(&self, lister: &Lister) -> Result<Adac<ProbeRsLink>, OperationError> {
        let probe = self.attach_probe(lister)?;
        let link = ProbeRsLink::connect(probe, self.ctrl_ap)?;

        Ok(Adac::new(link, self.registers, self.poll))
    }

    /// Connects, runs `f` and disconnects again, also when `f` fails.
    pub fn with_adac<T>(
        &self,
        lister: &Lister,
        f: impl FnOnce(&mut Adac<ProbeRsLink>) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut adac = self.connect(lister)?;

        let result = f(&mut adac);

        if adac.state() != TransactionState::Idle {
            tracing::warn!(
                "The transaction was aborted in {:?}, the mailbox is left in an undefined state",
                adac.state()
            );
        }
        drop(adac.into_link().disconnect());

        result
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("No connected probes were found.")]
    NoProbesFound,

    #[error("Failed to open the debug probe.")]
    FailedToOpenProbe(#[from] DebugProbeError),

    #[error("{} probes were found, select one with --probe: {}", .list.len(), print_list(.list))]
    MultipleProbesFound { list: Vec<DebugProbeInfo> },

    #[error("The protocol '{protocol}' could not be selected.")]
    FailedToSelectProtocol {
        source: DebugProbeError,
        protocol: WireProtocol,
    },

    #[error("The protocol speed could not be set to '{speed}' kHz.")]
    FailedToSelectProtocolSpeed { source: DebugProbeError, speed: u32 },

    #[error("Connecting to the CTRL-AP was unsuccessful.")]
    Connect(#[from] ConnectError),
}

/// Used in errors it can print a list of items.
fn print_list(list: &[impl std::fmt::Display]) -> String {
    let mut output = String::new();

    for (i, entry) in list.iter().enumerate() {
        output.push_str(&format!("\n    {}. {}", i + 1, entry));
    }

    output
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use figment::{
        providers::{Format, Toml},
        Figment,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(clap::Parser)]
    struct Options {
        #[clap(flatten)]
        probe_options: ProbeOptions,
    }

    fn load(args: &[&str]) -> LoadedProbeOptions {
        load_with(Config::extract(Figment::new()).unwrap(), args)
    }

    fn load_with(config: Config, args: &[&str]) -> LoadedProbeOptions {
        Options::parse_from(std::iter::once("test").chain(args.iter().copied()))
            .probe_options
            .load(&config)
            .unwrap()
    }

    #[test]
    fn falls_back_to_config() {
        let options = load(&[]);

        assert_eq!(options.ctrl_ap, 2);
        assert_eq!(options.registers, MailboxRegisters::default());
        assert_eq!(options.poll, PollConfig::default());
    }

    #[test]
    fn flags_override_config() {
        let options = load(&[
            "--ctrl-ap",
            "0x3",
            "--timeout-ms",
            "250",
            "--poll-interval-ms",
            "5",
            "--protocol",
            "swd",
        ]);

        assert_eq!(options.ctrl_ap, 3);
        assert_eq!(options.protocol, Some(WireProtocol::Swd));
        assert_eq!(
            options.poll,
            PollConfig {
                timeout: Duration::from_millis(250),
                poll_interval: Duration::from_millis(5),
            }
        );
    }

    #[test]
    fn config_values_are_used_without_flags() {
        let config = Config::extract(Toml::string(
            r#"
            [probe]
            selector = "1366:1061"
            speed = 1000

            [mailbox]
            ctrl_ap = 4
            timeout_ms = 100
            "#,
        ))
        .unwrap();

        let options = load_with(config, &["--speed", "4000"]);

        assert_eq!(options.probe, Some("1366:1061".parse().unwrap()));
        assert_eq!(options.speed, Some(4000));
        assert_eq!(options.ctrl_ap, 4);
        assert_eq!(options.poll.timeout, Duration::from_millis(100));
    }
}
