use clap::{error::ErrorKind, Arg, ArgMatches, FromArgMatches};
use probe_rs::probe::list::Lister;
use sdfw_adac::adac::{
    commands::{Command, CommandOutput},
    registry::{self, CommandSpec, FieldKind, FieldSpec, FieldValue, FieldValues},
    AdacTransport,
};

use crate::util::{common_options::ProbeOptions, config::Config, parse_u64, HexBytes};

use super::to_hex;

/// Send one ADAC vendor command and print its result
///
/// e.g. sdfw-adac adac lcs-get --domain-id 2
///      Reads the life-cycle state of domain 2
#[derive(clap::Parser)]
#[clap(verbatim_doc_comment)]
pub struct Cmd {
    #[clap(flatten)]
    probe_options: ProbeOptions,

    #[clap(subcommand)]
    command: RegistryCommand,
}

impl Cmd {
    pub fn run(self, lister: &Lister, config: &Config) -> anyhow::Result<()> {
        // Reject invalid fields before touching the probe.
        let command = self.command.build()?;
        let options = self.probe_options.load(config)?;

        options.with_adac(lister, |adac| {
            let output = execute(adac, &command)?;
            println!("{}", format_output(&output));
            Ok(())
        })
    }
}

fn execute(
    adac: &mut impl AdacTransport,
    command: &Command,
) -> Result<CommandOutput, sdfw_adac::Error> {
    tracing::info!("Running {:?}", command.opcode());
    adac.run(command)
}

fn format_output(output: &CommandOutput) -> String {
    match output {
        CommandOutput::Done => "OK".to_string(),
        CommandOutput::Value(value) => format!("{value:#010x}"),
        CommandOutput::Data(data) if data.is_empty() => "OK (no data)".to_string(),
        CommandOutput::Data(data) => to_hex(data),
    }
}

/// A command of the static registry together with the values given for its fields.
///
/// The subcommands are generated from [`registry::COMMANDS`], one `--<field>` option
/// per field.
#[derive(Debug, Clone)]
pub struct RegistryCommand {
    spec: &'static CommandSpec,
    values: FieldValues,
}

impl RegistryCommand {
    pub fn build(&self) -> Result<Command, sdfw_adac::CommandError> {
        self.spec.build(&self.values)
    }

    fn subcommand(spec: &'static CommandSpec) -> clap::Command {
        spec.fields
            .iter()
            .fold(clap::Command::new(spec.name).about(spec.about), |cmd, field| {
                cmd.arg(Self::field_arg(field))
            })
    }

    fn field_arg(field: &'static FieldSpec) -> Arg {
        let arg = Arg::new(field.name)
            .long(field.name)
            .help(field.help)
            .required(true);

        match field.kind {
            FieldKind::Bytes => arg
                .value_name("HEX")
                .value_parser(clap::value_parser!(HexBytes)),
            FieldKind::U8 | FieldKind::U16 | FieldKind::U32 => arg.value_parser(parse_u64),
        }
    }
}

impl FromArgMatches for RegistryCommand {
    fn from_arg_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let Some((name, matches)) = matches.subcommand() else {
            return Err(clap::Error::raw(
                ErrorKind::MissingSubcommand,
                "An ADAC command is required.",
            ));
        };

        let spec = registry::lookup(name).ok_or_else(|| {
            clap::Error::raw(
                ErrorKind::InvalidSubcommand,
                format!("Unknown ADAC command '{name}'."),
            )
        })?;

        let mut values = FieldValues::new();
        for field in spec.fields {
            let value = match field.kind {
                FieldKind::Bytes => matches
                    .get_one::<HexBytes>(field.name)
                    .map(|bytes| FieldValue::Bytes(bytes.0.clone())),
                FieldKind::U8 | FieldKind::U16 | FieldKind::U32 => matches
                    .get_one::<u64>(field.name)
                    .map(|value| FieldValue::Int(*value)),
            };

            if let Some(value) = value {
                values.insert(field.name, value);
            }
        }

        Ok(Self { spec, values })
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> Result<(), clap::Error> {
        *self = Self::from_arg_matches(matches)?;
        Ok(())
    }
}

impl clap::Subcommand for RegistryCommand {
    fn augment_subcommands(cmd: clap::Command) -> clap::Command {
        registry::COMMANDS
            .iter()
            .fold(cmd, |cmd, spec| cmd.subcommand(Self::subcommand(spec)))
    }

    fn augment_subcommands_for_update(cmd: clap::Command) -> clap::Command {
        Self::augment_subcommands(cmd)
    }

    fn has_subcommand(name: &str) -> bool {
        registry::lookup(name).is_some()
    }
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use sdfw_adac::{
        adac::{AdacResponse, AdacStatus, Opcode},
        probe::{FakeTarget, FakeTargetConfig},
        CommandError, Error,
    };
    use test_case::test_case;

    use super::*;
    use crate::cmd::test_support;

    fn parse(args: &[&str]) -> Result<Cmd, clap::Error> {
        Cmd::try_parse_from(std::iter::once("adac").chain(args.iter().copied()))
    }

    #[test]
    fn every_registry_command_is_a_subcommand() {
        let cmd = <Cmd as clap::CommandFactory>::command();

        for spec in registry::COMMANDS {
            let sub = cmd.find_subcommand(spec.name).unwrap();
            for field in spec.fields {
                let arg = sub
                    .get_arguments()
                    .find(|arg| arg.get_id() == field.name)
                    .unwrap();
                assert_eq!(arg.get_long(), Some(field.name));
            }
        }
    }

    #[test]
    fn fields_are_parsed_in_any_base() {
        let cmd = parse(&[
            "mem-cfg",
            "--domain-id",
            "2",
            "--address",
            "0x20000000",
            "--length",
            "0b1000",
        ]);

        let command = cmd.unwrap().command.build().unwrap();
        assert_eq!(command.opcode(), Opcode::MemCfg);
        assert_eq!(
            command.to_request().unwrap().data(),
            &[2, 0, 0, 0, 0x00, 0x00, 0x00, 0x20, 8, 0, 0, 0]
        );
    }

    #[test]
    fn payload_is_hex() {
        let command = parse(&["ssf", "--payload", "0x8318a5"])
            .unwrap()
            .command
            .build()
            .unwrap();

        assert_eq!(command.to_request().unwrap().data(), &[0x83, 0x18, 0xa5]);
    }

    #[test]
    fn missing_field_is_rejected_by_the_parser() {
        let error = parse(&["lcs-set", "--domain-id", "1", "--current", "2"])
            .err()
            .unwrap();
        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn unknown_command_is_rejected_by_the_parser() {
        assert!(parse(&["lcs-reset"]).is_err());
    }

    #[test]
    fn out_of_range_field_fails_to_build() {
        let cmd = parse(&["reset", "--domain-id", "0x100", "--mode", "0"]).unwrap();

        assert_eq!(
            cmd.command.build(),
            Err(CommandError::OutOfRange {
                field: "domain-id",
                value: 0x100,
                max: 0xff,
            })
        );
    }

    #[test]
    fn lcs_get_prints_the_state() {
        let target = FakeTarget::new(FakeTargetConfig::default()).on_request(|request| {
            assert_eq!(request.command(), Opcode::LcsGet);
            AdacResponse::new(AdacStatus::Success, 0x3000_0000u32.to_le_bytes().to_vec())
        });
        let mut adac = test_support::adac(target);

        let command = parse(&["lcs-get", "--domain-id", "2"])
            .unwrap()
            .command
            .build()
            .unwrap();
        let output = execute(&mut adac, &command).unwrap();

        assert_eq!(format_output(&output), "0x30000000");
        assert_eq!(adac.into_link().requests()[0].data(), &[2, 0, 0, 0]);
    }

    #[test]
    fn failure_status_is_an_error() {
        let target = FakeTarget::new(FakeTargetConfig::default())
            .on_request(|_| AdacResponse::new(AdacStatus::Unsupported, vec![]));
        let mut adac = test_support::adac(target);

        let command = parse(&["revert"]).unwrap().command.build().unwrap();

        assert!(matches!(
            execute(&mut adac, &command),
            Err(Error::AdacFailure(AdacStatus::Unsupported))
        ));
    }

    #[test_case(CommandOutput::Done, "OK")]
    #[test_case(CommandOutput::Value(0x102), "0x00000102")]
    #[test_case(CommandOutput::Data(vec![]), "OK (no data)")]
    #[test_case(CommandOutput::Data(vec![0x81, 0x00, 0xab, 0xcd]), "8100ABCD")]
    fn output_formatting(output: CommandOutput, expected: &str) {
        assert_eq!(format_output(&output), expected);
    }
}
