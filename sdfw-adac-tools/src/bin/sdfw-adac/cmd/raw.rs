use probe_rs::probe::list::Lister;
use sdfw_adac::{
    adac::{AdacRequest, AdacResponse, AdacTransport, Opcode},
    CommandError,
};

use crate::util::{common_options::ProbeOptions, config::Config, parse_u16, HexBytes};

use super::to_hex;

/// Send an ADAC request with an arbitrary payload
///
/// The response is printed as is, whatever its status. Meant for diagnostics.
///
/// e.g. sdfw-adac raw --opcode 0xA305 02000000
#[derive(clap::Parser)]
#[clap(verbatim_doc_comment)]
pub struct Cmd {
    #[clap(flatten)]
    probe_options: ProbeOptions,

    /// The command opcode, 0xA300 to 0xA308.
    #[arg(long, value_parser = parse_u16)]
    opcode: u16,

    /// The command payload as a hex string.
    #[arg(value_name = "HEX")]
    payload: Option<HexBytes>,
}

impl Cmd {
    pub fn run(self, lister: &Lister, config: &Config) -> anyhow::Result<()> {
        let request = self.request()?;
        let options = self.probe_options.load(config)?;

        options.with_adac(lister, |adac| {
            let response = adac.request(&request)?;
            for line in format_response(&response) {
                println!("{line}");
            }
            Ok(())
        })
    }

    fn request(&self) -> Result<AdacRequest, CommandError> {
        let opcode = Opcode::try_from(self.opcode)
            .map_err(|_| CommandError::OpcodeOutOfRange(self.opcode))?;
        let payload = self.payload.clone().unwrap_or_default();

        AdacRequest::new(opcode, payload.0)
    }
}

fn format_response(response: &AdacResponse) -> Vec<String> {
    vec![
        format!("Status: {}", response.status),
        format!("Data ({} bytes): {}", response.data.len(), to_hex(&response.data)),
    ]
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use sdfw_adac::{
        adac::AdacStatus,
        probe::{FakeTarget, FakeTargetConfig},
    };

    use super::*;
    use crate::cmd::test_support;

    fn parse(args: &[&str]) -> Cmd {
        Cmd::try_parse_from(std::iter::once("raw").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn opcode_outside_the_range_is_rejected() {
        let cmd = parse(&["--opcode", "0xA309"]);

        assert_eq!(cmd.request(), Err(CommandError::OpcodeOutOfRange(0xA309)));
    }

    #[test]
    fn payload_is_optional() {
        let request = parse(&["--opcode", "0xA302"]).request().unwrap();

        assert_eq!(request.command(), Opcode::Revert);
        assert!(request.data().is_empty());
    }

    #[test]
    fn failures_are_printed_not_raised() {
        let target = FakeTarget::new(FakeTargetConfig::default())
            .on_request(|_| AdacResponse::new(AdacStatus::Failure, vec![0xee]));
        let mut adac = test_support::adac(target);

        let request = parse(&["--opcode", "0xA305", "02000000"]).request().unwrap();
        let response = adac.request(&request).unwrap();

        assert_eq!(
            format_response(&response),
            vec!["Status: FAILURE", "Data (4 bytes): EE000000"]
        );
        assert_eq!(adac.into_link().requests(), &[request]);
    }
}
