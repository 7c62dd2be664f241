use probe_rs::probe::list::Lister;
use sdfw_adac::{
    adac::AdacTransport,
    ssf::{CborValue, SsfClient, SsfService},
};

use crate::util::{common_options::ProbeOptions, config::Config, parse_u16, HexBytes};

/// Send a request to an SSF service and print the decoded response
///
/// The payload is the CBOR encoded service request, without the SSF header.
///
/// e.g. sdfw-adac ssf --service-id 0x69 --service-version 1 8101
#[derive(clap::Parser)]
#[clap(verbatim_doc_comment)]
pub struct Cmd {
    #[clap(flatten)]
    probe_options: ProbeOptions,

    /// Identifier of the service.
    #[arg(long, value_parser = parse_u16)]
    service_id: u16,

    /// Version of the service interface.
    #[arg(long, value_parser = parse_u16)]
    service_version: u16,

    /// The CBOR encoded request as a hex string.
    #[arg(value_name = "HEX")]
    payload: HexBytes,
}

impl Cmd {
    pub fn run(self, lister: &Lister, config: &Config) -> anyhow::Result<()> {
        let service = SsfService::new(self.service_id, self.service_version);
        let options = self.probe_options.load(config)?;

        options.with_adac(lister, |adac| {
            let items = execute(adac, service, &self.payload.0)?;
            for line in format_response(&items) {
                println!("{line}");
            }
            Ok(())
        })
    }
}

fn execute(
    adac: &mut impl AdacTransport,
    service: SsfService,
    payload: &[u8],
) -> Result<Vec<CborValue>, sdfw_adac::Error> {
    SsfClient::new(adac, service).request(payload)
}

/// Render the response array, the status element first.
fn format_response(items: &[CborValue]) -> Vec<String> {
    let mut lines = vec!["Status: SUCCESS".to_string()];
    lines.extend(
        items
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, item)| format!("[{i}] {item}")),
    );
    lines
}
