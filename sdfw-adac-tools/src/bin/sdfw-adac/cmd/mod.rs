pub mod adac;
pub mod list;
pub mod raw;
pub mod ssf;

/// Upper-case hex without separators, as typed on the command line.
fn to_hex(data: &[u8]) -> String {
    hex::encode_upper(data)
}
