use std::fmt;

use minicbor::{
    data::{Int, Type},
    decode,
    encode::{self, Write},
    Decode, Decoder, Encode, Encoder,
};

/// A decoded CBOR data item.
///
/// SSF responses are arrays whose shape depends on the service, so they are decoded
/// into this generic tree instead of a fixed struct. Tags are dropped while decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    Integer(i128),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<CborValue>),
    Map(Vec<(CborValue, CborValue)>),
    Bool(bool),
    Null,
    Undefined,
    Float(f64),
    Simple(u8),
}

impl CborValue {
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            CborValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CborValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[CborValue]> {
        match self {
            CborValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Deepest nesting of arrays and maps accepted while decoding.
pub const MAX_DEPTH: usize = 32;

/// Decoding context counting the containers entered so far.
struct Depth(usize);

/// An item below the top level, decoded with the depth of its parent.
struct Nested(CborValue);

impl<'b> Decode<'b, Depth> for Nested {
    fn decode(d: &mut Decoder<'b>, depth: &mut Depth) -> Result<Self, decode::Error> {
        decode_item(d, depth).map(Nested)
    }
}

impl<'b, C> Decode<'b, C> for CborValue {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        decode_item(d, &mut Depth(0))
    }
}

fn decode_item(d: &mut Decoder<'_>, depth: &mut Depth) -> Result<CborValue, decode::Error> {
    while d.datatype()? == Type::Tag {
        let tag = d.tag()?;
        tracing::trace!("Ignoring CBOR tag {:?}", tag);
    }

    let value = match d.datatype()? {
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => CborValue::Integer(d.u64()?.into()),
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => CborValue::Integer(d.i64()?.into()),
        Type::Int => CborValue::Integer(i128::from(d.int()?)),
        Type::Bytes | Type::BytesIndef => {
            let mut bytes = Vec::new();
            for chunk in d.bytes_iter()? {
                bytes.extend_from_slice(chunk?);
            }
            CborValue::Bytes(bytes)
        }
        Type::String | Type::StringIndef => {
            let mut text = String::new();
            for chunk in d.str_iter()? {
                text.push_str(chunk?);
            }
            CborValue::Text(text)
        }
        Type::Array | Type::ArrayIndef => {
            depth.enter()?;
            let items = d
                .array_iter_with::<Depth, Nested>(depth)?
                .map(|item| item.map(|Nested(value)| value))
                .collect::<Result<_, _>>()?;
            depth.leave();
            CborValue::Array(items)
        }
        Type::Map | Type::MapIndef => {
            depth.enter()?;
            let entries = d
                .map_iter_with::<Depth, Nested, Nested>(depth)?
                .map(|entry| entry.map(|(Nested(key), Nested(value))| (key, value)))
                .collect::<Result<_, _>>()?;
            depth.leave();
            CborValue::Map(entries)
        }
        Type::Bool => CborValue::Bool(d.bool()?),
        Type::Null => {
            d.null()?;
            CborValue::Null
        }
        Type::Undefined => {
            d.undefined()?;
            CborValue::Undefined
        }
        Type::F16 => CborValue::Float(d.f16()?.into()),
        Type::F32 => CborValue::Float(d.f32()?.into()),
        Type::F64 => CborValue::Float(d.f64()?),
        Type::Simple => CborValue::Simple(d.simple()?),
        other => return Err(decode::Error::type_mismatch(other)),
    };

    Ok(value)
}

impl Depth {
    fn enter(&mut self) -> Result<(), decode::Error> {
        if self.0 == MAX_DEPTH {
            return Err(decode::Error::message(format!(
                "CBOR nesting exceeds {MAX_DEPTH} levels"
            )));
        }
        self.0 += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.0 -= 1;
    }
}

impl<C> Encode<C> for CborValue {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            CborValue::Integer(value) => {
                let value = Int::try_from(*value)
                    .map_err(|_| encode::Error::message("integer out of CBOR range"))?;
                e.int(value)?;
            }
            CborValue::Bytes(bytes) => {
                e.bytes(bytes)?;
            }
            CborValue::Text(text) => {
                e.str(text)?;
            }
            CborValue::Array(items) => {
                e.array(items.len() as u64)?;
                for item in items {
                    item.encode(e, ctx)?;
                }
            }
            CborValue::Map(entries) => {
                e.map(entries.len() as u64)?;
                for (key, value) in entries {
                    key.encode(e, ctx)?;
                    value.encode(e, ctx)?;
                }
            }
            CborValue::Bool(value) => {
                e.bool(*value)?;
            }
            CborValue::Null => {
                e.null()?;
            }
            CborValue::Undefined => {
                e.undefined()?;
            }
            CborValue::Float(value) => {
                e.f64(*value)?;
            }
            CborValue::Simple(value) => {
                e.simple(*value)?;
            }
        }
        Ok(())
    }
}

/// Renders the value in CBOR diagnostic notation.
impl fmt::Display for CborValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CborValue::Integer(value) => write!(f, "{value}"),
            CborValue::Bytes(bytes) => {
                f.write_str("h'")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
            CborValue::Text(text) => write!(f, "{text:?}"),
            CborValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            CborValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            CborValue::Bool(value) => write!(f, "{value}"),
            CborValue::Null => f.write_str("null"),
            CborValue::Undefined => f.write_str("undefined"),
            CborValue::Float(value) => write!(f, "{value:?}"),
            CborValue::Simple(value) => write!(f, "simple({value})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn decode(bytes: &[u8]) -> CborValue {
        minicbor::decode(bytes).unwrap()
    }

    #[test_case(&[0x00], 0; "zero")]
    #[test_case(&[0x17], 23; "largest immediate")]
    #[test_case(&[0x18, 0xa5], 165; "one byte")]
    #[test_case(&[0x20], -1; "minus one")]
    #[test_case(&[0x35], -22; "negative errno")]
    #[test_case(&[0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff], u64::MAX as i128; "u64 max")]
    #[test_case(&[0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff], -(1i128 << 64); "smallest negative")]
    fn integers(bytes: &[u8], expected: i128) {
        assert_eq!(decode(bytes), CborValue::Integer(expected));
    }

    #[test]
    fn indefinite_containers() {
        // [_ 1, (_ h'0102', h'03'), {_ "a": true}]
        let bytes = [
            0x9f, 0x01, 0x5f, 0x42, 0x01, 0x02, 0x41, 0x03, 0xff, 0xbf, 0x61, 0x61, 0xf5, 0xff,
            0xff,
        ];

        assert_eq!(
            decode(&bytes),
            CborValue::Array(vec![
                CborValue::Integer(1),
                CborValue::Bytes(vec![1, 2, 3]),
                CborValue::Map(vec![(CborValue::Text("a".into()), CborValue::Bool(true))]),
            ])
        );
    }

    #[test]
    fn tags_are_unwrapped() {
        // 24(h'00')
        assert_eq!(decode(&[0xd8, 0x18, 0x41, 0x00]), CborValue::Bytes(vec![0]));
    }

    #[test]
    fn simple_values() {
        assert_eq!(
            decode(&[0x84, 0xf4, 0xf6, 0xf7, 0xf0]),
            CborValue::Array(vec![
                CborValue::Bool(false),
                CborValue::Null,
                CborValue::Undefined,
                CborValue::Simple(16),
            ])
        );
    }

    #[test]
    fn encodes_preferred_form() {
        let value = CborValue::Array(vec![
            CborValue::Integer(165),
            CborValue::Integer(-1),
            CborValue::Text("x".into()),
        ]);

        assert_eq!(
            minicbor::to_vec(&value).unwrap(),
            [0x83, 0x18, 0xa5, 0x20, 0x61, 0x78]
        );
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert!(minicbor::decode::<CborValue>(&[0x82, 0x01]).is_err());
    }

    #[test]
    fn diagnostic_notation() {
        let value = CborValue::Array(vec![
            CborValue::Integer(-22),
            CborValue::Bytes(vec![0xde, 0xad]),
            CborValue::Map(vec![(CborValue::Integer(1), CborValue::Text("ok".into()))]),
        ]);

        assert_eq!(value.to_string(), r#"[-22, h'dead', {1: "ok"}]"#);
    }
}
