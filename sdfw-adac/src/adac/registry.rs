//! Static description of the command catalog.
//!
//! Front ends such as the CLI build their argument parsers from [`COMMANDS`] and hand
//! the collected values to [`CommandSpec::build`], which applies the same validation
//! as the typed constructors.

use std::collections::HashMap;

use crate::CommandError;

use super::{
    commands::{Command, LcsGet, LcsSet, MemCfg, MemErase, Purge, Reset, Revert, Ssf, Version},
    Opcode,
};

/// The value type of a command field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    /// An arbitrary byte string.
    Bytes,
}

impl FieldKind {
    /// Largest value of an integer field.
    pub fn max(self) -> Option<u64> {
        match self {
            FieldKind::U8 => Some(u8::MAX.into()),
            FieldKind::U16 => Some(u16::MAX.into()),
            FieldKind::U32 => Some(u32::MAX.into()),
            FieldKind::Bytes => None,
        }
    }
}

/// One field of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: FieldKind,
}

/// A value supplied for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(u64),
    Bytes(Vec<u8>),
}

/// Field values keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues(HashMap<&'static str, FieldValue>);

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of `field`, replacing any earlier value.
    pub fn insert(&mut self, field: &'static str, value: FieldValue) -> &mut Self {
        self.0.insert(field, value);
        self
    }

    fn int(&self, field: &'static str, kind: FieldKind) -> Result<u64, CommandError> {
        match self.0.get(field) {
            Some(FieldValue::Int(value)) => {
                let max = kind.max().unwrap_or(u64::MAX);
                if *value > max {
                    return Err(CommandError::OutOfRange {
                        field,
                        value: *value,
                        max,
                    });
                }
                Ok(*value)
            }
            Some(FieldValue::Bytes(_)) => Err(CommandError::WrongKind {
                field,
                expected: "an integer",
            }),
            None => Err(CommandError::MissingField(field)),
        }
    }

    fn u8(&self, field: &'static str) -> Result<u8, CommandError> {
        // Range checked against the field kind.
        Ok(self.int(field, FieldKind::U8)? as u8)
    }

    fn u16(&self, field: &'static str) -> Result<u16, CommandError> {
        Ok(self.int(field, FieldKind::U16)? as u16)
    }

    fn u32(&self, field: &'static str) -> Result<u32, CommandError> {
        Ok(self.int(field, FieldKind::U32)? as u32)
    }

    fn bytes(&self, field: &'static str) -> Result<Vec<u8>, CommandError> {
        match self.0.get(field) {
            Some(FieldValue::Bytes(bytes)) => Ok(bytes.clone()),
            Some(FieldValue::Int(_)) => Err(CommandError::WrongKind {
                field,
                expected: "a byte string",
            }),
            None => Err(CommandError::MissingField(field)),
        }
    }
}

/// Describes one command: its name, its fields and how to build it.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub about: &'static str,
    pub opcode: Opcode,
    pub fields: &'static [FieldSpec],
    build: fn(&FieldValues) -> Result<Command, CommandError>,
}

impl CommandSpec {
    /// Construct the command from `values`.
    pub fn build(&self, values: &FieldValues) -> Result<Command, CommandError> {
        (self.build)(values)
    }
}

const DOMAIN_ID_U32: FieldSpec = FieldSpec {
    name: "domain-id",
    help: "Local domain identifier",
    kind: FieldKind::U32,
};

/// The complete catalog, in opcode order.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "version",
        about: "Query the ADAC vendor command version for a type",
        opcode: Opcode::Version,
        fields: &[FieldSpec {
            name: "type",
            help: "Type identifier to query",
            kind: FieldKind::U32,
        }],
        build: |values| Ok(Version::new(values.u32("type")?).into()),
    },
    CommandSpec {
        name: "mem-cfg",
        about: "Grant a local domain access to a memory range",
        opcode: Opcode::MemCfg,
        fields: &[
            FieldSpec {
                name: "domain-id",
                help: "Local domain identifier",
                kind: FieldKind::U16,
            },
            FieldSpec {
                name: "address",
                help: "Start address of the range",
                kind: FieldKind::U32,
            },
            FieldSpec {
                name: "length",
                help: "Length of the range in bytes",
                kind: FieldKind::U32,
            },
        ],
        build: |values| {
            Ok(MemCfg::new(
                values.u16("domain-id")?,
                values.u32("address")?,
                values.u32("length")?,
            )?
            .into())
        },
    },
    CommandSpec {
        name: "revert",
        about: "Undo the configuration applied through ADAC",
        opcode: Opcode::Revert,
        fields: &[],
        build: |_| Ok(Revert.into()),
    },
    CommandSpec {
        name: "reset",
        about: "Reset the whole system or a single local domain",
        opcode: Opcode::Reset,
        fields: &[
            FieldSpec {
                name: "domain-id",
                help: "Local domain identifier",
                kind: FieldKind::U8,
            },
            FieldSpec {
                name: "mode",
                help: "Reset mode",
                kind: FieldKind::U8,
            },
        ],
        build: |values| Ok(Reset::new(values.u8("domain-id")?, values.u8("mode")?).into()),
    },
    CommandSpec {
        name: "mem-erase",
        about: "Erase a memory region",
        opcode: Opcode::MemErase,
        fields: &[
            FieldSpec {
                name: "address",
                help: "Start address, aligned to 16 bytes",
                kind: FieldKind::U32,
            },
            FieldSpec {
                name: "num-words",
                help: "Number of 16-byte words to erase",
                kind: FieldKind::U32,
            },
        ],
        build: |values| {
            Ok(MemErase::new(values.u32("address")?, values.u32("num-words")?)?.into())
        },
    },
    CommandSpec {
        name: "lcs-get",
        about: "Read the life-cycle state of a domain",
        opcode: Opcode::LcsGet,
        fields: &[DOMAIN_ID_U32],
        build: |values| Ok(LcsGet::new(values.u32("domain-id")?).into()),
    },
    CommandSpec {
        name: "lcs-set",
        about: "Transition the life-cycle state of a domain",
        opcode: Opcode::LcsSet,
        fields: &[
            DOMAIN_ID_U32,
            FieldSpec {
                name: "current",
                help: "Expected current life-cycle state",
                kind: FieldKind::U32,
            },
            FieldSpec {
                name: "new",
                help: "Requested life-cycle state",
                kind: FieldKind::U32,
            },
        ],
        build: |values| {
            Ok(LcsSet::new(
                values.u32("domain-id")?,
                values.u32("current")?,
                values.u32("new")?,
            )?
            .into())
        },
    },
    CommandSpec {
        name: "ssf",
        about: "Send a raw SSF request",
        opcode: Opcode::Ssf,
        fields: &[FieldSpec {
            name: "payload",
            help: "SSF framed request bytes",
            kind: FieldKind::Bytes,
        }],
        build: |values| Ok(Ssf::new(values.bytes("payload")?)?.into()),
    },
    CommandSpec {
        name: "purge",
        about: "Purge the persisted state of a local domain",
        opcode: Opcode::Purge,
        fields: &[DOMAIN_ID_U32],
        build: |values| Ok(Purge::new(values.u32("domain-id")?).into()),
    },
];

/// Find a command by name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// Find a command by name and build it from `values`.
pub fn build(name: &str, values: &FieldValues) -> Result<Command, CommandError> {
    lookup(name)
        .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?
        .build(values)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::adac::commands::AdacCommand;

    #[test]
    fn registry_covers_every_opcode_once() {
        let opcodes: Vec<Opcode> = COMMANDS.iter().map(|spec| spec.opcode).collect();
        assert_eq!(opcodes, Opcode::ALL);
    }

    #[test]
    fn built_command_matches_its_spec() {
        for spec in COMMANDS {
            let mut values = FieldValues::new();
            for field in spec.fields {
                let value = match (spec.name, field.name, field.kind) {
                    (_, _, FieldKind::Bytes) => FieldValue::Bytes(vec![0x80]),
                    ("lcs-set", "new", _) => FieldValue::Int(2),
                    ("mem-cfg" | "mem-erase", "length" | "num-words", _) => FieldValue::Int(1),
                    _ => FieldValue::Int(0),
                };
                values.insert(field.name, value);
            }

            let command = spec.build(&values).unwrap();
            assert_eq!(command.opcode(), spec.opcode, "{}", spec.name);
        }
    }

    #[test]
    fn build_mem_cfg() {
        let mut values = FieldValues::new();
        values
            .insert("domain-id", FieldValue::Int(1))
            .insert("address", FieldValue::Int(0x2000))
            .insert("length", FieldValue::Int(0x100));

        let command = build("mem-cfg", &values).unwrap();

        assert_eq!(
            command.to_request().unwrap(),
            MemCfg::new(1, 0x2000, 0x100).unwrap().to_request().unwrap()
        );
    }

    #[test]
    fn reset_domain_must_fit_a_byte() {
        let mut values = FieldValues::new();
        values
            .insert("domain-id", FieldValue::Int(0x100))
            .insert("mode", FieldValue::Int(1));

        assert_eq!(
            build("reset", &values).unwrap_err(),
            CommandError::OutOfRange {
                field: "domain-id",
                value: 0x100,
                max: 0xff
            }
        );
    }

    #[test]
    fn missing_and_mistyped_fields() {
        let mut values = FieldValues::new();
        values.insert("domain-id", FieldValue::Bytes(vec![1]));

        assert_eq!(
            build("purge", &values).unwrap_err(),
            CommandError::WrongKind {
                field: "domain-id",
                expected: "an integer"
            }
        );
        assert_eq!(
            build("lcs-get", &FieldValues::new()).unwrap_err(),
            CommandError::MissingField("domain-id")
        );
    }

    #[test]
    fn constructor_rules_apply() {
        let mut values = FieldValues::new();
        values
            .insert("address", FieldValue::Int(0x1001))
            .insert("num-words", FieldValue::Int(1));

        assert_eq!(
            build("mem-erase", &values).unwrap_err(),
            CommandError::UnalignedEraseAddress(0x1001)
        );
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            build("unlock", &FieldValues::new()).unwrap_err(),
            CommandError::UnknownCommand("unlock".to_string())
        );
    }
}
