//! Wire-level access to compiled descriptors.
//!
//! Decoding a `FileDescriptorSet` with `prost` alone would lose the exact bytes
//! each file had in the compiler output, and `prost-types` drops every field it
//! has no declaration for, custom options included. Walking the wire encoding
//! keeps both: the raw slice (for the byte digest) and the extension fields of
//! each `*Options` message (for the structural hash).

use crate::records::CustomOption;
use crate::SchemaError;
use prost::Message;
use prost_types::FileDescriptorProto;

/// `FileDescriptorSet.file` field number.
const FILE_FIELD: u32 = 1;

const WIRE_VARINT: u32 = 0;
const WIRE_FIXED64: u32 = 1;
const WIRE_LEN: u32 = 2;
const WIRE_START_GROUP: u32 = 3;
const WIRE_END_GROUP: u32 = 4;
const WIRE_FIXED32: u32 = 5;

/// Start of the extension range declared by every `*Options` message.
const FIRST_EXTENSION: u32 = 1000;

/// One file from a descriptor set: its exact bytes and its decoded tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDescriptor {
    pub bytes: Vec<u8>,
    pub file: FileDescriptorProto,
    /// Extension options found in `bytes`, in wire order.
    pub custom_options: Vec<CustomOption>,
}

impl RawDescriptor {
    /// Wrap an already-decoded descriptor, using its `prost` encoding as the
    /// bytes. Such a descriptor has no custom options.
    pub fn from_file(file: FileDescriptorProto) -> Self {
        Self {
            bytes: file.encode_to_vec(),
            file,
            custom_options: Vec::new(),
        }
    }

    pub fn decode(bytes: Vec<u8>) -> Result<Self, SchemaError> {
        let file = FileDescriptorProto::decode(bytes.as_slice())?;
        let custom_options = custom_options(&bytes)?;
        Ok(Self {
            bytes,
            file,
            custom_options,
        })
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }
}

/// Split a serialized `FileDescriptorSet` into its files, in wire order.
pub fn split_descriptor_set(data: &[u8]) -> Result<Vec<RawDescriptor>, SchemaError> {
    wire_fields(data)?
        .into_iter()
        .filter(|f| f.number == FILE_FIELD && f.wire_type == WIRE_LEN)
        .map(|f| RawDescriptor::decode(f.value.to_vec()))
        .collect()
}

/// Extension fields set on the `*Options` messages of one serialized
/// `FileDescriptorProto`, in wire order.
pub fn custom_options(file: &[u8]) -> Result<Vec<CustomOption>, SchemaError> {
    let mut walker = OptionWalker::default();
    walker.file(file)?;
    Ok(walker.found)
}

/// A field as it appears on the wire. `value` excludes the key and, for
/// length-delimited fields, the length prefix.
struct WireField<'a> {
    number: u32,
    wire_type: u32,
    value: &'a [u8],
}

fn malformed(reason: String) -> SchemaError {
    SchemaError::MalformedDescriptorSet(reason)
}

fn wire_fields(data: &[u8]) -> Result<Vec<WireField<'_>>, SchemaError> {
    let mut buf = data;
    let mut fields = Vec::new();
    while !buf.is_empty() {
        let field = next_field(&mut buf)?;
        if field.wire_type == WIRE_END_GROUP {
            return Err(malformed(format!("unmatched end of group {}", field.number)));
        }
        fields.push(field);
    }
    Ok(fields)
}

fn next_field<'a>(buf: &mut &'a [u8]) -> Result<WireField<'a>, SchemaError> {
    let key = prost::encoding::decode_varint(buf)?;
    let number = u32::try_from(key >> 3)
        .map_err(|_| malformed(format!("field number {} out of range", key >> 3)))?;
    let wire_type = (key & 0x7) as u32;
    let start: &'a [u8] = *buf;

    let value = match wire_type {
        WIRE_VARINT => {
            prost::encoding::decode_varint(buf)?;
            consumed(start, *buf)
        }
        WIRE_FIXED64 => take(buf, 8, number)?,
        WIRE_FIXED32 => take(buf, 4, number)?,
        WIRE_LEN => {
            let len = usize::try_from(prost::encoding::decode_varint(buf)?)
                .map_err(|_| malformed("length overflow".to_owned()))?;
            take(buf, len, number)?
        }
        WIRE_START_GROUP => {
            loop {
                let inner = next_field(buf)?;
                if inner.wire_type == WIRE_END_GROUP {
                    if inner.number != number {
                        return Err(malformed(format!(
                            "group {number} closed as {}",
                            inner.number
                        )));
                    }
                    break;
                }
            }
            consumed(start, *buf)
        }
        WIRE_END_GROUP => &[],
        other => {
            return Err(malformed(format!(
                "unsupported wire type {other} for field {number}"
            )));
        }
    };

    Ok(WireField {
        number,
        wire_type,
        value,
    })
}

/// The part of `start` already read, given what is left of it.
fn consumed<'a>(start: &'a [u8], rest: &[u8]) -> &'a [u8] {
    &start[..start.len() - rest.len()]
}

fn take<'a>(buf: &mut &'a [u8], len: usize, number: u32) -> Result<&'a [u8], SchemaError> {
    let data: &'a [u8] = *buf;
    if data.len() < len {
        return Err(malformed(format!(
            "field {number} declares {len} bytes, {} remain",
            data.len()
        )));
    }
    let (head, tail) = data.split_at(len);
    *buf = tail;
    Ok(head)
}

fn string_field(fields: &[WireField<'_>], number: u32) -> String {
    fields
        .iter()
        .rev()
        .find(|f| f.number == number && f.wire_type == WIRE_LEN)
        .map(|f| String::from_utf8_lossy(f.value).into_owned())
        .unwrap_or_default()
}

fn varint_field(fields: &[WireField<'_>], number: u32) -> u64 {
    fields
        .iter()
        .rev()
        .find(|f| f.number == number && f.wire_type == WIRE_VARINT)
        .and_then(|f| prost::encoding::decode_varint(&mut &f.value[..]).ok())
        .unwrap_or_default()
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}.{name}")
    }
}

/// Walks the declarations of a `FileDescriptorProto` that can carry options.
/// Field numbers are those of `google/protobuf/descriptor.proto`.
#[derive(Default)]
struct OptionWalker {
    found: Vec<CustomOption>,
}

impl OptionWalker {
    fn file(&mut self, data: &[u8]) -> Result<(), SchemaError> {
        for f in wire_fields(data)?.iter().filter(|f| f.wire_type == WIRE_LEN) {
            match f.number {
                4 => self.message("", f.value)?,
                5 => self.enumeration("", f.value)?,
                6 => self.service(f.value)?,
                7 => self.field("extension", "", f.value)?,
                8 => self.options("file".to_owned(), f.value)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn message(&mut self, parent: &str, data: &[u8]) -> Result<(), SchemaError> {
        let fields = wire_fields(data)?;
        let path = join(parent, &string_field(&fields, 1));
        for f in fields.iter().filter(|f| f.wire_type == WIRE_LEN) {
            match f.number {
                2 => self.field("field", &path, f.value)?,
                3 => self.message(&path, f.value)?,
                4 => self.enumeration(&path, f.value)?,
                5 => self.extension_range(&path, f.value)?,
                6 => self.field("extension", &path, f.value)?,
                7 => self.options(format!("message:{path}"), f.value)?,
                8 => self.named_options("oneof", &path, 2, f.value)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn field(&mut self, kind: &str, parent: &str, data: &[u8]) -> Result<(), SchemaError> {
        self.named_options(kind, parent, 8, data)
    }

    fn extension_range(&mut self, parent: &str, data: &[u8]) -> Result<(), SchemaError> {
        let fields = wire_fields(data)?;
        let start = varint_field(&fields, 1);
        for f in fields.iter().filter(|f| f.number == 3 && f.wire_type == WIRE_LEN) {
            self.options(format!("extension_range:{parent}[{start}]"), f.value)?;
        }
        Ok(())
    }

    fn enumeration(&mut self, parent: &str, data: &[u8]) -> Result<(), SchemaError> {
        let fields = wire_fields(data)?;
        let path = join(parent, &string_field(&fields, 1));
        for f in fields.iter().filter(|f| f.wire_type == WIRE_LEN) {
            match f.number {
                2 => self.named_options("enum_value", &path, 3, f.value)?,
                3 => self.options(format!("enum:{path}"), f.value)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn service(&mut self, data: &[u8]) -> Result<(), SchemaError> {
        let fields = wire_fields(data)?;
        let name = string_field(&fields, 1);
        for f in fields.iter().filter(|f| f.wire_type == WIRE_LEN) {
            match f.number {
                2 => self.named_options("method", &name, 4, f.value)?,
                3 => self.options(format!("service:{name}"), f.value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// A leaf declaration: a name in field 1 and options in `options_field`.
    fn named_options(
        &mut self,
        kind: &str,
        parent: &str,
        options_field: u32,
        data: &[u8],
    ) -> Result<(), SchemaError> {
        let fields = wire_fields(data)?;
        let path = join(parent, &string_field(&fields, 1));
        for f in fields
            .iter()
            .filter(|f| f.number == options_field && f.wire_type == WIRE_LEN)
        {
            self.options(format!("{kind}:{path}"), f.value)?;
        }
        Ok(())
    }

    fn options(&mut self, scope: String, data: &[u8]) -> Result<(), SchemaError> {
        for f in wire_fields(data)? {
            if f.number >= FIRST_EXTENSION {
                self.found.push(CustomOption {
                    scope: scope.clone(),
                    field: f.number,
                    wire_type: f.wire_type,
                    value: f.value.to_vec(),
                });
            }
        }
        Ok(())
    }
}
