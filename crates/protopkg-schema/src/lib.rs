//! Package records, identifiers, and codecs for protopkg.
//!
//! This crate defines the data layer: the record messages (`AssetRecord`,
//! `PackageRecord`, `PackageSet`, `Archive`, `Compiler`, `CreateOperation`)
//! with their binary and JSON renderings, identifier newtypes, splitting of a
//! compiled `FileDescriptorSet` into per-file bytes, archive coordinates, and
//! the adapter for first-generation package files.

pub mod codec;
pub mod descriptor;
pub mod legacy;
pub mod provenance;
pub mod records;
pub mod types;

pub use codec::{
    decode_record, read_packages, read_record, read_trimmed, to_json, write_atomic, write_binary,
    write_json, Format,
};
pub use descriptor::{custom_options, split_descriptor_set, RawDescriptor};
pub use provenance::{short_sha, ArchiveSpec};
pub use records::{
    Archive, AssetRecord, Compiler, CreateOperation, CustomOption, PackageRecord, PackageSet,
    Repository, EMPTY_ROOT,
};
pub use types::{FileKey, PackageKey, StructuralHash};

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("decoding {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed descriptor set: {0}")]
    MalformedDescriptorSet(String),
    #[error("malformed legacy package: {0}")]
    MalformedLegacy(String),
    #[error("required field missing: {0}")]
    MissingField(String),
}

impl SchemaError {
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        SchemaError::Read {
            path: path.display().to_string(),
            source,
        }
    }
}
