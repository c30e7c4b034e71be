//! Reading and writing records in their binary (protobuf) and JSON renderings.

use crate::records::{PackageRecord, PackageSet};
use crate::SchemaError;
use prost::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// On-disk rendering of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Binary,
    Json,
}

impl Format {
    /// JSON documents start with `{` once leading whitespace is skipped.
    /// Binary input can look the same (`0x0a` is a newline, `{` a plausible
    /// length), so callers fall back to the binary decoder on a JSON failure.
    pub fn sniff(data: &[u8]) -> Self {
        match data.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Format::Json,
            _ => Format::Binary,
        }
    }
}

/// Decode a record from bytes in either rendering.
pub fn decode_record<T>(data: &[u8]) -> Result<T, SchemaError>
where
    T: Message + Default + DeserializeOwned,
{
    match Format::sniff(data) {
        Format::Json => serde_json::from_slice(data)
            .or_else(|json_err| T::decode(data).map_err(|_| SchemaError::from(json_err))),
        Format::Binary => Ok(T::decode(data)?),
    }
}

pub fn read_record<T>(path: &Path) -> Result<T, SchemaError>
where
    T: Message + Default + DeserializeOwned,
{
    let data = fs::read(path).map_err(|e| SchemaError::read(path, e))?;
    decode_record(&data).map_err(|e| SchemaError::Decode {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Read prior packages from a file holding either one `PackageRecord` or a
/// `PackageSet`, in either rendering.
///
/// JSON sets are recognized by their `packages` key. In binary the two
/// messages are not self-describing; a built record always carries a hash,
/// so input that does not decode to a record with one is read as a set.
pub fn read_packages(path: &Path) -> Result<Vec<PackageRecord>, SchemaError> {
    let data = fs::read(path).map_err(|e| SchemaError::read(path, e))?;
    let decoded = match Format::sniff(&data) {
        Format::Json => decode_json_packages(&data),
        Format::Binary => decode_binary_packages(&data),
    };
    decoded.map_err(|e| SchemaError::Decode {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn decode_json_packages(data: &[u8]) -> Result<Vec<PackageRecord>, SchemaError> {
    let value: serde_json::Value = match serde_json::from_slice(data) {
        Ok(value) => value,
        Err(e) => return decode_binary_packages(data).map_err(|_| SchemaError::from(e)),
    };
    if value.get("packages").is_some() {
        Ok(serde_json::from_value::<PackageSet>(value)?.packages)
    } else {
        Ok(vec![serde_json::from_value::<PackageRecord>(value)?])
    }
}

fn decode_binary_packages(data: &[u8]) -> Result<Vec<PackageRecord>, SchemaError> {
    match PackageRecord::decode(data) {
        Ok(pkg) if !pkg.hash.is_empty() => Ok(vec![pkg]),
        _ => Ok(PackageSet::decode(data)?.packages),
    }
}

/// Indented JSON rendering.
pub fn to_json<T: Serialize>(record: &T) -> Result<String, SchemaError> {
    let mut out = serde_json::to_string_pretty(record)?;
    out.push('\n');
    Ok(out)
}

pub fn write_binary<T: Message>(path: &Path, record: &T) -> Result<(), SchemaError> {
    write_atomic(path, &record.encode_to_vec())
}

pub fn write_json<T: Serialize>(path: &Path, record: &T) -> Result<(), SchemaError> {
    write_atomic(path, to_json(record)?.as_bytes())
}

/// Write via a temp file in the destination directory and rename over the
/// target, so a failed run never leaves a partial output behind.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SchemaError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let write = || -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    };
    write().map_err(|e| SchemaError::Write {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!("wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Read a plain-text file and trim surrounding whitespace (compiler version files).
pub fn read_trimmed(path: &Path) -> Result<String, SchemaError> {
    let data = fs::read_to_string(path).map_err(|e| SchemaError::read(path, e))?;
    Ok(data.trim().to_owned())
}
