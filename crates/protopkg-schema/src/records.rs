//! Package records: the messages the pipeline produces, persists, and sends.
//!
//! Every record is a protobuf message (`prost`) so the canonical binary form is
//! the wire encoding, and also derives `serde` for the indented JSON rendering.
//! The embedded `FileDescriptorProto` has no serde support of its own; in JSON
//! it is carried as base64 of its protobuf bytes so the rendering round-trips.

use crate::types::{FileKey, PackageKey};
use prost_types::FileDescriptorProto;
use serde::{Deserialize, Serialize};

/// Placeholder used for an empty archive root in keys and dependency edges.
pub const EMPTY_ROOT: &str = "~";

/// Source repository coordinates.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct Repository {
    #[prost(string, tag = "1")]
    pub host: String,
    #[prost(string, tag = "2")]
    pub owner: String,
    #[prost(string, tag = "3")]
    pub name: String,
    /// `<host>/<owner>/<name>`.
    #[prost(string, tag = "4")]
    pub full_name: String,
}

impl Repository {
    pub fn new(host: &str, owner: &str, name: &str) -> Self {
        Self {
            host: host.to_owned(),
            owner: owner.to_owned(),
            name: name.to_owned(),
            full_name: format!("{host}/{owner}/{name}"),
        }
    }
}

/// Provenance of a package: where its sources live and at which commit.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct Archive {
    #[prost(message, optional, tag = "1")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[prost(string, tag = "2")]
    pub commit_sha1: String,
    #[prost(string, tag = "3")]
    #[serde(default)]
    pub short_sha1: String,
    /// Path prefix inside the repository; empty for the repository root.
    #[prost(string, tag = "4")]
    #[serde(default)]
    pub root: String,
    #[prost(string, tag = "5")]
    #[serde(default)]
    pub commit_message: String,
    #[prost(string, tag = "6")]
    #[serde(default)]
    pub commit_author: String,
    /// RFC 3339 timestamp of the commit.
    #[prost(string, tag = "7")]
    #[serde(default)]
    pub commit_time: String,
}

impl Archive {
    pub fn full_name(&self) -> &str {
        self.repository.as_ref().map_or("", |r| r.full_name.as_str())
    }

    /// The root, or [`EMPTY_ROOT`] when the archive covers the whole repository.
    pub fn root_or_placeholder(&self) -> &str {
        let root = self.root.trim_matches('/');
        if root.is_empty() {
            EMPTY_ROOT
        } else {
            root
        }
    }

    /// Repository full name joined with the root, cleaned of empty segments.
    pub fn location(&self) -> String {
        self.full_name()
            .split('/')
            .chain(self.root.split('/'))
            .filter(|seg| !seg.is_empty() && *seg != ".")
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// The schema compiler that produced the descriptors.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct Compiler {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub version: String,
}

/// An extension field set on one of a descriptor's `*Options` messages, such as
/// `(google.api.http)`. The decoded descriptor drops these, so they are kept
/// beside it as raw wire values.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct CustomOption {
    /// Declaration the option is set on: `file`, or `<kind>:<dotted name>` such
    /// as `message:Outer.Inner` or `method:Greeter.Hello`.
    #[prost(string, tag = "1")]
    pub scope: String,
    #[prost(uint32, tag = "2")]
    pub field: u32,
    #[prost(uint32, tag = "3")]
    pub wire_type: u32,
    /// The value as it appeared after the field key; length-delimited values
    /// without their length prefix.
    #[prost(bytes = "vec", tag = "4")]
    #[serde(with = "bytes_base64")]
    pub value: Vec<u8>,
}

/// One compiled descriptor file with its digests and resolved dependencies.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct AssetRecord {
    #[prost(message, optional, tag = "1")]
    #[serde(default, with = "descriptor_base64")]
    pub file: Option<FileDescriptorProto>,
    /// SHA-256 (hex) of the exact bytes the compiler emitted for this file.
    #[prost(string, tag = "2")]
    #[serde(default)]
    pub file_sha256: String,
    #[prost(uint64, tag = "3")]
    #[serde(default)]
    pub file_size: u64,
    /// Structural hash of the canonicalized descriptor.
    #[prost(string, tag = "4")]
    pub hash: String,
    /// Resolved `name@hash` keys, sorted.
    #[prost(string, repeated, tag = "5")]
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[prost(string, tag = "6")]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_code: String,
    /// Extension options of `file`, sorted by scope and field number.
    #[prost(message, repeated, tag = "7")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_options: Vec<CustomOption>,
}

impl AssetRecord {
    /// Declared file name, e.g. `foo/bar.proto`.
    pub fn name(&self) -> &str {
        self.file.as_ref().map_or("", |f| f.name())
    }

    /// Declared schema package (`package foo.bar;`), empty when absent.
    pub fn schema_package(&self) -> &str {
        self.file.as_ref().map_or("", |f| f.package())
    }

    /// Import strings exactly as declared by the descriptor.
    pub fn imports(&self) -> &[String] {
        self.file.as_ref().map_or(&[], |f| f.dependency.as_slice())
    }

    pub fn key(&self) -> FileKey {
        FileKey::from_parts(self.name(), &self.hash)
    }

    /// Copy with every non-semantic field cleared: source text, byte digest,
    /// byte size, and source-location metadata.
    #[must_use]
    pub fn stripped(&self) -> Self {
        let mut strip = self.clone();
        strip.source_code.clear();
        strip.file_sha256.clear();
        strip.file_size = 0;
        if let Some(file) = strip.file.as_mut() {
            file.source_code_info = None;
        }
        strip
    }
}

/// A named, content-addressed group of asset records sharing provenance.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct PackageRecord {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<Archive>,
    #[prost(message, optional, tag = "3")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<Compiler>,
    #[prost(message, repeated, tag = "4")]
    #[serde(default)]
    pub files: Vec<AssetRecord>,
    #[prost(string, tag = "5")]
    pub hash: String,
    /// Keys of the packages this one imports from, sorted.
    #[prost(string, repeated, tag = "6")]
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PackageRecord {
    /// `<repository>/<root or ~>@<hash>`: the key other packages pin this one by.
    pub fn key(&self) -> PackageKey {
        let (full_name, root) = self
            .archive
            .as_ref()
            .map_or(("", EMPTY_ROOT), |a| (a.full_name(), a.root_or_placeholder()));
        PackageKey::new(format!("{full_name}/{root}@{}", self.hash))
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(AssetRecord::name)
    }
}

/// Ordered bundle of packages, used for both dependency inputs and outputs.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct PackageSet {
    #[prost(message, repeated, tag = "1")]
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
}

/// Completion result returned by the package registry after a create call.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct CreateOperation {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub name: String,
    #[prost(bool, tag = "2")]
    #[serde(default)]
    pub done: bool,
    #[prost(string, tag = "3")]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[prost(uint32, tag = "4")]
    #[serde(default)]
    pub package_count: u32,
}

mod descriptor_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use prost::Message;
    use prost_types::FileDescriptorProto;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        file: &Option<FileDescriptorProto>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match file {
            Some(f) => s.serialize_some(&STANDARD.encode(f.encode_to_vec())),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<FileDescriptorProto>, D::Error> {
        let Some(encoded) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let bytes = STANDARD.decode(encoded).map_err(D::Error::custom)?;
        FileDescriptorProto::decode(bytes.as_slice())
            .map(Some)
            .map_err(D::Error::custom)
    }
}

mod bytes_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}
