//! Structural hashing and byte digests.
//!
//! The structural hash is blake3 over the protobuf encoding of a canonicalized
//! node. `prost` encodes fields in tag order and repeated fields in list order,
//! so the encoding of a canonical tree is itself canonical. Source-location
//! metadata is removed before encoding. A file's custom options are not part of
//! the decoded tree; they are encoded next to it in the same envelope.
//!
//! The byte digest is SHA-256 over the exact bytes the compiler produced and is
//! meant to change whenever those bytes change.

use prost::Message;
use prost_types::FileDescriptorProto;
use protopkg_schema::{AssetRecord, CustomOption, PackageRecord, StructuralHash};
use sha2::{Digest, Sha256};

/// Tag prefixed to every structural hash.
pub const HASH_ALGORITHM: &str = "blake3.v0";

fn tagged(encoded: &[u8]) -> StructuralHash {
    let digest = blake3::hash(encoded);
    StructuralHash::new(format!("{HASH_ALGORITHM}:{}", digest.to_hex()))
}

/// Hash a canonicalized file descriptor and its sorted custom options,
/// ignoring `source_code_info`.
pub fn file_hash(file: &FileDescriptorProto, options: &[CustomOption]) -> StructuralHash {
    let mut envelope = Vec::new();
    if file.source_code_info.is_none() {
        prost::encoding::message::encode(1, file, &mut envelope);
    } else {
        let mut stripped = file.clone();
        stripped.source_code_info = None;
        prost::encoding::message::encode(1, &stripped, &mut envelope);
    }
    for option in options {
        prost::encoding::message::encode(2, option, &mut envelope);
    }
    tagged(&envelope)
}

/// Hash a package's file set. Each record is stripped of source text, byte
/// digest, byte size and source-location metadata first, so the result only
/// moves when the semantic content does. `files` must already be sorted.
pub fn package_hash(files: &[AssetRecord]) -> StructuralHash {
    let envelope = PackageRecord {
        files: files.iter().map(AssetRecord::stripped).collect(),
        ..Default::default()
    };
    tagged(&envelope.encode_to_vec())
}

/// SHA-256 and length of a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteDigest {
    /// Lowercase hex.
    pub sha256: String,
    pub size: u64,
}

impl ByteDigest {
    pub fn of(data: &[u8]) -> Self {
        Self {
            sha256: hex::encode(Sha256::digest(data)),
            size: data.len() as u64,
        }
    }
}
