//! Canonicalization, hashing, and package assembly for protopkg.
//!
//! This crate turns compiled descriptor files into content-addressed records:
//! the `Canonicalizer` normalizes declaration order, structural and byte
//! digests identify each file, the `DependencyRegistry` pins imports to exact
//! versions of previously built files, and the assemblers group files into
//! named packages and namespace-level package sets. `Pipeline` runs the steps
//! for one invocation.

pub mod archive;
pub mod asset;
pub mod canonicalize;
pub mod hash;
pub mod package;
pub mod package_set;
pub mod pipeline;
pub mod registry;
pub mod source;

pub use archive::build_archive;
pub use asset::{AssetBuilder, BuiltAsset};
pub use canonicalize::{canonicalize_custom_options, canonicalize_file, CanonicalizeError};
pub use hash::{file_hash, package_hash, ByteDigest, HASH_ALGORITHM};
pub use package::{location_name, PackageAssembler, PackageNaming};
pub use package_set::assemble_package_set;
pub use pipeline::{Pipeline, PipelineOptions};
pub use registry::{DependencyRegistry, MissingDependencyPolicy, RegisteredFile, Resolved};
pub use source::SourceMap;

use protopkg_remote::RemoteError;
use protopkg_schema::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Schema(#[from] SchemaError),
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("canonicalization failed: {0}")]
    Canonicalize(#[from] CanonicalizeError),
    #[error("unresolved dependency '{import}' (known files: {known})")]
    UnresolvedDependency { import: String, known: String },
    #[error("no source file matches '{0}'")]
    SourceNotFound(String),
    #[error("source for '{file}' is ambiguous: {candidates:?}")]
    AmbiguousSource {
        file: String,
        candidates: Vec<String>,
    },
    #[error("unknown provider for import '{import}' (imported by {importer})")]
    UnknownProvider { import: String, importer: String },
    #[error("file '{name}' has conflicting versions: {first} and {second}")]
    DuplicateFile {
        name: String,
        first: String,
        second: String,
    },
    #[error("file {index} ({file}): {source}")]
    Asset {
        index: usize,
        file: String,
        source: Box<CoreError>,
    },
}

/// Broad classes of failure, for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A required input or flag is missing or malformed.
    Config,
    /// A file or network operation failed.
    Io,
    /// The input content itself is wrong.
    Data,
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Config(_)
            | CoreError::UnknownProvider { .. }
            | CoreError::Schema(SchemaError::MissingField(_)) => ErrorCategory::Config,
            CoreError::Schema(SchemaError::Read { .. } | SchemaError::Write { .. })
            | CoreError::Remote(_)
            | CoreError::Io(_) => ErrorCategory::Io,
            CoreError::Asset { source, .. } => source.category(),
            _ => ErrorCategory::Data,
        }
    }

    /// The innermost error, past any per-file wrapping.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            CoreError::Asset { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
