//! Adapter for the first-generation package shape and its input files.
//!
//! The v1 shape kept a `location` (repository + commit + prefix) and a flat
//! list of `assets` with no structural hash or dependency keys. It is read only
//! to be upgraded: the descriptors are handed back as [`RawDescriptor`]s and go
//! through the normal asset pipeline again.

use crate::descriptor::RawDescriptor;
use crate::provenance::ArchiveSpec;
use crate::records::Compiler;
use crate::SchemaError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `proto_repository_info.json`, written at the root of a fetched repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    #[serde(default)]
    pub vcs: String,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub strip_prefix: String,
    #[serde(default)]
    pub source_host: String,
    #[serde(default)]
    pub source_owner: String,
    #[serde(default)]
    pub source_repo: String,
    #[serde(default)]
    pub source_prefix: String,
    #[serde(default)]
    pub source_commit: String,
}

impl RepositoryInfo {
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let data = std::fs::read(path).map_err(|e| SchemaError::read(path, e))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// `source_commit` when present, otherwise the fetched `commit`.
    pub fn commit_id(&self) -> &str {
        if self.source_commit.is_empty() {
            &self.commit
        } else {
            &self.source_commit
        }
    }

    pub fn to_archive_spec(&self) -> ArchiveSpec {
        ArchiveSpec {
            host: self.source_host.clone(),
            owner: self.source_owner.clone(),
            repo: self.source_repo.clone(),
            commit: self.commit_id().to_owned(),
            root: self.source_prefix.clone(),
        }
    }
}

/// Compiler info file written by the compiler rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInfo {
    pub name: String,
    #[serde(default)]
    pub version_file: String,
}

impl CompilerInfo {
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let data = std::fs::read(path).map_err(|e| SchemaError::read(path, e))?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRepository {
    pub server: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub repository: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyLocation {
    pub repository: LegacyRepository,
    pub commit: String,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAsset {
    /// Base64 of the serialized `FileDescriptorProto`.
    pub file: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
}

/// First-generation package, JSON rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPackage {
    pub location: LegacyLocation,
    pub compiler: Compiler,
    #[serde(default)]
    pub assets: Vec<LegacyAsset>,
}

/// Pieces of a legacy package, ready for the current pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradedPackage {
    pub archive: ArchiveSpec,
    pub compiler: Compiler,
    pub files: Vec<RawDescriptor>,
}

impl LegacyPackage {
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let data = std::fs::read(path).map_err(|e| SchemaError::read(path, e))?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn upgrade(self) -> Result<UpgradedPackage, SchemaError> {
        let repo = self.location.repository;
        let archive = ArchiveSpec {
            host: repo.server,
            owner: repo.owner,
            repo: repo.name,
            commit: self.location.commit,
            root: self.location.prefix,
        };
        archive.validate()?;

        let files = self
            .assets
            .into_iter()
            .enumerate()
            .map(|(i, asset)| {
                let bytes = STANDARD.decode(asset.file.trim()).map_err(|e| {
                    SchemaError::MalformedLegacy(format!("asset {i}: invalid base64: {e}"))
                })?;
                RawDescriptor::decode(bytes)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UpgradedPackage {
            archive,
            compiler: self.compiler,
            files,
        })
    }
}
