use crate::hash::package_hash;
use protopkg_schema::{Archive, AssetRecord, Compiler, PackageKey, PackageRecord};
use std::collections::BTreeSet;
use tracing::debug;

/// How an assembled package is named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PackageNaming {
    /// `<location>:<file>@<commit>` for a single file,
    /// `<location>:<package hash>@<commit>` otherwise.
    #[default]
    Location,
    /// The schema namespace the files declare. Falls back to
    /// [`PackageNaming::Location`] when the namespace is empty.
    Namespace,
}

/// Groups asset records under shared provenance into a package record.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageAssembler {
    naming: PackageNaming,
}

impl PackageAssembler {
    pub fn new(naming: PackageNaming) -> Self {
        Self { naming }
    }

    /// Sort files by name, hash the stripped set, name the result.
    ///
    /// `namespace` is only consulted under [`PackageNaming::Namespace`].
    pub fn assemble(
        &self,
        archive: Archive,
        compiler: Compiler,
        mut files: Vec<AssetRecord>,
        namespace: &str,
        dependencies: BTreeSet<PackageKey>,
    ) -> PackageRecord {
        files.sort_by(|a, b| a.name().cmp(b.name()));
        let hash = package_hash(&files).into_inner();

        let name = match self.naming {
            PackageNaming::Namespace if !namespace.is_empty() => namespace.to_owned(),
            _ => location_name(&archive, &files, &hash),
        };
        debug!("assembled package {name} ({} files)", files.len());

        PackageRecord {
            name,
            archive: Some(archive),
            compiler: Some(compiler),
            files,
            hash,
            dependencies: dependencies.into_iter().map(String::from).collect(),
        }
    }
}

/// `<location>:<file or hash>@<commit>`.
pub fn location_name(archive: &Archive, files: &[AssetRecord], hash: &str) -> String {
    let unit = match files {
        [only] => only.name(),
        _ => hash,
    };
    format!("{}:{unit}@{}", archive.location(), archive.commit_sha1)
}
