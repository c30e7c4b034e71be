use crate::CoreError;
use protopkg_schema::{AssetRecord, FileKey, PackageKey, PackageRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// What to do with an import that no known file satisfies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingDependencyPolicy {
    /// Abort the run with `UnresolvedDependency`.
    #[default]
    Fail,
    /// Log a warning and leave the edge out of the record.
    Omit,
}

impl FromStr for MissingDependencyPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "omit" => Ok(Self::Omit),
            other => Err(CoreError::Config(format!(
                "unknown missing-dependency policy '{other}', expected fail or omit"
            ))),
        }
    }
}

impl fmt::Display for MissingDependencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fail => "fail",
            Self::Omit => "omit",
        })
    }
}

/// A file known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredFile {
    pub key: FileKey,
    /// The prior package that supplied the file; `None` for files built in this run.
    pub provider: Option<PackageKey>,
}

/// Imports resolved to content-pinned keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    /// Sorted, deduplicated `name@hash` keys.
    pub files: Vec<FileKey>,
    /// Prior packages the imports were satisfied from.
    pub packages: BTreeSet<PackageKey>,
}

/// Per-invocation index from file names and package keys to known records.
///
/// Populated from prior packages before any file is built; files built during
/// the run are added as each one is finished.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    policy: MissingDependencyPolicy,
    files: BTreeMap<String, RegisteredFile>,
    packages: BTreeSet<PackageKey>,
}

impl DependencyRegistry {
    pub fn new(policy: MissingDependencyPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Register every package and every file it contains.
    pub fn populate<'a>(
        &mut self,
        packages: impl IntoIterator<Item = &'a PackageRecord>,
    ) -> Result<(), CoreError> {
        for pkg in packages {
            self.register_package(pkg)?;
        }
        debug!(
            "dependency registry: {} packages, {} files",
            self.packages.len(),
            self.files.len()
        );
        Ok(())
    }

    pub fn register_package(&mut self, pkg: &PackageRecord) -> Result<(), CoreError> {
        let key = pkg.key();
        for file in &pkg.files {
            self.register_file(file, Some(&key))?;
        }
        debug!("registered package {key} ({} files)", pkg.files.len());
        self.packages.insert(key);
        Ok(())
    }

    /// Register one file. Seeing the same name again is fine when the hash
    /// matches; a different hash is a `DuplicateFile` error.
    pub fn register_file(
        &mut self,
        file: &AssetRecord,
        provider: Option<&PackageKey>,
    ) -> Result<(), CoreError> {
        let key = file.key();
        if let Some(existing) = self.files.get(file.name()) {
            if existing.key != key {
                return Err(CoreError::DuplicateFile {
                    name: file.name().to_owned(),
                    first: existing.key.to_string(),
                    second: key.into_inner(),
                });
            }
            return Ok(());
        }
        self.files.insert(
            file.name().to_owned(),
            RegisteredFile {
                key,
                provider: provider.cloned(),
            },
        );
        Ok(())
    }

    pub fn file(&self, name: &str) -> Option<&RegisteredFile> {
        self.files.get(name)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Resolve a single import.
    ///
    /// Returns `Ok(None)` only under [`MissingDependencyPolicy::Omit`].
    pub fn resolve(&self, import: &str) -> Result<Option<&RegisteredFile>, CoreError> {
        if let Some(found) = self.files.get(import) {
            debug!("resolved {import} -> {}", found.key);
            return Ok(Some(found));
        }
        match self.policy {
            MissingDependencyPolicy::Fail => Err(CoreError::UnresolvedDependency {
                import: import.to_owned(),
                known: self.files.keys().cloned().collect::<Vec<_>>().join(", "),
            }),
            MissingDependencyPolicy::Omit => {
                warn!("dependency not found, omitting: {import}");
                Ok(None)
            }
        }
    }

    /// Resolve an import list to file keys plus the packages providing them.
    pub fn resolve_imports(&self, imports: &[String]) -> Result<Resolved, CoreError> {
        let mut files = BTreeSet::new();
        let mut packages = BTreeSet::new();
        for import in imports {
            if let Some(found) = self.resolve(import)? {
                files.insert(found.key.clone());
                if let Some(provider) = &found.provider {
                    packages.insert(provider.clone());
                }
            }
        }
        Ok(Resolved {
            files: files.into_iter().collect(),
            packages,
        })
    }
}
