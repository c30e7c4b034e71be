//! Regrouping packages by schema namespace.
//!
//! Build-system packages are folded into one output package per declared
//! schema package name. Cross-package edges are then recomputed from each
//! file's imports against the regrouped output.

use crate::package::{PackageAssembler, PackageNaming};
use crate::CoreError;
use protopkg_schema::{Archive, AssetRecord, Compiler, PackageKey, PackageRecord, PackageSet};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

struct Group<'a> {
    representative: &'a PackageRecord,
    files: BTreeMap<String, AssetRecord>,
    origins: BTreeSet<String>,
}

fn provenance(pkg: &PackageRecord) -> String {
    pkg.archive.as_ref().map_or_else(String::new, |a| {
        format!("{}@{}", a.location(), a.commit_sha1)
    })
}

/// Merge `direct` and `transitive` packages into one package per namespace.
///
/// Output packages are ordered by namespace and named by it. The first input
/// package seen for a namespace supplies archive and compiler.
pub fn assemble_package_set(
    direct: &[PackageRecord],
    transitive: &[PackageRecord],
) -> Result<PackageSet, CoreError> {
    let mut groups: BTreeMap<String, Group<'_>> = BTreeMap::new();
    let mut seen: BTreeMap<String, String> = BTreeMap::new();

    for pkg in direct.iter().chain(transitive) {
        for file in &pkg.files {
            let name = file.name();
            match seen.get(name) {
                Some(hash) if *hash == file.hash => continue,
                Some(hash) => {
                    return Err(CoreError::DuplicateFile {
                        name: name.to_owned(),
                        first: format!("{name}@{hash}"),
                        second: file.key().into_inner(),
                    });
                }
                None => {
                    seen.insert(name.to_owned(), file.hash.clone());
                }
            }

            let group = groups
                .entry(file.schema_package().to_owned())
                .or_insert_with(|| Group {
                    representative: pkg,
                    files: BTreeMap::new(),
                    origins: BTreeSet::new(),
                });
            group.origins.insert(provenance(pkg));
            group.files.insert(name.to_owned(), file.clone());
        }
    }

    let mut provenances = Vec::with_capacity(groups.len());
    for (namespace, group) in &groups {
        provenances.push(representative_provenance(namespace, group)?);
    }

    let assembler = PackageAssembler::new(PackageNaming::Namespace);
    let mut packages: Vec<PackageRecord> = groups
        .into_iter()
        .zip(provenances)
        .map(|((namespace, group), (archive, compiler))| {
            if group.origins.len() > 1 {
                warn!(
                    "namespace '{namespace}' mixes provenance {:?}; using {}",
                    group.origins,
                    provenance(group.representative)
                );
            }
            assembler.assemble(
                archive,
                compiler,
                group.files.into_values().collect(),
                &namespace,
                BTreeSet::new(),
            )
        })
        .collect();

    link_providers(&mut packages)?;
    Ok(PackageSet { packages })
}

/// Archive and compiler of a group's representative. Both are required, and
/// every group is checked before any output package is hashed.
fn representative_provenance(
    namespace: &str,
    group: &Group<'_>,
) -> Result<(Archive, Compiler), CoreError> {
    let pkg = group.representative;
    let missing = |field: &str| {
        CoreError::Config(format!(
            "package '{}' (namespace '{namespace}') has no {field}",
            pkg.name
        ))
    };
    let archive = pkg.archive.clone().ok_or_else(|| missing("archive"))?;
    archive.validate()?;
    let compiler = pkg.compiler.clone().ok_or_else(|| missing("compiler"))?;
    if compiler.name.trim().is_empty() {
        return Err(missing("compiler name"));
    }
    Ok((archive, compiler))
}

/// Add an edge from each package to every other package providing one of its imports.
fn link_providers(packages: &mut [PackageRecord]) -> Result<(), CoreError> {
    let mut provider_of: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, pkg) in packages.iter().enumerate() {
        for name in pkg.file_names() {
            provider_of.insert(name, i);
        }
    }
    let keys: Vec<PackageKey> = packages.iter().map(PackageRecord::key).collect();

    let mut edges: Vec<BTreeSet<PackageKey>> = vec![BTreeSet::new(); packages.len()];
    for (i, pkg) in packages.iter().enumerate() {
        for file in &pkg.files {
            for import in file.imports() {
                let Some(&provider) = provider_of.get(import.as_str()) else {
                    return Err(CoreError::UnknownProvider {
                        import: import.clone(),
                        importer: file.name().to_owned(),
                    });
                };
                debug!("{} imports {import} from {}", pkg.name, packages[provider].name);
                if provider != i {
                    edges[i].insert(keys[provider].clone());
                }
            }
        }
    }

    for (pkg, deps) in packages.iter_mut().zip(edges) {
        pkg.dependencies = deps.into_iter().map(String::from).collect();
    }
    Ok(())
}
