use crate::asset::AssetBuilder;
use crate::package::{PackageAssembler, PackageNaming};
use crate::package_set::assemble_package_set;
use crate::registry::{DependencyRegistry, MissingDependencyPolicy};
use crate::source::SourceMap;
use crate::CoreError;
use protopkg_schema::{Archive, AssetRecord, Compiler, PackageRecord, PackageSet, RawDescriptor};
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub missing_deps: MissingDependencyPolicy,
    pub naming: PackageNaming,
}

/// One invocation: a dependency registry plus the build steps that use it.
///
/// Prior packages are registered up front with [`Pipeline::with_dependencies`].
/// Each file built by [`Pipeline::build_package`] is registered as soon as it
/// is finished, so a descriptor set in dependency order resolves internally.
#[derive(Debug)]
pub struct Pipeline {
    options: PipelineOptions,
    registry: DependencyRegistry,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            registry: DependencyRegistry::new(options.missing_deps),
            options,
        }
    }

    pub fn with_dependencies(mut self, packages: &[PackageRecord]) -> Result<Self, CoreError> {
        self.registry.populate(packages)?;
        Ok(self)
    }

    pub fn registry(&self) -> &DependencyRegistry {
        &self.registry
    }

    /// Build one package from the files of a descriptor set.
    pub fn build_package(
        &mut self,
        descriptors: &[RawDescriptor],
        archive: Archive,
        compiler: Compiler,
        sources: Option<&SourceMap>,
    ) -> Result<PackageRecord, CoreError> {
        archive.validate()?;
        if compiler.name.trim().is_empty() {
            return Err(CoreError::Config("compiler name is required".to_owned()));
        }

        let mut builder = AssetBuilder::new();
        if let Some(sources) = sources {
            builder = builder.with_sources(sources);
        }

        let mut files = Vec::with_capacity(descriptors.len());
        let mut providers = BTreeSet::new();
        for (index, raw) in descriptors.iter().enumerate() {
            let built = builder.build(index, raw, &self.registry)?;
            self.registry.register_file(&built.record, None)?;
            providers.extend(built.providers);
            files.push(built.record);
        }

        let namespace = common_namespace(&files);
        let pkg = PackageAssembler::new(self.options.naming).assemble(
            archive,
            compiler,
            files,
            &namespace,
            providers,
        );
        info!(
            "built {} ({} files, {} package deps)",
            pkg.name,
            pkg.files.len(),
            pkg.dependencies.len()
        );
        Ok(pkg)
    }

    /// Regroup `direct` and `transitive` packages by namespace.
    pub fn build_package_set(
        direct: &[PackageRecord],
        transitive: &[PackageRecord],
    ) -> Result<PackageSet, CoreError> {
        let set = assemble_package_set(direct, transitive)?;
        info!("built package set ({} packages)", set.packages.len());
        Ok(set)
    }
}

/// The namespace shared by every file, or empty when they differ.
fn common_namespace(files: &[AssetRecord]) -> String {
    let mut namespaces = files.iter().map(AssetRecord::schema_package);
    match namespaces.next() {
        Some(first) if namespaces.all(|ns| ns == first) => first.to_owned(),
        _ => String::new(),
    }
}
