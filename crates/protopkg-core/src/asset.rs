use crate::canonicalize::{canonicalize_custom_options, canonicalize_file};
use crate::hash::{file_hash, ByteDigest};
use crate::registry::DependencyRegistry;
use crate::source::SourceMap;
use crate::CoreError;
use protopkg_schema::{AssetRecord, PackageKey, RawDescriptor};
use std::collections::BTreeSet;
use tracing::debug;

/// A finished asset and the prior packages its imports came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltAsset {
    pub record: AssetRecord,
    pub providers: BTreeSet<PackageKey>,
}

/// Turns raw descriptors into asset records.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssetBuilder<'a> {
    sources: Option<&'a SourceMap>,
}

impl<'a> AssetBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach source text from `sources`; each file then needs exactly one match.
    #[must_use]
    pub fn with_sources(mut self, sources: &'a SourceMap) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Build the record for the descriptor at position `index` of its set.
    /// Errors are wrapped with the index and declared file name.
    pub fn build(
        &self,
        index: usize,
        raw: &RawDescriptor,
        registry: &DependencyRegistry,
    ) -> Result<BuiltAsset, CoreError> {
        self.build_inner(raw, registry)
            .map_err(|source| CoreError::Asset {
                index,
                file: raw.name().to_owned(),
                source: Box::new(source),
            })
    }

    fn build_inner(
        &self,
        raw: &RawDescriptor,
        registry: &DependencyRegistry,
    ) -> Result<BuiltAsset, CoreError> {
        let mut file = raw.file.clone();
        canonicalize_file(&mut file)?;
        let mut custom_options = raw.custom_options.clone();
        canonicalize_custom_options(&mut custom_options);

        let digest = ByteDigest::of(&raw.bytes);
        let hash = file_hash(&file, &custom_options);
        let resolved = registry.resolve_imports(&file.dependency)?;

        let source_code = match self.sources {
            Some(sources) => sources.lookup(file.name())?.to_owned(),
            None => String::new(),
        };

        debug!(
            "asset {} {hash} ({} deps, {} bytes)",
            file.name(),
            resolved.files.len(),
            digest.size
        );
        Ok(BuiltAsset {
            record: AssetRecord {
                file: Some(file),
                file_sha256: digest.sha256,
                file_size: digest.size,
                hash: hash.into_inner(),
                dependencies: resolved.files.into_iter().map(String::from).collect(),
                source_code,
                custom_options,
            },
            providers: resolved.packages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MissingDependencyPolicy;
    use prost_types::{DescriptorProto, FileDescriptorProto};

    fn raw(name: &str, deps: &[&str]) -> RawDescriptor {
        RawDescriptor::from_file(FileDescriptorProto {
            name: Some(name.to_owned()),
            package: Some("acme".to_owned()),
            dependency: deps.iter().map(|d| (*d).to_owned()).collect(),
            message_type: vec![DescriptorProto {
                name: Some("Thing".to_owned()),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    #[test]
    fn builds_digests_and_hash() {
        let registry = DependencyRegistry::default();
        let d = raw("a.proto", &[]);
        let built = AssetBuilder::new().build(0, &d, &registry).unwrap();
        let rec = &built.record;
        assert_eq!(rec.name(), "a.proto");
        assert_eq!(rec.file_size, d.bytes.len() as u64);
        assert_eq!(rec.file_sha256, ByteDigest::of(&d.bytes).sha256);
        assert!(rec.hash.starts_with("blake3.v0:"));
        assert!(rec.dependencies.is_empty());
        assert!(rec.source_code.is_empty());
    }

    #[test]
    fn resolves_imports_through_registry() {
        let mut registry = DependencyRegistry::default();
        let a = AssetBuilder::new()
            .build(0, &raw("a.proto", &[]), &registry)
            .unwrap();
        registry.register_file(&a.record, None).unwrap();

        let b = AssetBuilder::new()
            .build(1, &raw("b.proto", &["a.proto"]), &registry)
            .unwrap();
        assert_eq!(b.record.dependencies, [format!("a.proto@{}", a.record.hash)]);
        assert!(b.providers.is_empty());
    }

    #[test]
    fn unresolved_import_names_index_and_file() {
        let registry = DependencyRegistry::new(MissingDependencyPolicy::Fail);
        let err = AssetBuilder::new()
            .build(3, &raw("b.proto", &["nope.proto"]), &registry)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("file 3"), "{msg}");
        assert!(msg.contains("b.proto"), "{msg}");
        assert!(matches!(
            err.root_cause(),
            CoreError::UnresolvedDependency { .. }
        ));
    }

    #[test]
    fn attaches_matching_source() {
        let registry = DependencyRegistry::default();
        let mut sources = SourceMap::new();
        sources.insert("src/proto/a.proto", "syntax = \"proto3\";");
        let built = AssetBuilder::new()
            .with_sources(&sources)
            .build(0, &raw("a.proto", &[]), &registry)
            .unwrap();
        assert_eq!(built.record.source_code, "syntax = \"proto3\";");
    }

    #[test]
    fn missing_source_is_error_when_map_given() {
        let registry = DependencyRegistry::default();
        let sources = SourceMap::new();
        let err = AssetBuilder::new()
            .with_sources(&sources)
            .build(0, &raw("a.proto", &[]), &registry)
            .unwrap_err();
        assert!(matches!(err.root_cause(), CoreError::SourceNotFound(_)));
    }

    #[test]
    fn byte_digest_differs_for_reordered_wire_bytes() {
        let registry = DependencyRegistry::default();
        let d = raw("a.proto", &[]);
        // Same descriptor, with the package field moved ahead of the name field.
        let mut reordered = Vec::new();
        prost::encoding::string::encode(2, &"acme".to_owned(), &mut reordered);
        prost::encoding::string::encode(1, &"a.proto".to_owned(), &mut reordered);
        prost::encoding::message::encode(4, &d.file.message_type[0], &mut reordered);
        let r = RawDescriptor::decode(reordered).unwrap();

        let one = AssetBuilder::new().build(0, &d, &registry).unwrap().record;
        let two = AssetBuilder::new().build(0, &r, &registry).unwrap().record;
        assert_eq!(one.hash, two.hash);
        assert_ne!(one.file_sha256, two.file_sha256);
    }

    /// `a.proto` whose message `Thing` sets extension 50000 of MessageOptions.
    fn with_message_option(value: u64) -> RawDescriptor {
        let mut options = Vec::new();
        prost::encoding::encode_key(50000, prost::encoding::WireType::Varint, &mut options);
        prost::encoding::encode_varint(value, &mut options);
        let mut thing = Vec::new();
        prost::encoding::string::encode(1, &"Thing".to_owned(), &mut thing);
        prost::encoding::bytes::encode(7, &options, &mut thing);
        let mut file = Vec::new();
        prost::encoding::string::encode(1, &"a.proto".to_owned(), &mut file);
        prost::encoding::string::encode(2, &"acme".to_owned(), &mut file);
        prost::encoding::bytes::encode(4, &thing, &mut file);
        RawDescriptor::decode(file).unwrap()
    }

    #[test]
    fn custom_option_value_changes_hash() {
        let registry = DependencyRegistry::default();
        let one = AssetBuilder::new()
            .build(0, &with_message_option(1), &registry)
            .unwrap()
            .record;
        let two = AssetBuilder::new()
            .build(0, &with_message_option(2), &registry)
            .unwrap()
            .record;
        assert_ne!(one.file_sha256, two.file_sha256);
        assert_ne!(one.hash, two.hash);

        assert_eq!(one.custom_options.len(), 1);
        assert_eq!(one.custom_options[0].scope, "message:Thing");
        assert_eq!(one.custom_options[0].field, 50000);
        assert_eq!(one.custom_options[0].value, [1]);
    }

    #[test]
    fn custom_options_feed_the_package_hash() {
        let registry = DependencyRegistry::default();
        let build = |value| {
            AssetBuilder::new()
                .build(0, &with_message_option(value), &registry)
                .unwrap()
                .record
        };
        assert_ne!(
            crate::hash::package_hash(&[build(1)]),
            crate::hash::package_hash(&[build(2)])
        );
    }
}
