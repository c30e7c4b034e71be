use crate::directive::{Directives, PackageDirective};
use crate::label::Label;
use crate::resolver::ProvidedIndex;
use std::fmt::Write;
use tracing::debug;

pub const PACKAGE_RULE_KIND: &str = "protopkg_package";

pub const LIBRARY_RULE_KIND: &str = "protopkg_library";

/// Import language under which `proto_library` rules are indexed.
pub const PROTO_LIBRARY_LANG: &str = "proto";

/// Import language under which `protopkg_file` rules are indexed.
pub const FILE_RULE_KIND: &str = "protopkg_file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedRule {
    pub kind: String,
    pub name: String,
    pub deps: Vec<String>,
}

fn matches(filter: &PackageDirective, label: &Label) -> bool {
    (filter.repo.is_empty() || filter.repo == label.repo)
        && (filter.package.is_empty() || filter.package == label.package)
        && (filter.name.is_empty() || filter.name == label.name)
}

/// One `protopkg_package` rule per directive, ordered by rule name.
///
/// Each rule depends on every provided `protopkg_file` label that passes the
/// directive's filter.
pub fn generate_rules(directives: &Directives, index: &ProvidedIndex) -> Vec<GeneratedRule> {
    let provided = index.provided("protobuf", FILE_RULE_KIND);
    directives
        .packages
        .iter()
        .map(|(name, filter)| {
            let mut deps: Vec<String> = provided
                .keys()
                .filter(|label| matches(filter, label))
                .map(ToString::to_string)
                .collect();
            deps.sort();
            debug!("{PACKAGE_RULE_KIND} {name}: {} deps", deps.len());
            GeneratedRule {
                kind: PACKAGE_RULE_KIND.to_owned(),
                name: name.clone(),
                deps,
            }
        })
        .collect()
}

/// One `protopkg_library` rule per `proto_library` provided in `repo//package`,
/// named after the library with its `_proto` suffix replaced by `_pkg` and
/// depending on that library alone.
pub fn generate_library_rules(index: &ProvidedIndex, repo: &str, package: &str) -> Vec<GeneratedRule> {
    index
        .provided(PROTO_LIBRARY_LANG, PROTO_LIBRARY_LANG)
        .keys()
        .filter(|label| label.repo == repo && label.package == package)
        .map(|label| {
            let base = label.name.strip_suffix("_proto").unwrap_or(&label.name);
            debug!("{LIBRARY_RULE_KIND} {base}_pkg for {label}");
            GeneratedRule {
                kind: LIBRARY_RULE_KIND.to_owned(),
                name: format!("{base}_pkg"),
                deps: vec![format!(":{}", label.name)],
            }
        })
        .collect()
}

/// Render rules as build-file text.
pub fn render_rules(rules: &[GeneratedRule]) -> String {
    let mut out = String::new();
    for (i, rule) in rules.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}(", rule.kind);
        let _ = writeln!(out, "    name = {:?},", rule.name);
        if rule.deps.is_empty() {
            out.push_str("    deps = [],\n");
        } else {
            out.push_str("    deps = [\n");
            for dep in &rule.deps {
                let _ = writeln!(out, "        {dep:?},");
            }
            out.push_str("    ],\n");
        }
        out.push_str(")\n");
    }
    out
}
