//! Build-rule generation for protopkg.
//!
//! Directives name the `protopkg_package` rules to emit and filter which
//! provided file rules each one collects. The provided index maps proto
//! imports to the labels of the rules that provide them. Each `proto_library`
//! in a package can also get a `protopkg_library` wrapper.

pub mod directive;
pub mod generate;
pub mod label;
pub mod resolver;

pub use directive::{Directives, PackageDirective, DIRECTIVE_KEY};
pub use generate::{
    generate_library_rules, generate_rules, render_rules, GeneratedRule, FILE_RULE_KIND,
    LIBRARY_RULE_KIND, PACKAGE_RULE_KIND, PROTO_LIBRARY_LANG,
};
pub use label::Label;
pub use resolver::ProvidedIndex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse directives: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("invalid label '{label}': {reason}")]
    InvalidLabel { label: String, reason: &'static str },
    #[error("line {line}: expected 'protopkg_package <rule> <param> <value>', got '{text}'")]
    MalformedDirective { line: usize, text: String },
    #[error("unknown directive attribute protopkg_package.{0}")]
    UnknownParam(String),
    #[error("malformed label at position 4 in '{line}': {source}")]
    IndexLabel {
        line: String,
        source: Box<RulesError>,
    },
}

impl RulesError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        RulesError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
