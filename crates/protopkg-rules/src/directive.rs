//! `protopkg_package` directives.
//!
//! Two input forms are accepted. TOML:
//!
//! ```toml
//! [package.all_protos]
//! repo = "acme_protos"
//! package = "acme/api"
//! ```
//!
//! and directive lines, one attribute per line, as they appear in build
//! files:
//!
//! ```text
//! # gazelle:protopkg_package all_protos repo acme_protos
//! protopkg_package all_protos package acme/api
//! ```
//!
//! Lines for the same rule name merge into one directive.

use crate::RulesError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DIRECTIVE_KEY: &str = "protopkg_package";

/// Label filter for one generated `protopkg_package` rule. Empty fields
/// match anything.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageDirective {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub name: String,
}

impl PackageDirective {
    fn set(&mut self, param: &str, value: &str) -> Result<(), RulesError> {
        let slot = match param {
            "repo" => &mut self.repo,
            "package" => &mut self.package,
            "name" => &mut self.name,
            other => return Err(RulesError::UnknownParam(other.to_owned())),
        };
        value.clone_into(slot);
        Ok(())
    }
}

/// Directives keyed by the name of the rule they generate.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Directives {
    #[serde(default, rename = "package")]
    pub packages: BTreeMap<String, PackageDirective>,
}

impl Directives {
    pub fn parse_toml(input: &str) -> Result<Self, RulesError> {
        Ok(toml::from_str(input)?)
    }

    /// Parse directive lines. Blank lines and lines for other directives
    /// are ignored.
    pub fn parse_lines(input: &str) -> Result<Self, RulesError> {
        let mut directives = Self::default();
        for (i, raw) in input.lines().enumerate() {
            let mut line = raw.trim();
            if let Some(comment) = line.strip_prefix('#') {
                line = comment.trim_start();
                line = line.strip_prefix("gazelle:").unwrap_or(line);
            }

            let Some(rest) = line.strip_prefix(DIRECTIVE_KEY) else {
                continue;
            };
            if !rest.starts_with(char::is_whitespace) {
                continue;
            }
            let fields: Vec<&str> = rest.split_whitespace().collect();
            let [rule, param, value] = fields[..] else {
                return Err(RulesError::MalformedDirective {
                    line: i + 1,
                    text: raw.to_owned(),
                });
            };
            directives.apply(rule, param, value)?;
        }
        Ok(directives)
    }

    /// Read `path` as TOML when it has a `.toml` extension, as directive
    /// lines otherwise.
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let content = fs::read_to_string(path).map_err(|e| RulesError::io(path, e))?;
        let directives = if path.extension().is_some_and(|ext| ext == "toml") {
            Self::parse_toml(&content)?
        } else {
            Self::parse_lines(&content)?
        };
        debug!(
            "loaded {} directive(s) from {}",
            directives.packages.len(),
            path.display()
        );
        Ok(directives)
    }

    pub fn apply(&mut self, rule: &str, param: &str, value: &str) -> Result<(), RulesError> {
        self.packages
            .entry(rule.to_owned())
            .or_default()
            .set(param, value)
    }

    /// Overlay `other`; its non-empty attributes win.
    pub fn merge(&mut self, other: Directives) {
        for (rule, d) in other.packages {
            let entry = self.packages.entry(rule).or_default();
            for (slot, value) in [
                (&mut entry.repo, d.repo),
                (&mut entry.package, d.package),
                (&mut entry.name, d.name),
            ] {
                if !value.is_empty() {
                    *slot = value;
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
