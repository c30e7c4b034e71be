use crate::RulesError;
use std::fmt;
use std::str::FromStr;

/// A build label: `@repo//package:name`.
///
/// An empty `repo` means the main repository. When `name` equals the last
/// segment of `package`, the display form drops the `:name` suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub repo: String,
    pub package: String,
    pub name: String,
}

impl Label {
    pub fn new(repo: &str, package: &str, name: &str) -> Self {
        Self {
            repo: repo.to_owned(),
            package: package.to_owned(),
            name: name.to_owned(),
        }
    }

    fn base(&self) -> &str {
        self.package.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
        }
        write!(f, "//{}", self.package)?;
        if self.name != self.base() {
            write!(f, ":{}", self.name)?;
        }
        Ok(())
    }
}

impl FromStr for Label {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| RulesError::InvalidLabel {
            label: s.to_owned(),
            reason,
        };

        let (repo, rest) = match s.strip_prefix('@') {
            Some(tail) => tail
                .split_once("//")
                .ok_or_else(|| invalid("repository name must be followed by '//'"))?,
            None => (
                "",
                s.strip_prefix("//")
                    .ok_or_else(|| invalid("expected '//' or '@repo//'"))?,
            ),
        };
        if repo.contains(['/', ':']) {
            return Err(invalid("bad repository name"));
        }

        let (package, name) = match rest.split_once(':') {
            Some((package, name)) => (package, name),
            None => (rest, rest.rsplit('/').next().unwrap_or_default()),
        };
        if package.starts_with('/') || package.ends_with('/') || package.contains("//") {
            return Err(invalid("bad package path"));
        }
        if name.is_empty() {
            return Err(invalid("empty target name"));
        }
        if name.contains(':') {
            return Err(invalid("more than one ':'"));
        }

        Ok(Label::new(repo, package, name))
    }
}
