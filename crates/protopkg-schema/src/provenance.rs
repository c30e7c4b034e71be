use crate::records::{Archive, Repository};
use crate::SchemaError;
use serde::{Deserialize, Serialize};

/// Length of the abbreviated commit id stored in [`Archive::short_sha1`].
pub const SHORT_SHA_LEN: usize = 7;

/// Version-control coordinates a package is built from, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSpec {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub commit: String,
    #[serde(default)]
    pub root: String,
}

impl ArchiveSpec {
    /// Host, owner, repository name and commit are all required.
    pub fn validate(&self) -> Result<(), SchemaError> {
        require_archive_fields([
            ("host", self.host.as_str()),
            ("owner", self.owner.as_str()),
            ("repo", self.repo.as_str()),
            ("commit", self.commit.as_str()),
        ])
    }

    /// Archive without commit details; those come from the source-hosting service.
    pub fn to_archive(&self) -> Result<Archive, SchemaError> {
        self.validate()?;
        let commit = self.commit.trim();
        Ok(Archive {
            repository: Some(Repository::new(
                self.host.trim(),
                self.owner.trim(),
                self.repo.trim(),
            )),
            commit_sha1: commit.to_owned(),
            short_sha1: short_sha(commit).to_owned(),
            root: self.root.trim().to_owned(),
            ..Default::default()
        })
    }
}

impl Archive {
    /// Same required fields as [`ArchiveSpec::validate`], read from a finished
    /// archive. Packages loaded from disk may lack them.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let repo = self.repository.as_ref();
        require_archive_fields([
            ("host", repo.map_or("", |r| r.host.as_str())),
            ("owner", repo.map_or("", |r| r.owner.as_str())),
            ("repo", repo.map_or("", |r| r.name.as_str())),
            ("commit", self.commit_sha1.as_str()),
        ])
    }
}

fn require_archive_fields(fields: [(&str, &str); 4]) -> Result<(), SchemaError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((field, _)) => Err(SchemaError::MissingField(format!("archive.{field}"))),
        None => Ok(()),
    }
}

pub fn short_sha(commit: &str) -> &str {
    match commit.char_indices().nth(SHORT_SHA_LEN) {
        Some((idx, _)) => &commit[..idx],
        None => commit,
    }
}
