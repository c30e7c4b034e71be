//! External collaborators of the protopkg pipeline.
//!
//! This crate provides the read-only commit lookup against a source-hosting
//! service (`CommitSource`, with a GitHub implementation and an optional disk
//! cache), the client that streams finished packages to a package registry
//! (`PackageRegistry`), and configuration for both endpoints.

pub mod config;
pub mod github;
pub mod registry;

#[cfg(test)]
mod mock;

pub use config::{GithubConfig, RemoteConfig, TransportPolicy};
pub use github::GithubCommitSource;
pub use registry::HttpPackageRegistry;

use chrono::{DateTime, Utc};
use protopkg_schema::{CreateOperation, PackageRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("protopkg/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("remote config error: {0}")]
    Config(String),
}

/// Details of one commit, as reported by the source-hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetails {
    pub message: String,
    pub author_email: String,
    pub time: DateTime<Utc>,
}

/// Read-only lookup of commit metadata by owner, repository, and commit id.
pub trait CommitSource {
    fn fetch_commit(&self, owner: &str, repo: &str, sha: &str)
        -> Result<CommitDetails, RemoteError>;
}

/// Client side of the registry's create call: a stream of packages in, one
/// operation result out.
pub trait PackageRegistry {
    fn create_packages(&self, packages: &[PackageRecord]) -> Result<CreateOperation, RemoteError>;
}

/// In-memory commit source, for callers that already hold the details.
#[derive(Debug, Clone, Default)]
pub struct StaticCommitSource {
    commits: BTreeMap<(String, String, String), CommitDetails>,
}

impl StaticCommitSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_commit(mut self, owner: &str, repo: &str, sha: &str, details: CommitDetails) -> Self {
        self.commits
            .insert((owner.to_owned(), repo.to_owned(), sha.to_owned()), details);
        self
    }
}

impl CommitSource for StaticCommitSource {
    fn fetch_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CommitDetails, RemoteError> {
        self.commits
            .get(&(owner.to_owned(), repo.to_owned(), sha.to_owned()))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("commit {owner}/{repo}@{sha}")))
    }
}
