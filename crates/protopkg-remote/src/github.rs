use crate::config::GithubConfig;
use crate::{CommitDetails, CommitSource, RemoteError, USER_AGENT};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct GitCommit {
    #[serde(default)]
    message: String,
    author: Option<GitSignature>,
}

#[derive(Debug, Deserialize)]
struct GitSignature {
    #[serde(default)]
    email: String,
    date: DateTime<Utc>,
}

/// Commit lookup against the GitHub git-data API
/// (`GET /repos/{owner}/{repo}/git/commits/{sha}`).
///
/// Responses are cached on disk by request URL when a cache directory is
/// configured. Commits are immutable, so cached entries never expire.
pub struct GithubCommitSource {
    config: GithubConfig,
    agent: ureq::Agent,
}

impl GithubCommitSource {
    pub fn new(config: GithubConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { config, agent }
    }

    pub fn from_env() -> Self {
        Self::new(GithubConfig::from_env())
    }

    fn url(&self, owner: &str, repo: &str, sha: &str) -> String {
        format!(
            "{}/repos/{owner}/{repo}/git/commits/{sha}",
            self.config.api_url
        )
    }

    fn authorization(&self) -> Option<String> {
        match (&self.config.user, &self.config.token) {
            (Some(user), Some(token)) => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{user}:{token}"))
            )),
            (None, Some(token)) => Some(format!("Bearer {token}")),
            _ => None,
        }
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        self.config
            .cache_dir
            .as_ref()
            .map(|dir| dir.join(blake3::hash(url.as_bytes()).to_hex().as_str()))
    }

    fn do_get(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let mut req = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(auth) = self.authorization() {
            req = req.header("Authorization", &auth);
        }
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RemoteError::NotFound(url.to_owned()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => return Err(RemoteError::Http(e.to_string())),
        };

        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(body)
    }

    fn fetch_body(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let cache = self.cache_path(url);
        if let Some(path) = &cache {
            if let Ok(body) = std::fs::read(path) {
                debug!("commit cache hit: {url}");
                return Ok(body);
            }
        }

        debug!("GET {url}");
        let body = self.do_get(url)?;

        if let Some(path) = &cache {
            if let Err(e) = store_cached(path, &body) {
                warn!("failed to cache {url}: {e}");
            }
        }
        Ok(body)
    }
}

fn store_cached(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl CommitSource for GithubCommitSource {
    fn fetch_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CommitDetails, RemoteError> {
        let url = self.url(owner, repo, sha);
        let body = self.fetch_body(&url)?;
        let commit: GitCommit = serde_json::from_slice(&body)
            .map_err(|e| RemoteError::Serialization(format!("commit {sha}: {e}")))?;
        let author = commit.author.ok_or_else(|| {
            RemoteError::Serialization(format!("commit {sha}: response has no author"))
        })?;
        Ok(CommitDetails {
            message: commit.message,
            author_email: author.email,
            time: author.date,
        })
    }
}
