use crate::CoreError;
use chrono::SecondsFormat;
use protopkg_remote::CommitSource;
use protopkg_schema::{Archive, ArchiveSpec};
use tracing::info;

/// Validate `spec` and fill the archive's commit details from `commits`.
///
/// Validation runs before the lookup, and the lookup is required: a failed
/// lookup fails the build.
pub fn build_archive(spec: &ArchiveSpec, commits: &dyn CommitSource) -> Result<Archive, CoreError> {
    let mut archive = spec.to_archive()?;
    let repo = archive.repository.clone().unwrap_or_default();
    let details = commits.fetch_commit(&repo.owner, &repo.name, &archive.commit_sha1)?;

    archive.commit_message = details.message;
    archive.commit_author = details.author_email;
    archive.commit_time = details.time.to_rfc3339_opts(SecondsFormat::Secs, true);
    info!(
        "archive {}@{} by {}",
        archive.location(),
        archive.short_sha1,
        archive.commit_author
    );
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protopkg_remote::{CommitDetails, StaticCommitSource};

    fn spec() -> ArchiveSpec {
        ArchiveSpec {
            host: "github.com".to_owned(),
            owner: "acme".to_owned(),
            repo: "x".to_owned(),
            commit: "abcdef1234".to_owned(),
            root: "proto".to_owned(),
        }
    }

    fn commits() -> StaticCommitSource {
        StaticCommitSource::new().with_commit(
            "acme",
            "x",
            "abcdef1234",
            CommitDetails {
                message: "add api".to_owned(),
                author_email: "dev@acme.test".to_owned(),
                time: "2024-05-01T12:00:00Z".parse().unwrap(),
            },
        )
    }

    #[test]
    fn fills_commit_details() {
        let archive = build_archive(&spec(), &commits()).unwrap();
        assert_eq!(archive.commit_message, "add api");
        assert_eq!(archive.commit_author, "dev@acme.test");
        assert_eq!(archive.commit_time, "2024-05-01T12:00:00Z");
        assert_eq!(archive.short_sha1, "abcdef1");
        assert_eq!(archive.location(), "github.com/acme/x/proto");
    }

    #[test]
    fn invalid_spec_is_config_error_before_lookup() {
        let mut s = spec();
        s.host.clear();
        // An empty source would fail the lookup; the config error must win.
        let err = build_archive(&s, &StaticCommitSource::new()).unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Config);
        assert!(err.to_string().contains("archive.host"));
    }

    #[test]
    fn failed_lookup_is_fatal() {
        let err = build_archive(&spec(), &StaticCommitSource::new()).unwrap_err();
        assert!(matches!(err, CoreError::Remote(_)));
    }
}
