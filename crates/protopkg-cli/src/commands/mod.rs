pub mod completions;
pub mod file;
pub mod inspect;
pub mod library;
pub mod package_set;
pub mod push;
pub mod rules;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use prost::Message;
use protopkg_core::{
    build_archive, CoreError, ErrorCategory, MissingDependencyPolicy, Pipeline, PipelineOptions,
    SourceMap,
};
use protopkg_remote::{
    CommitDetails, CommitSource, GithubCommitSource, GithubConfig, RemoteError,
    StaticCommitSource,
};
use protopkg_rules::RulesError;
use protopkg_schema::{
    read_packages, write_binary, write_json, Archive, ArchiveSpec, Compiler, PackageRecord,
    RawDescriptor, SchemaError,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_DATA_ERROR: u8 = 3;
pub const EXIT_IO_ERROR: u8 = 4;

/// A failed command: the message for stderr and the process exit code.
#[derive(Debug)]
pub struct Failure {
    pub code: u8,
    pub message: String,
}

impl Failure {
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            code: EXIT_CONFIG_ERROR,
            message: message.into(),
        }
    }
}

impl From<CoreError> for Failure {
    fn from(e: CoreError) -> Self {
        let code = match e.category() {
            ErrorCategory::Config => EXIT_CONFIG_ERROR,
            ErrorCategory::Data => EXIT_DATA_ERROR,
            ErrorCategory::Io => EXIT_IO_ERROR,
        };
        Self {
            code,
            message: e.to_string(),
        }
    }
}

impl From<SchemaError> for Failure {
    fn from(e: SchemaError) -> Self {
        CoreError::from(e).into()
    }
}

impl From<RemoteError> for Failure {
    fn from(e: RemoteError) -> Self {
        CoreError::from(e).into()
    }
}

impl From<RulesError> for Failure {
    fn from(e: RulesError) -> Self {
        let code = match e {
            RulesError::Io { .. } => EXIT_IO_ERROR,
            RulesError::IndexLabel { .. } => EXIT_DATA_ERROR,
            _ => EXIT_CONFIG_ERROR,
        };
        Self {
            code,
            message: e.to_string(),
        }
    }
}

pub type CommandResult = Result<u8, Failure>;

pub fn json_pretty(value: &impl Serialize) -> Result<String, Failure> {
    serde_json::to_string_pretty(value).map_err(|e| Failure {
        code: EXIT_FAILURE,
        message: format!("JSON serialization failed: {e}"),
    })
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_done(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg.to_owned());
}

/// Where a produced record is written. At least one target is required.
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Write the record in binary protobuf form.
    #[arg(long)]
    pub proto_out: Option<PathBuf>,
    /// Write the record as indented JSON.
    #[arg(long)]
    pub json_out: Option<PathBuf>,
}

impl OutputArgs {
    pub fn require(&self) -> Result<(), Failure> {
        if self.proto_out.is_none() && self.json_out.is_none() {
            return Err(Failure::config(
                "at least one of --proto-out or --json-out is required",
            ));
        }
        Ok(())
    }

    pub fn write<T: Message + Serialize>(&self, record: &T) -> Result<Vec<PathBuf>, Failure> {
        self.require()?;
        let mut written = Vec::new();
        if let Some(path) = &self.proto_out {
            write_binary(path, record)?;
            written.push(path.clone());
        }
        if let Some(path) = &self.json_out {
            write_json(path, record)?;
            written.push(path.clone());
        }
        Ok(written)
    }
}

/// Version-control coordinates of the schema files.
#[derive(Debug, Clone, Default, Args)]
pub struct RepoArgs {
    #[arg(long, default_value = "")]
    pub repo_host: String,
    #[arg(long, default_value = "")]
    pub repo_owner: String,
    #[arg(long, default_value = "")]
    pub repo_name: String,
    #[arg(long, default_value = "")]
    pub repo_commit: String,
    /// Path prefix of the schema files inside the repository.
    #[arg(long, default_value = "")]
    pub repo_root: String,
}

impl RepoArgs {
    pub fn to_spec(&self) -> ArchiveSpec {
        ArchiveSpec {
            host: self.repo_host.clone(),
            owner: self.repo_owner.clone(),
            repo: self.repo_name.clone(),
            commit: self.repo_commit.clone(),
            root: self.repo_root.clone(),
        }
    }
}

/// How commit details are obtained.
#[derive(Debug, Clone, Default, Args)]
pub struct CommitArgs {
    /// JSON file with `message`, `author_email` and `time` for the commit,
    /// used instead of querying the source-hosting service.
    #[arg(long)]
    pub commit_details: Option<PathBuf>,
    /// Base URL of the GitHub API.
    #[arg(long)]
    pub github_api: Option<String>,
    /// Directory for cached commit lookups.
    #[arg(long)]
    pub github_cache_dir: Option<PathBuf>,
}

impl CommitArgs {
    pub fn source(&self, spec: &ArchiveSpec) -> Result<Box<dyn CommitSource>, Failure> {
        if let Some(path) = &self.commit_details {
            let data = std::fs::read(path).map_err(|e| SchemaError::read(path, e))?;
            let details: CommitDetails = serde_json::from_slice(&data).map_err(|e| {
                Failure::config(format!("invalid commit details {}: {e}", path.display()))
            })?;
            return Ok(Box::new(StaticCommitSource::new().with_commit(
                spec.owner.trim(),
                spec.repo.trim(),
                spec.commit.trim(),
                details,
            )));
        }

        let mut config = GithubConfig::from_env();
        if let Some(url) = &self.github_api {
            config = config.with_api_url(url);
        }
        if let Some(dir) = &self.github_cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        Ok(Box::new(GithubCommitSource::new(config)))
    }

    pub fn archive(&self, spec: &ArchiveSpec) -> Result<Archive, Failure> {
        spec.validate()?;
        let source = self.source(spec)?;
        Ok(build_archive(spec, source.as_ref())?)
    }
}

/// Prior packages and the policy for imports none of them provide.
#[derive(Debug, Clone, Default, Args)]
pub struct DepsArgs {
    /// Prior package or package-set files, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub deps: Vec<PathBuf>,
    /// What to do with an import no known file provides: fail or omit.
    #[arg(long, default_value = "fail")]
    pub missing_deps: MissingDependencyPolicy,
}

impl DepsArgs {
    pub fn load(&self) -> Result<Vec<PackageRecord>, Failure> {
        load_packages(&self.deps)
    }
}

/// Read every listed package or package-set file, in order.
pub fn load_packages(paths: &[PathBuf]) -> Result<Vec<PackageRecord>, Failure> {
    let mut packages = Vec::new();
    for path in paths {
        packages.extend(read_packages(path)?);
    }
    Ok(packages)
}

/// Run the single-package pipeline and write the result.
pub fn build_and_write(
    descriptors: &[RawDescriptor],
    archive: Archive,
    compiler: Compiler,
    sources: Option<&str>,
    deps: &DepsArgs,
    output: &OutputArgs,
    json: bool,
) -> CommandResult {
    let sources = match sources {
        Some(list) => Some(SourceMap::load_list(list)?),
        None => None,
    };
    let prior = deps.load()?;
    let mut pipeline = Pipeline::new(PipelineOptions {
        missing_deps: deps.missing_deps,
        ..Default::default()
    })
    .with_dependencies(&prior)?;
    let pkg = pipeline.build_package(descriptors, archive, compiler, sources.as_ref())?;
    let written = output.write(&pkg)?;
    report_package(&pkg, &written, json)
}

pub fn report_package(pkg: &PackageRecord, written: &[PathBuf], json: bool) -> CommandResult {
    if json {
        let payload = serde_json::json!({
            "name": pkg.name,
            "hash": pkg.hash,
            "key": pkg.key().as_str(),
            "files": pkg.files.len(),
            "dependencies": pkg.dependencies,
            "written": written,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("built {} ({} files)", pkg.name, pkg.files.len());
        println!("hash: {}", pkg.hash);
        for path in written {
            println!("wrote {}", path.display());
        }
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_CONFIG_ERROR,
            EXIT_DATA_ERROR,
            EXIT_IO_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn core_errors_map_to_exit_codes() {
        let f = Failure::from(CoreError::Config("x".to_owned()));
        assert_eq!(f.code, EXIT_CONFIG_ERROR);
        let f = Failure::from(CoreError::SourceNotFound("a.proto".to_owned()));
        assert_eq!(f.code, EXIT_DATA_ERROR);
        let f = Failure::from(SchemaError::Read {
            path: "x".to_owned(),
            source: std::io::Error::other("gone"),
        });
        assert_eq!(f.code, EXIT_IO_ERROR);
    }

    #[test]
    fn rules_errors_map_to_exit_codes() {
        let f = Failure::from(RulesError::UnknownParam("visibility".to_owned()));
        assert_eq!(f.code, EXIT_CONFIG_ERROR);
    }

    #[test]
    fn output_requires_a_target() {
        let out = OutputArgs {
            proto_out: None,
            json_out: None,
        };
        let err = out.require().unwrap_err();
        assert_eq!(err.code, EXIT_CONFIG_ERROR);
        assert!(err.message.contains("--proto-out"));
    }

    #[test]
    fn output_writes_both_forms() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputArgs {
            proto_out: Some(dir.path().join("p.pb")),
            json_out: Some(dir.path().join("p.json")),
        };
        let pkg = PackageRecord {
            name: "n".to_owned(),
            hash: "blake3.v0:00".to_owned(),
            ..Default::default()
        };
        let written = out.write(&pkg).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
    }

    #[test]
    fn commit_details_file_feeds_static_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.json");
        std::fs::write(
            &path,
            r#"{"message":"m","author_email":"a@b.c","time":"2024-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        let args = CommitArgs {
            commit_details: Some(path),
            ..Default::default()
        };
        let spec = ArchiveSpec {
            host: "github.com".to_owned(),
            owner: "acme".to_owned(),
            repo: "x".to_owned(),
            commit: "abcdef1234".to_owned(),
            root: String::new(),
        };
        let archive = args.archive(&spec).unwrap();
        assert_eq!(archive.commit_author, "a@b.c");
        assert_eq!(archive.commit_time, "2024-01-02T03:04:05Z");
    }

    #[test]
    fn missing_repo_field_is_config_error() {
        let args = CommitArgs::default();
        let err = args.archive(&RepoArgs::default().to_spec()).unwrap_err();
        assert_eq!(err.code, EXIT_CONFIG_ERROR);
    }
}
