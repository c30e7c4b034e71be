use super::{build_and_write, CommandResult, CommitArgs, DepsArgs, Failure, OutputArgs};
use clap::Args;
use protopkg_schema::legacy::{CompilerInfo, LegacyPackage, RepositoryInfo};
use protopkg_schema::{read_trimmed, split_descriptor_set, Compiler, SchemaError};
use std::path::{Path, PathBuf};
use tracing::info;

/// Build inputs as written by the build rules: a repository info file, a
/// compiler info file and the compiled descriptor set. With `--upgrade`, a
/// first-generation package file supplies all three instead.
#[derive(Debug, Clone, Args)]
pub struct LibraryArgs {
    #[arg(long, required_unless_present = "upgrade")]
    pub repository_info: Option<PathBuf>,
    #[arg(long, required_unless_present = "upgrade")]
    pub compiler_info: Option<PathBuf>,
    #[arg(long, required_unless_present = "upgrade")]
    pub descriptor_set: Option<PathBuf>,
    /// Rebuild a first-generation package file in the current shape.
    #[arg(long, conflicts_with_all = ["repository_info", "compiler_info", "descriptor_set"])]
    pub upgrade: Option<PathBuf>,
    /// Schema source files, comma separated.
    #[arg(long)]
    pub source_files: Option<String>,
    #[command(flatten)]
    pub commits: CommitArgs,
    #[command(flatten)]
    pub deps: DepsArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn run(args: &LibraryArgs, json: bool) -> CommandResult {
    args.output.require()?;

    let (spec, compiler, descriptors) = if let Some(legacy) = &args.upgrade {
        let upgraded = LegacyPackage::load(legacy)?.upgrade()?;
        info!(
            "upgrading {} ({} files)",
            legacy.display(),
            upgraded.files.len()
        );
        (upgraded.archive, upgraded.compiler, upgraded.files)
    } else {
        let (Some(repo_info), Some(compiler_info), Some(descriptor_set)) = (
            &args.repository_info,
            &args.compiler_info,
            &args.descriptor_set,
        ) else {
            return Err(Failure::config(
                "--repository-info, --compiler-info and --descriptor-set are required",
            ));
        };
        let spec = RepositoryInfo::load(repo_info)?.to_archive_spec();
        let compiler_info = CompilerInfo::load(compiler_info)?;
        let version = if compiler_info.version_file.is_empty() {
            String::new()
        } else {
            read_trimmed(Path::new(&compiler_info.version_file))?
        };
        let compiler = Compiler {
            name: compiler_info.name,
            version,
        };
        let descriptors = split_descriptor_set(
            &std::fs::read(descriptor_set).map_err(|e| SchemaError::read(descriptor_set, e))?,
        )?;
        (spec, compiler, descriptors)
    };

    if compiler.name.trim().is_empty() {
        return Err(Failure::config("compiler name is required"));
    }
    let archive = args.commits.archive(&spec)?;
    build_and_write(
        &descriptors,
        archive,
        compiler,
        args.source_files.as_deref(),
        &args.deps,
        &args.output,
        json,
    )
}
