use super::{build_and_write, CommandResult, CommitArgs, DepsArgs, Failure, OutputArgs, RepoArgs};
use clap::Args;
use protopkg_schema::{read_trimmed, split_descriptor_set, Compiler, SchemaError};
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct FileArgs {
    /// Compiled `FileDescriptorSet`, in dependency order.
    #[arg(long)]
    pub descriptor_set: PathBuf,
    #[arg(long)]
    pub compiler_name: Option<String>,
    /// File holding the compiler version string.
    #[arg(long)]
    pub compiler_version_file: Option<PathBuf>,
    /// Schema source files, comma separated.
    #[arg(long)]
    pub source_files: Option<String>,
    #[command(flatten)]
    pub repo: RepoArgs,
    #[command(flatten)]
    pub commits: CommitArgs,
    #[command(flatten)]
    pub deps: DepsArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn run(args: &FileArgs, json: bool) -> CommandResult {
    args.output.require()?;
    let compiler_name = args.compiler_name.clone().unwrap_or_default();
    if compiler_name.trim().is_empty() {
        return Err(Failure::config("--compiler-name is required"));
    }
    let spec = args.repo.to_spec();
    let archive = args.commits.archive(&spec)?;

    let version = match &args.compiler_version_file {
        Some(path) => read_trimmed(path)?,
        None => String::new(),
    };
    let compiler = Compiler {
        name: compiler_name,
        version,
    };

    let data = std::fs::read(&args.descriptor_set)
        .map_err(|e| SchemaError::read(&args.descriptor_set, e))?;
    let descriptors = split_descriptor_set(&data)?;

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
