use super::{json_pretty, load_packages, CommandResult, Failure, OutputArgs, EXIT_SUCCESS};
use clap::Args;
use protopkg_core::Pipeline;
use protopkg_schema::SchemaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Args)]
pub struct PackageSetArgs {
    /// JSON file listing `direct_deps` and `transitive_deps` package files.
    #[arg(long)]
    pub config: PathBuf,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSetConfig {
    #[serde(default)]
    pub direct_deps: Vec<PathBuf>,
    #[serde(default)]
    pub transitive_deps: Vec<PathBuf>,
}

impl PackageSetConfig {
    pub fn load(path: &Path) -> Result<Self, Failure> {
        let data = std::fs::read(path).map_err(|e| SchemaError::read(path, e))?;
        serde_json::from_slice(&data)
            .map_err(|e| Failure::config(format!("invalid package-set config {}: {e}", path.display())))
    }
}

pub fn run(args: &PackageSetArgs, json: bool) -> CommandResult {
    args.output.require()?;
    let config = PackageSetConfig::load(&args.config)?;
    let direct = load_packages(&config.direct_deps)?;
    let transitive = load_packages(&config.transitive_deps)?;

    let set = Pipeline::build_package_set(&direct, &transitive)?;
    let written = args.output.write(&set)?;

    if json {
        let payload = serde_json::json!({
            "packages": set.packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "written": written,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("built package set ({} packages)", set.packages.len());
        for pkg in &set.packages {
            println!("  {} ({} files)", pkg.name, pkg.files.len());
        }
        for path in &written {
            println!("wrote {}", path.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
