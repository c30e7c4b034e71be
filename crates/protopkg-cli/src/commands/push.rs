use super::{
    json_pretty, load_packages, spin_done, spinner, CommandResult, Failure, EXIT_SUCCESS,
};
use clap::Args;
use protopkg_remote::{HttpPackageRegistry, PackageRegistry, RemoteConfig, TransportPolicy};
use protopkg_schema::write_json;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct PushArgs {
    /// Package or package-set files to publish, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub packages: Vec<PathBuf>,
    /// Registry address (overrides the config file).
    #[arg(long)]
    pub address: Option<String>,
    /// Remote config file [default: ~/.config/protopkg/remote.json].
    #[arg(long)]
    pub remote_config: Option<PathBuf>,
    /// auto, secure or insecure.
    #[arg(long)]
    pub transport: Option<TransportPolicy>,
    /// Bearer token for the registry.
    #[arg(long)]
    pub token: Option<String>,
    /// Write the returned operation as JSON.
    #[arg(long)]
    pub operation_out: Option<PathBuf>,
}

impl PushArgs {
    fn remote_config(&self) -> Result<RemoteConfig, Failure> {
        let mut config = match (&self.address, &self.remote_config) {
            (Some(address), _) => RemoteConfig::new(address),
            (None, Some(path)) => RemoteConfig::load(path)?,
            (None, None) => RemoteConfig::load_default()
                .map_err(|e| Failure::config(format!("no --address and no remote config: {e}")))?,
        };
        if let Some(transport) = self.transport {
            config = config.with_transport(transport);
        }
        if let Some(token) = &self.token {
            config = config.with_token(token);
        }
        if config.address.is_empty() {
            return Err(Failure::config("registry address is empty"));
        }
        Ok(config)
    }
}

pub fn run(args: &PushArgs, json: bool) -> CommandResult {
    let config = args.remote_config()?;
    let packages = load_packages(&args.packages)?;
    let registry = HttpPackageRegistry::new(config);

    let pb = spinner(&format!("pushing {} packages…", packages.len()));
    let result = registry.create_packages(&packages);
    spin_done(&pb, if result.is_ok() { "push complete" } else { "push failed" });
    let op = result?;

    if let Some(path) = &args.operation_out {
        write_json(path, &op)?;
    }

    if json {
        println!("{}", json_pretty(&op)?);
    } else {
        println!(
            "pushed {} packages to {} (operation {}, {} accepted)",
            packages.len(),
            registry.url(),
            if op.name.is_empty() { "-" } else { op.name.as_str() },
            op.package_count
        );
    }
    Ok(EXIT_SUCCESS)
}
