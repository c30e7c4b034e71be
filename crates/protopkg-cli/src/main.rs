mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::file::FileArgs;
use commands::library::LibraryArgs;
use commands::package_set::PackageSetArgs;
use commands::push::PushArgs;
use commands::rules::RulesArgs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "protopkg",
    version,
    about = "Content-addressed packages for compiled protobuf descriptor sets"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a package from a compiled descriptor set.
    File(FileArgs),
    /// Build a package from repository and compiler info files.
    Library(LibraryArgs),
    /// Regroup prior packages into one package per schema namespace.
    PackageSet(PackageSetArgs),
    /// Publish packages to a package registry.
    Push(PushArgs),
    /// Generate protopkg_package build rules from directives.
    Rules(RulesArgs),
    /// Show the contents of a package or package-set file.
    Inspect {
        /// Binary or JSON package file.
        path: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PROTOPKG_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;
    let result = match &cli.command {
        Commands::File(args) => commands::file::run(args, json_output),
        Commands::Library(args) => commands::library::run(args, json_output),
        Commands::PackageSet(args) => commands::package_set::run(args, json_output),
        Commands::Push(args) => commands::push::run(args, json_output),
        Commands::Rules(args) => commands::rules::run(args, json_output),
        Commands::Inspect { path } => commands::inspect::run(path, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(failure) => {
            eprintln!("error: {}", failure.message);
            ExitCode::from(failure.code)
        }
    }
}
