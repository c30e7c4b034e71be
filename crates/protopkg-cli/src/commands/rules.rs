use super::{json_pretty, CommandResult, Failure, EXIT_SUCCESS};
use clap::Args;
use protopkg_rules::{generate_library_rules, generate_rules, render_rules, Directives, Label, ProvidedIndex};
use protopkg_schema::write_atomic;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct RulesArgs {
    /// Directive files (`.toml`, or build files with directive lines).
    #[arg(long, required_unless_present = "library_package")]
    pub directives: Vec<PathBuf>,
    /// Provided-import index files (`lang,imp_lang,import,label` lines).
    #[arg(long)]
    pub index: Vec<PathBuf>,
    /// Also emit a `protopkg_library` rule for each `proto_library` of this
    /// package, e.g. `@acme//api` or `//api`.
    #[arg(long)]
    pub library_package: Option<Label>,
    /// Write the generated rules here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &RulesArgs, json: bool) -> CommandResult {
    let mut directives = Directives::default();
    for path in &args.directives {
        directives.merge(Directives::load(path)?);
    }
    if directives.is_empty() && args.library_package.is_none() {
        return Err(Failure::config("no protopkg_package directives found"));
    }

    let mut index = ProvidedIndex::new();
    for path in &args.index {
        index.load_file(path)?;
    }

    let mut rules = generate_rules(&directives, &index);
    if let Some(library) = &args.library_package {
        rules.extend(generate_library_rules(&index, &library.repo, &library.package));
    }
    let text = render_rules(&rules);
    if let Some(path) = &args.out {
        write_atomic(path, text.as_bytes())?;
    }

    if json {
        let payload: Vec<_> = rules
            .iter()
            .map(|r| serde_json::json!({ "kind": r.kind, "name": r.name, "deps": r.deps }))
            .collect();
        println!("{}", json_pretty(&payload)?);
    } else if args.out.is_none() {
        print!("{text}");
    } else {
        println!("generated {} rule(s)", rules.len());
    }
    Ok(EXIT_SUCCESS)
}
