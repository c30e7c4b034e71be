use super::{json_pretty, load_packages, CommandResult, EXIT_SUCCESS};
use protopkg_schema::PackageSet;
use std::path::Path;

pub fn run(path: &Path, json: bool) -> CommandResult {
    let packages = load_packages(&[path.to_path_buf()])?;
    if json {
        println!("{}", json_pretty(&PackageSet { packages })?);
        return Ok(EXIT_SUCCESS);
    }

    for (i, pkg) in packages.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("name:      {}", pkg.name);
        println!("key:       {}", pkg.key());
        println!("hash:      {}", pkg.hash);
        if let Some(archive) = &pkg.archive {
            println!("archive:   {}@{}", archive.location(), archive.short_sha1);
            if !archive.commit_author.is_empty() {
                println!("author:    {}", archive.commit_author);
            }
        }
        if let Some(compiler) = &pkg.compiler {
            println!("compiler:  {} {}", compiler.name, compiler.version);
        }
        println!("files:     {}", pkg.files.len());
        for file in &pkg.files {
            println!("  {}", file.key());
        }
        println!("deps:      {}", pkg.dependencies.len());
        for dep in &pkg.dependencies {
            println!("  {dep}");
        }
    }
    Ok(EXIT_SUCCESS)
}
