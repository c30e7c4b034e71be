//! CLI subprocess integration tests.
//!
//! These tests invoke the `protopkg` binary as a subprocess and verify exit
//! codes, written records, and JSON output. Commit details come from a local
//! file so no test touches the network.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use prost::Message;
use prost_types::{DescriptorProto, FileDescriptorProto, FileDescriptorSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn protopkg_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_protopkg"));
    cmd.env_remove("PROTOPKG_LOG");
    cmd
}

fn proto(name: &str, package: &str, deps: &[&str]) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_owned()),
        package: Some(package.to_owned()),
        dependency: deps.iter().map(|d| (*d).to_owned()).collect(),
        message_type: vec![DescriptorProto {
            name: Some(format!("M{}", name.len())),
            ..Default::default()
        }],
        syntax: Some("proto3".to_owned()),
        ..Default::default()
    }
}

fn write_descriptor_set(dir: &Path, file_name: &str, files: Vec<FileDescriptorProto>) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, FileDescriptorSet { file: files }.encode_to_vec()).unwrap();
    path
}

fn write_commit_details(dir: &Path) -> PathBuf {
    let path = dir.join("commit.json");
    std::fs::write(
        &path,
        r#"{"message": "add api", "author_email": "dev@acme.test", "time": "2024-05-01T12:00:00Z"}"#,
    )
    .unwrap();
    path
}

fn s(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// `protopkg file` with every flag but the repository owner.
fn file_command(dir: &Path, descriptor_set: &Path) -> Command {
    let commit = write_commit_details(dir);
    let mut cmd = protopkg_bin();
    cmd.args([
        "file",
        "--descriptor-set",
        &s(descriptor_set),
        "--compiler-name",
        "protoc",
        "--repo-host",
        "github.com",
        "--repo-name",
        "schemas",
        "--repo-commit",
        "abcdef1234567",
        "--commit-details",
        &s(&commit),
    ]);
    cmd
}

fn build_file(dir: &Path, descriptor_set: &Path, extra: &[&str]) -> Output {
    file_command(dir, descriptor_set)
        .args(["--repo-owner", "acme"])
        .args(extra)
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[test]
fn cli_version_exits_zero() {
    let output = protopkg_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "protopkg --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("protopkg"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let output = protopkg_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["file", "library", "package-set", "push", "rules", "inspect"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}': {stdout}");
    }
}

#[test]
fn cli_file_writes_both_renderings() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme", &[])]);
    let pb = dir.path().join("out.pb");
    let json = dir.path().join("out.json");

    let output = build_file(
        dir.path(),
        &set,
        &["--proto-out", &s(&pb), "--json-out", &s(&json)],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(pb.exists());

    let record = read_json(&json);
    assert_eq!(record["name"], "github.com/acme/schemas:a.proto@abcdef1234567");
    assert!(record["hash"].as_str().unwrap().starts_with("blake3.v0:"));
    assert_eq!(record["archive"]["commit_author"], "dev@acme.test");
    assert_eq!(record["archive"]["short_sha1"], "abcdef1");
}

#[test]
fn cli_file_json_summary() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme", &[])]);
    let pb = dir.path().join("out.pb");

    let output = build_file(dir.path(), &set, &["--json", "--proto-out", &s(&pb)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["files"], 1);
    assert!(summary["key"]
        .as_str()
        .unwrap()
        .starts_with("github.com/acme/schemas/~@blake3.v0:"));
}

#[test]
fn cli_file_without_output_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme", &[])]);
    let output = build_file(dir.path(), &set, &[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--proto-out"));
}

#[test]
fn cli_file_missing_repo_field_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme", &[])]);
    let pb = dir.path().join("out.pb");
    let output = file_command(dir.path(), &set)
        .args(["--proto-out", &s(&pb)])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("archive.owner"));
    assert!(!pb.exists(), "no output on failure");
}

#[test]
fn cli_file_unresolved_import_is_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_descriptor_set(
        dir.path(),
        "b.pb",
        vec![proto("b.proto", "acme", &["a.proto"])],
    );
    let pb = dir.path().join("out.pb");
    let output = build_file(dir.path(), &set, &["--proto-out", &s(&pb)]);
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("a.proto"));
    assert!(!pb.exists());
}

#[test]
fn cli_file_omit_policy_leaves_edge_out() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_descriptor_set(
        dir.path(),
        "b.pb",
        vec![proto("b.proto", "acme", &["a.proto"])],
    );
    let json = dir.path().join("out.json");
    let output = build_file(
        dir.path(),
        &set,
        &["--missing-deps", "omit", "--json-out", &s(&json)],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = read_json(&json);
    assert!(record["files"][0]["dependencies"]
        .as_array()
        .map_or(true, Vec::is_empty));
}

#[test]
fn cli_invalid_missing_deps_value_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme", &[])]);
    let output = build_file(dir.path(), &set, &["--missing-deps", "ignore"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_dependent_build_then_package_set() {
    let dir = tempfile::tempdir().unwrap();
    let a_set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme.types", &[])]);
    let a_out = dir.path().join("a.pkg.pb");
    let output = build_file(dir.path(), &a_set, &["--proto-out", &s(&a_out)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let b_set = write_descriptor_set(
        dir.path(),
        "b.pb",
        vec![proto("b.proto", "acme.api", &["a.proto"])],
    );
    let b_out = dir.path().join("b.pkg.json");
    let output = build_file(
        dir.path(),
        &b_set,
        &["--deps", &s(&a_out), "--json-out", &s(&b_out)],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let b = read_json(&b_out);
    let dep = b["files"][0]["dependencies"][0].as_str().unwrap();
    assert!(dep.starts_with("a.proto@blake3.v0:"), "{dep}");
    assert_eq!(b["dependencies"].as_array().unwrap().len(), 1);

    let config = dir.path().join("set.json");
    std::fs::write(
        &config,
        serde_json::json!({
            "direct_deps": [s(&b_out)],
            "transitive_deps": [s(&a_out)],
        })
        .to_string(),
    )
    .unwrap();
    let set_out = dir.path().join("set.out.json");
    let output = protopkg_bin()
        .args(["package-set", "--config", &s(&config), "--json-out", &s(&set_out)])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let set = read_json(&set_out);
    let packages = set["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0]["name"], "acme.api");
    assert_eq!(packages[1]["name"], "acme.types");
    assert_eq!(packages[0]["dependencies"].as_array().unwrap().len(), 1);

    let inspect = protopkg_bin()
        .args(["inspect", &s(&set_out)])
        .output()
        .unwrap();
    assert!(inspect.status.success());
    let text = String::from_utf8_lossy(&inspect.stdout);
    assert!(text.contains("acme.api"));
    assert!(text.contains("b.proto@blake3.v0:"));
}

#[test]
fn cli_package_set_unknown_provider_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let b_set = write_descriptor_set(
        dir.path(),
        "b.pb",
        vec![proto("b.proto", "acme.api", &["a.proto"])],
    );
    let b_out = dir.path().join("b.pkg.json");
    let output = build_file(
        dir.path(),
        &b_set,
        &["--missing-deps", "omit", "--json-out", &s(&b_out)],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let config = dir.path().join("set.json");
    std::fs::write(&config, serde_json::json!({ "direct_deps": [s(&b_out)] }).to_string()).unwrap();
    let output = protopkg_bin()
        .args([
            "package-set",
            "--config",
            &s(&config),
            "--proto-out",
            &s(&dir.path().join("set.pb")),
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("unknown provider for import 'a.proto'"));
}

#[test]
fn cli_library_upgrades_legacy_package() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = dir.path().join("legacy.json");
    let asset = STANDARD.encode(proto("a.proto", "acme", &[]).encode_to_vec());
    std::fs::write(
        &legacy,
        serde_json::json!({
            "location": {
                "repository": { "server": "github.com", "owner": "acme", "name": "schemas" },
                "commit": "abcdef1234567",
                "prefix": "proto",
            },
            "compiler": { "name": "protoc", "version": "3.21.0" },
            "assets": [ { "file": asset } ],
        })
        .to_string(),
    )
    .unwrap();
    let commit = write_commit_details(dir.path());
    let out = dir.path().join("pkg.json");

    let output = protopkg_bin()
        .args([
            "library",
            "--upgrade",
            &s(&legacy),
            "--commit-details",
            &s(&commit),
            "--json-out",
            &s(&out),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let record = read_json(&out);
    assert_eq!(record["name"], "github.com/acme/schemas/proto:a.proto@abcdef1234567");
    assert_eq!(record["compiler"]["version"], "3.21.0");
    assert!(record["files"][0]["hash"].as_str().unwrap().starts_with("blake3.v0:"));
}

#[test]
fn cli_library_from_info_files() {
    let dir = tempfile::tempdir().unwrap();
    let repo_info = dir.path().join("proto_repository_info.json");
    std::fs::write(
        &repo_info,
        r#"{"commit": "abcdef1234567", "source_host": "github.com", "source_owner": "acme", "source_repo": "schemas"}"#,
    )
    .unwrap();
    let version = dir.path().join("version.txt");
    std::fs::write(&version, "libprotoc 25.1\n").unwrap();
    let compiler_info = dir.path().join("compiler.json");
    std::fs::write(
        &compiler_info,
        serde_json::json!({ "name": "protoc", "version_file": s(&version) }).to_string(),
    )
    .unwrap();
    let set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme", &[])]);
    let commit = write_commit_details(dir.path());
    let out = dir.path().join("pkg.json");

    let output = protopkg_bin()
        .args([
            "library",
            "--repository-info",
            &s(&repo_info),
            "--compiler-info",
            &s(&compiler_info),
            "--descriptor-set",
            &s(&set),
            "--commit-details",
            &s(&commit),
            "--json-out",
            &s(&out),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = read_json(&out);
    assert_eq!(record["compiler"]["version"], "libprotoc 25.1");
    assert_eq!(record["archive"]["commit_message"], "add api");
}

#[test]
fn cli_library_empty_compiler_name_fails_before_commit_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let repo_info = dir.path().join("proto_repository_info.json");
    std::fs::write(
        &repo_info,
        r#"{"commit": "abcdef1234567", "source_host": "github.com", "source_owner": "acme", "source_repo": "schemas"}"#,
    )
    .unwrap();
    let compiler_info = dir.path().join("compiler.json");
    std::fs::write(&compiler_info, r#"{"name": ""}"#).unwrap();
    let set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme", &[])]);

    // Nothing listens on the API address, so a lookup would exit with 4.
    let output = protopkg_bin()
        .args([
            "library",
            "--repository-info",
            &s(&repo_info),
            "--compiler-info",
            &s(&compiler_info),
            "--descriptor-set",
            &s(&set),
            "--github-api",
            "http://127.0.0.1:1",
            "--json-out",
            &s(&dir.path().join("pkg.json")),
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("compiler name is required"));
}

#[test]
fn cli_rules_renders_directives() {
    let dir = tempfile::tempdir().unwrap();
    let directives = dir.path().join("BUILD.bazel");
    std::fs::write(&directives, "# gazelle:protopkg_package all repo acme\n").unwrap();
    let index = dir.path().join("index.csv");
    std::fs::write(
        &index,
        "protobuf,protopkg_file,a.proto,@acme//api:a_protopkg_file\n\
         protobuf,protopkg_file,x.proto,@other//x:x_protopkg_file\n",
    )
    .unwrap();

    let output = protopkg_bin()
        .args(["rules", "--directives", &s(&directives), "--index", &s(&index)])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.starts_with("protopkg_package(\n    name = \"all\","));
    assert!(text.contains("\"@acme//api:a_protopkg_file\""));
    assert!(!text.contains("@other"));
}

#[test]
fn cli_rules_library_package_wraps_proto_libraries() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.csv");
    std::fs::write(
        &index,
        "proto,proto,a.proto,//api:a_proto\n\
         proto,proto,b.proto,//other:b_proto\n",
    )
    .unwrap();

    let output = protopkg_bin()
        .args(["rules", "--index", &s(&index), "--library-package", "//api"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        text,
        "protopkg_library(\n    name = \"a_pkg\",\n    deps = [\n        \":a_proto\",\n    ],\n)\n"
    );
}

#[test]
fn cli_rules_unknown_param_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let directives = dir.path().join("rules.toml");
    std::fs::write(&directives, "[package.all]\nvisibility = \"public\"\n").unwrap();
    let output = protopkg_bin()
        .args(["rules", "--directives", &s(&directives)])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_push_unreachable_registry_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_descriptor_set(dir.path(), "a.pb", vec![proto("a.proto", "acme", &[])]);
    let pkg = dir.path().join("a.pkg.pb");
    assert!(build_file(dir.path(), &set, &["--proto-out", &s(&pkg)]).status.success());

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let output = protopkg_bin()
        .args([
            "push",
            "--packages",
            &s(&pkg),
            "--address",
            &format!("127.0.0.1:{port}"),
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4), "stderr: {}", stderr(&output));
}

#[test]
fn cli_inspect_missing_file_is_io_error() {
    let output = protopkg_bin()
        .args(["inspect", "/nonexistent/pkg.pb"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn cli_completions_bash() {
    let output = protopkg_bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("protopkg"));
}
