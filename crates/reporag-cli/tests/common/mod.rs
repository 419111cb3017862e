//! Shared test utilities for reporag-cli integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Get a Command for the reporag binary, with color off and no inherited
/// configuration.
#[allow(deprecated)]
pub fn reporag_cmd() -> Command {
    let mut cmd = Command::cargo_bin("reporag").expect("reporag binary should exist");
    cmd.env_remove("REPORAG_CONFIG")
        .env_remove("REPORAG_INDEX")
        .env_remove("RUST_LOG")
        .arg("--color")
        .arg("never");
    cmd
}

/// Write a small chunk index without vectors; the CLI embeds it on load.
pub fn write_index(dir: &Path) -> PathBuf {
    let records = [
        r#"{"id":"c1","text":"def login(user, password):\n    token = create_token(user)\n    return token","metadata":{"file_path":"src/auth/login.py","start_line":1,"end_line":40,"file_category":"code","language":"python","complexity_score":3}}"#,
        r#"{"id":"c2","text":"def logout(session):\n    session.invalidate()","metadata":{"file_path":"src/auth/login.py","start_line":41,"end_line":90,"file_category":"code","language":"python","complexity_score":8}}"#,
        r#"{"id":"c3","text":"Authentication overview: users log in with a password and receive a token.","metadata":{"file_path":"docs/auth.md","start_line":1,"end_line":30,"file_category":"docs","language":"markdown"}}"#,
        r#"{"id":"c4","text":"class User:\n    name: str\n    password_hash: str","metadata":{"file_path":"src/db/models.py","start_line":1,"end_line":60,"file_category":"code","language":"python","complexity_score":1}}"#,
    ];
    let path = dir.join("chunks.jsonl");
    fs::write(&path, records.join("\n")).expect("write index");
    path
}

/// Write a config file and return its path.
pub fn write_config(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("config.yaml");
    fs::write(&path, yaml).expect("write config");
    path
}
