// tests/cli_test.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::File;
use tempfile::tempdir;

// 辅助函数: HOME 指向临时目录，避免读写真实的配置文件
fn main_command(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("HOME", home)
        .env_remove("AMDL_SERVER")
        .env_remove("AMDL_COOKIE");
    cmd
}

#[test]
fn test_help_flag() {
    let home = tempdir().unwrap();
    main_command(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("显示此帮助信息并退出"))
        .stdout(predicate::str::contains("--watch"));
}

#[test]
fn test_missing_mode_shows_help() {
    let home = tempdir().unwrap();
    main_command(home.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: amdl-monitor"));
}

#[test]
fn test_modes_conflict() {
    let home = tempdir().unwrap();
    main_command(home.path())
        .args(["--watch", "--notices"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_limit_out_of_range() {
    let home = tempdir().unwrap();
    main_command(home.path())
        .args(["--search", "1989", "--limit", "51"])
        .assert()
        .failure();
}

#[test]
fn test_empty_batch_file_is_rejected() {
    let home = tempdir().unwrap();
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("links.txt");
    File::create(&file_path).unwrap();

    main_command(home.path())
        .arg("-b")
        .arg(&file_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("为空"));
}

#[test]
fn test_submit_without_valid_links_fails_before_network() {
    let home = tempdir().unwrap();
    main_command(home.path())
        .args(["--server", "http://127.0.0.1:9", "-s", "hello", "world"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("输入内容均不是有效的 Apple Music 链接"));
}
