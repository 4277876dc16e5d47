use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rstest::*;
use serde_json::json;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[fixture]
fn data_dir() -> assert_fs::TempDir {
    let dir = assert_fs::TempDir::new().expect("failed to create temp dir");
    dir.child("image_comments.json")
        .write_str(
            &json!({
                "shirt.jpg": { "comment": "blue denim shirt", "tags": ["casual", "summer"] },
                "gone.jpg": { "comment": "image was removed", "tags": [] },
                "legacy.jpg": "plain comment",
            })
            .to_string(),
        )
        .expect("failed to write catalog");
    dir.child("images/shirt.jpg").write_binary(b"shirt").expect("failed to write image");
    dir.child("images/legacy.jpg").write_binary(b"legacy").expect("failed to write image");
    dir
}

#[rstest]
fn list_table(data_dir: assert_fs::TempDir) -> Result<()> {
    cargo_run!("outfitdb", "-d", data_dir.path(), "list")
        .success()
        .stdout(predicate::str::contains("shirt.jpg\tblue denim shirt\tcasual,summer"))
        .stdout(predicate::str::contains("legacy.jpg\tplain comment"))
        .stdout(predicate::str::contains("gone.jpg").not());
    Ok(())
}

#[rstest]
fn list_json(data_dir: assert_fs::TempDir) -> Result<()> {
    let output = Command::cargo_bin("outfitdb")?
        .arg("-d")
        .arg(data_dir.path())
        .args(["list", "--json"])
        .output()?;
    assert!(output.status.success());

    let items: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(items[0]["filename"], "shirt.jpg");
    assert_eq!(items[0]["image_url"], "/images/shirt.jpg");
    assert_eq!(items[1]["filename"], "legacy.jpg");
    assert_eq!(items.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[rstest]
fn list_empty() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    cargo_run!("outfitdb", "-d", dir.path(), "list").success().stdout(predicate::str::is_empty());
    dir.child("images").assert(predicate::path::is_dir());
    dir.child("segments").assert(predicate::path::is_dir());
    Ok(())
}

#[rstest]
fn analyze_requires_detector(data_dir: assert_fs::TempDir) -> Result<()> {
    cargo_run!("outfitdb", "-d", data_dir.path(), "analyze", data_dir.child("images/shirt.jpg").path())
        .failure()
        .stderr(predicate::str::contains("--detector"));
    Ok(())
}

#[rstest]
#[case("server")]
#[case("add")]
#[case("search")]
#[case("rebuild")]
#[case("delete")]
#[case("list")]
#[case("analyze")]
fn subcommand_help(#[case] subcmd: &str) -> Result<()> {
    cargo_run!("outfitdb", subcmd, "--help").success();
    Ok(())
}
