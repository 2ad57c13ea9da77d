use anyhow::Result;
use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use pschem_database::{LibraryDescription, ViewKind};

const LIBRARY: &str = r#"{
    "name": "work",
    "cells": [
        {"name": "TOP", "views": [{"kind": "schematic", "elements": [
            {"type": "instance", "name": "U2", "library": "work", "cell": "INV"},
            {"type": "instance", "name": "U1", "library": "work", "cell": "INV"},
            {"type": "net_segment", "layers": ["net"], "start": {"x": 0, "y": 0}, "end": {"x": 10, "y": 0}},
            {"type": "net_segment", "layers": ["net"], "start": {"x": 4, "y": 0}, "end": {"x": 4, "y": 6}}
        ]}]},
        {"name": "INV", "views": [
            {"kind": "schematic", "elements": [
                {"type": "instance", "name": "M1", "library": "work", "cell": "nmos"}
            ]},
            {"kind": "symbol"}
        ]},
        {"name": "LOOP", "views": [{"kind": "schematic", "elements": [
            {"type": "instance", "name": "L1", "library": "work", "cell": "LOOP"}
        ]}]}
    ]
}"#;

fn pschem() -> Result<Command> {
    let mut cmd = Command::cargo_bin("pschem")?;
    cmd.env("CLICOLOR", "0").env("NO_COLOR", "1");
    Ok(cmd)
}

fn library(temp: &TempDir) -> Result<std::path::PathBuf> {
    let file = temp.child("lib.json");
    file.write_str(LIBRARY)?;
    Ok(file.path().to_path_buf())
}

#[test]
fn hierarchy_prints_the_sorted_tree() -> Result<()> {
    let temp = TempDir::new()?;
    let file = library(&temp)?;

    let output = pschem()?
        .arg("hierarchy")
        .arg(&file)
        .args(["--top", "TOP"])
        .assert()
        .success()
        .get_output()
        .clone();

    assert_eq!(
        String::from_utf8(output.stdout)?,
        "work/TOP/schematic\n\
         ├── U1 (INV)\n\
         │   └── M1 (nmos)\n\
         └── U2 (INV)\n\
         \u{20}   └── M1 (nmos)\n"
    );
    Ok(())
}

#[test]
fn hierarchy_depth_and_alias() -> Result<()> {
    let temp = TempDir::new()?;
    let file = library(&temp)?;

    let output = pschem()?
        .arg("h")
        .arg(&file)
        .args(["-t", "TOP", "--depth", "1", "--library", "mine"])
        .assert()
        .success()
        .get_output()
        .clone();

    assert_eq!(
        String::from_utf8(output.stdout)?,
        "mine/TOP/schematic\n├── U1 (INV)\n└── U2 (INV)\n"
    );
    Ok(())
}

#[test]
fn hierarchy_reports_missing_cells_and_recursion() -> Result<()> {
    let temp = TempDir::new()?;
    let file = library(&temp)?;

    let output = pschem()?
        .arg("hierarchy")
        .arg(&file)
        .args(["--top", "NAND"])
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(String::from_utf8(output.stderr)?.contains("Cell work/NAND not found"));

    let output = pschem()?
        .arg("hierarchy")
        .arg(&file)
        .args(["--top", "LOOP"])
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(String::from_utf8(output.stderr)?.contains("Recursive instantiation"));
    Ok(())
}

#[test]
fn check_repairs_and_prints_json() -> Result<()> {
    let temp = TempDir::new()?;
    let file = library(&temp)?;

    let output = pschem()?
        .arg("check")
        .arg(&file)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .clone();

    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("work/TOP/schematic: 3 added, 1 removed"));
    assert!(stderr.contains("Checked 3 schematic views: 3 elements added, 1 removed"));

    let description: LibraryDescription = serde_json::from_slice(&output.stdout)?;
    let top = &description.cells[0];
    assert_eq!(top.name, "TOP");
    let names: Vec<String> = top.views[0].elements.iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        [
            "instance U1",
            "instance U2",
            "net_segment (0, 0)-(4, 0)",
            "net_segment (4, 0)-(10, 0)",
            "net_segment (4, 0)-(4, 6)",
            "solder_dot (4, 0)",
        ]
    );
    Ok(())
}

#[test]
fn config_sets_user_units_of_new_views() -> Result<()> {
    let temp = TempDir::new()?;
    let file = library(&temp)?;
    let config = temp.child("pschem.toml");
    config.write_str("user_units = 100\n")?;

    let output = pschem()?
        .arg("check")
        .arg(&file)
        .arg("--json")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .get_output()
        .clone();

    let description: LibraryDescription = serde_json::from_slice(&output.stdout)?;
    let symbol = description.cells[1]
        .views
        .iter()
        .find(|v| v.kind == ViewKind::Symbol)
        .map(|v| v.attributes.get("uu").cloned());
    assert_eq!(symbol, Some(Some("100".to_owned())));
    Ok(())
}

#[test]
fn invalid_config_is_reported() -> Result<()> {
    let temp = TempDir::new()?;
    let file = library(&temp)?;
    let config = temp.child("pschem.toml");
    config.write_str("colour = \"red\"\n")?;

    let output = pschem()?
        .args(["--config"])
        .arg(config.path())
        .arg("check")
        .arg(&file)
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(String::from_utf8(output.stderr)?.contains("Failed to load config"));
    Ok(())
}

#[test]
fn check_follows_the_configured_implementation_view() -> Result<()> {
    let temp = TempDir::new()?;
    let file = library(&temp)?;
    let config = temp.child("pschem.toml");
    config.write_str("implementation_view = \"symbol\"\n")?;

    let output = pschem()?
        .arg("check")
        .arg(&file)
        .arg("--json")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .get_output()
        .clone();

    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Checked 1 symbol views: 0 elements added, 0 removed"));
    assert!(!stderr.contains("work/TOP/schematic"));

    // The schematic wires are left as they were.
    let description: LibraryDescription = serde_json::from_slice(&output.stdout)?;
    assert_eq!(description.cells[0].views[0].elements.len(), 4);
    Ok(())
}
