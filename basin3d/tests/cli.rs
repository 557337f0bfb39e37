use std::path::Path;

use assert_cmd::Command as AssertCmd;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;

const ALPHA_MAPPING: &str = "\
basin3d_id,datasource_name,description,sampling_medium,categories
ACT,Acetate,Acetate (CH3COO),WATER,\"Biogeochemistry,Anions\"
Al,Aluminum,Aluminum (Al),WATER,\"Biogeochemistry,Trace elements\"
";

const USGS_MAPPING: &str = "\
broker_id,datasource_vocab,description,sampling_medium,categories
Hg,50287,Mercury water filtered,WATER,Metals
";

fn basin3d() -> AssertCmd {
    let mut cmd = AssertCmd::cargo_bin("basin3d").unwrap();
    cmd.env_remove("BASIN3D_PLUGIN_MANIFEST")
        .env_remove("BASIN3D_VOCABULARY")
        .env_remove("BASIN3D_CATALOG_FILE");
    cmd
}

fn deployment() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alpha.csv"), ALPHA_MAPPING).unwrap();
    std::fs::write(dir.path().join("usgs.csv"), USGS_MAPPING).unwrap();
    std::fs::write(
        dir.path().join("plugins.json"),
        r#"{
            "plugins": [
                {"id": "Alpha", "name": "Alpha Lab", "id_prefix": "A", "location": "https://alpha.example", "mapping": "alpha.csv"},
                {"id": "USGS", "id_prefix": "USGS", "location": "https://waterservices.usgs.gov/nwis/", "mapping": "usgs.csv"},
                {"id": "Ghost", "id_prefix": "G", "location": "https://ghost.example", "mapping": "ghost.csv"}
            ]
        }"#,
    )
    .unwrap();
    dir
}

fn init(dir: &Path) -> String {
    let output = basin3d()
        .arg("init")
        .arg("--plugin-manifest")
        .arg(dir.join("plugins.json"))
        .arg("--catalog-file")
        .arg(dir.join("catalog.json"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).unwrap()
}

fn show(dir: &Path, args: &[&str]) -> Vec<Value> {
    let output = basin3d()
        .arg("show")
        .args(args)
        .arg("--catalog-file")
        .arg(dir.join("catalog.json"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn init_then_show_properties() {
    let dir = deployment();
    let summary = init(dir.path());
    assert!(
        summary.contains("plugins loaded: 2, plugins failed: 1, rows applied: 3, rows skipped: 0"),
        "{summary}"
    );
    assert!(dir.path().join("catalog.json").exists());

    let records = show(dir.path(), &["properties", "--datasource", "Alpha", "--names", "ACT"]);
    assert_eq!(
        vec![json!({
            "sampling_medium": "WATER",
            "datasource_variable": "Acetate",
            "datasource_description": "Acetate (CH3COO)",
            "observed_property_variable": {
                "basin3d_id": "ACT",
                "full_name": "Acetate (CH3COO)",
                "categories": ["Biogeochemistry", "Anions"]
            },
            "datasource": {
                "id": "Alpha",
                "name": "Alpha Lab",
                "id_prefix": "A",
                "location": "https://alpha.example"
            }
        })],
        records
    );
}

#[test]
fn show_variables_with_prefixed_names() {
    let dir = deployment();
    init(dir.path());

    let all = show(dir.path(), &["variables", "--from-canonical"]);
    let ids: Vec<_> = all.iter().map(|v| v["basin3d_id"].clone()).collect();
    assert_eq!(vec![json!("ACT"), json!("Al"), json!("Hg")], ids);

    let by_local = show(dir.path(), &["variables", "--names", "USGS-50287,A-Aluminum"]);
    let ids: Vec<_> = by_local.iter().map(|v| v["basin3d_id"].clone()).collect();
    assert_eq!(vec![json!("Al"), json!("Hg")], ids);

    let unknown = show(dir.path(), &["variables", "--datasource", "Nowhere"]);
    assert!(unknown.is_empty());
}

#[test]
fn repeated_init_is_stable() {
    let dir = deployment();
    init(dir.path());
    let first = std::fs::read_to_string(dir.path().join("catalog.json")).unwrap();
    init(dir.path());
    let second = std::fs::read_to_string(dir.path().join("catalog.json")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn show_requires_a_catalog_file() {
    let output = basin3d()
        .args(["show", "variables"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.contains("--catalog-file is required"), "{stderr}");
}

#[test]
fn init_fails_on_unreadable_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let output = basin3d()
        .arg("init")
        .arg("--plugin-manifest")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.contains("discovering plugins"), "{stderr}");
}
