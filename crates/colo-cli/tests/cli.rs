use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CONFIG: &str = r#"
[grid]
topologies = ["standalone", "ac_coupled", "dc_coupled"]
pv_mw = [20]
bess_mw = [10]
duration_h = [2, 4]

[contract]
load_mw = 5
price_per_mwh = 70

[finance]
horizon_years = 10
"#;

fn synth(dir: &Path, hours: &str) {
    Command::cargo_bin("colo")
        .unwrap()
        .args([
            "synth",
            "--hours",
            hours,
            "--seed",
            "7",
            "--out",
            dir.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
}

#[test]
fn synth_writes_both_series() {
    let dir = tempdir().unwrap();
    synth(dir.path(), "48");
    let prices = fs::read_to_string(dir.path().join("prices.csv")).unwrap();
    let solar = fs::read_to_string(dir.path().join("solar.csv")).unwrap();
    assert_eq!(prices.lines().count(), 49);
    assert_eq!(solar.lines().count(), 49);
    assert!(prices.starts_with("timestamp,price"));
    assert!(solar.lines().nth(1).unwrap().starts_with("2023-01-01 00:00"));
}

#[test]
fn sweep_writes_table_and_manifest() {
    let dir = tempdir().unwrap();
    synth(dir.path(), "72");
    let config = dir.path().join("sweep.toml");
    fs::write(&config, CONFIG).unwrap();
    let out = dir.path().join("out");

    Command::cargo_bin("colo")
        .unwrap()
        .args([
            "sweep",
            "--config",
            config.to_str().unwrap(),
            "--prices",
            dir.path().join("prices.csv").to_str().unwrap(),
            "--solar",
            dir.path().join("solar.csv").to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--threads",
            "2",
            "--hours",
            "48",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("6 points"))
        .stdout(predicate::str::contains("ac_coupled"));

    let table = fs::read_to_string(out.join("sweep_results.csv")).unwrap();
    assert_eq!(table.lines().count(), 7);
    assert!(out.join("sweep_manifest.json").exists());
}

#[test]
fn dispatch_writes_hourly_series() {
    let dir = tempdir().unwrap();
    synth(dir.path(), "24");
    let config = dir.path().join("run.toml");
    fs::write(&config, CONFIG).unwrap();
    let out = dir.path().join("dispatch.csv");

    Command::cargo_bin("colo")
        .unwrap()
        .args([
            "dispatch",
            "--config",
            config.to_str().unwrap(),
            "--prices",
            dir.path().join("prices.csv").to_str().unwrap(),
            "--solar",
            dir.path().join("solar.csv").to_str().unwrap(),
            "--topology",
            "dc_coupled",
            "--pv-mw",
            "30",
            "--bess-mw",
            "10",
            "--duration-h",
            "2",
            "--out",
            out.to_str().unwrap(),
            "--hours",
            "24",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("NPV"))
        .stdout(predicate::str::contains("optimal"));

    let csv = fs::read_to_string(&out).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.contains("battery_soc"));
    assert!(header.contains("price_site"));
    assert_eq!(csv.lines().count(), 25);
}

fn sweep_without_hours(dir: &Path) -> assert_cmd::assert::Assert {
    let config = dir.join("sweep.toml");
    fs::write(&config, CONFIG).unwrap();
    Command::cargo_bin("colo")
        .unwrap()
        .args([
            "sweep",
            "--config",
            config.to_str().unwrap(),
            "--prices",
            dir.join("prices.csv").to_str().unwrap(),
            "--solar",
            dir.join("solar.csv").to_str().unwrap(),
            "--out",
            dir.join("out").to_str().unwrap(),
        ])
        .assert()
}

#[test]
fn truncated_year_is_a_data_error() {
    let dir = tempdir().unwrap();
    synth(dir.path(), "100");
    sweep_without_hours(dir.path())
        .failure()
        .stderr(predicate::str::contains("100 values"))
        .stderr(predicate::str::contains("8760"));
    assert!(!dir.path().join("out").join("sweep_results.csv").exists());
}

#[test]
fn overlong_series_is_a_data_error() {
    let dir = tempdir().unwrap();
    let mut prices = String::from("price\n");
    let mut solar = String::from("capacity_factor\n");
    for _ in 0..8761 {
        prices.push_str("50.0\n");
        solar.push_str("0.2\n");
    }
    fs::write(dir.path().join("prices.csv"), prices).unwrap();
    fs::write(dir.path().join("solar.csv"), solar).unwrap();
    sweep_without_hours(dir.path())
        .failure()
        .stderr(predicate::str::contains("8761 values"));
}

#[test]
fn unknown_finance_key_fails() {
    let dir = tempdir().unwrap();
    synth(dir.path(), "24");
    let config = dir.path().join("bad.toml");
    fs::write(&config, format!("{CONFIG}wacc = 0.07\n")).unwrap();

    Command::cargo_bin("colo")
        .unwrap()
        .args([
            "sweep",
            "--config",
            config.to_str().unwrap(),
            "--prices",
            dir.path().join("prices.csv").to_str().unwrap(),
            "--solar",
            dir.path().join("solar.csv").to_str().unwrap(),
            "--out",
            dir.path().join("out").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wacc"));
}

#[test]
fn unknown_topology_is_rejected_by_the_parser() {
    Command::cargo_bin("colo")
        .unwrap()
        .args([
            "dispatch",
            "--config",
            "run.toml",
            "--prices",
            "p.csv",
            "--solar",
            "s.csv",
            "--topology",
            "offshore",
            "--pv-mw",
            "1",
            "--bess-mw",
            "1",
            "--duration-h",
            "1",
            "--out",
            "out.csv",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("offshore"));
}
