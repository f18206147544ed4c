//! CLI-level tests for the `danton` front-end, using `assert_cmd`/`predicates` the way
//! `pineappl_cli/tests/*.rs` does.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn danton() -> Command {
    Command::cargo_bin("danton").unwrap()
}

#[test]
fn help_lists_the_documented_flags() {
    danton()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--cos-theta"))
        .stdout(predicate::str::contains("--grammage"))
        .stdout(predicate::str::contains("--pem-no-sea"))
        .stdout(predicate::str::contains("--output-file"));
}

#[test]
fn grammage_scan_with_a_fixed_angle_writes_one_data_line() {
    let temp = TempDir::new().unwrap();
    let out = temp.child("grammage.txt");

    danton()
        .current_dir(&temp)
        .args(["--grammage", "-c", "0.2", "-o"])
        .arg(out.path())
        .assert()
        .success();

    let contents = std::fs::read_to_string(out.path()).unwrap();
    let mut lines = contents.lines();
    assert!(lines.next().unwrap().contains("cos(theta)"), "first header line names the columns");
    assert!(lines.next().unwrap().contains("kg/m^2"), "second header line names the units");
    let data_lines: Vec<_> = lines.filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(data_lines.len(), 1, "a fixed cos(theta) collapses the scan to a single bin");
}

#[test]
fn missing_primary_pid_outside_grammage_mode_is_an_error() {
    let temp = TempDir::new().unwrap();
    danton()
        .current_dir(&temp)
        .args(["-n", "1"])
        .assert()
        .failure();
}

#[test]
fn inconsistent_cos_theta_range_is_rejected() {
    let temp = TempDir::new().unwrap();
    danton()
        .current_dir(&temp)
        .args(["16", "--cos-theta-min", "0.5", "--cos-theta-max", "0.1", "-n", "1"])
        .assert()
        .failure();
}

#[test]
fn energy_below_the_sampler_floor_is_rejected() {
    let temp = TempDir::new().unwrap();
    danton()
        .current_dir(&temp)
        .args(["16", "-e", "10", "-n", "1"])
        .assert()
        .failure();
}

#[test]
fn append_without_an_existing_file_still_writes_a_header() {
    let temp = TempDir::new().unwrap();
    let out = temp.child("appended.txt");

    danton()
        .current_dir(&temp)
        .args(["--grammage", "-c", "0.2", "--append", "-o"])
        .arg(out.path())
        .assert()
        .success();

    out.assert(predicate::path::exists());
    let contents = std::fs::read_to_string(out.path()).unwrap();
    assert!(contents.contains("cos(theta)"));
}

#[test]
fn pem_no_sea_flag_is_accepted_in_grammage_mode() {
    let temp = TempDir::new().unwrap();
    let out = temp.child("dry.txt");

    danton()
        .current_dir(&temp)
        .args(["--grammage", "--pem-no-sea", "-c", "0.999", "-o"])
        .arg(out.path())
        .assert()
        .success();

    out.assert(predicate::path::exists());
}
