#![cfg(feature = "cli")]

mod common;

use assert_cmd::Command;
use common::*;
use panostitch::{io, Diagnostics};
use predicates::prelude::*;

fn write_inputs(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    overlapping_pair()
        .iter()
        .map(|img| {
            let path = dir.join(&img.name);
            io::save_image(&img.pixels, &path).expect("save input");
            path
        })
        .collect()
}

#[test]
fn stitches_and_re_blends_from_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = write_inputs(dir.path());
    let out = dir.path().join("pano.png");
    let store = dir.path().join("store.json");

    Command::cargo_bin("panostitch")
        .expect("binary")
        .args(&inputs)
        .arg("--out")
        .arg(&out)
        .arg("--store-out")
        .arg(&store)
        .args(["--tile-size", "128", "--log-level", "warn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registered: [0, 1]"));

    let raw = std::fs::read_to_string(dir.path().join("pano.json")).expect("diagnostics");
    let diag: Diagnostics = serde_json::from_str(&raw).expect("parse diagnostics");
    assert_eq!(diag.registered, vec![0, 1]);
    assert_eq!(diag.edges.len(), 1);

    let again = dir.path().join("again.png");
    Command::cargo_bin("panostitch")
        .expect("binary")
        .args(&inputs)
        .arg("--out")
        .arg(&again)
        .arg("--store-in")
        .arg(&store)
        .args(["--tile-size", "64", "--log-level", "warn"])
        .assert()
        .success();

    let a = io::load_image(&out, 0).expect("first");
    let b = io::load_image(&again, 0).expect("second");
    assert_eq!(a.pixels, b.pixels);
}

#[test]
fn single_input_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = write_inputs(dir.path());
    Command::cargo_bin("panostitch")
        .expect("binary")
        .arg(&inputs[0])
        .arg("--out")
        .arg(dir.path().join("pano.png"))
        .assert()
        .failure();
}

#[test]
fn unrelated_pair_fails_with_disconnected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let left = dir.path().join("left.png");
    let other = dir.path().join("other.png");
    io::save_image(&overlapping_pair()[0].pixels, &left).expect("save");
    io::save_image(&unrelated(1).pixels, &other).expect("save");

    Command::cargo_bin("panostitch")
        .expect("binary")
        .arg(&left)
        .arg(&other)
        .arg("--out")
        .arg(dir.path().join("pano.png"))
        .args(["--log-level", "off"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Disconnected"));
}

#[test]
fn downsampled_preview_from_store_is_half_size() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = write_inputs(dir.path());
    let out = dir.path().join("pano.png");
    let store = dir.path().join("store.json");
    Command::cargo_bin("panostitch")
        .expect("binary")
        .args(&inputs)
        .arg("--out")
        .arg(&out)
        .arg("--store-out")
        .arg(&store)
        .args(["--log-level", "warn"])
        .assert()
        .success();

    let preview = dir.path().join("preview.png");
    Command::cargo_bin("panostitch")
        .expect("binary")
        .args(&inputs)
        .arg("--out")
        .arg(&preview)
        .arg("--store-in")
        .arg(&store)
        .args(["--downsample", "2", "--log-level", "warn"])
        .assert()
        .success();

    let full = io::load_image(&out, 0).expect("full");
    let half = io::load_image(&preview, 0).expect("preview");
    assert!(half.pixels.width.abs_diff(full.pixels.width / 2) <= 2, "{}", half.pixels.width);
    assert!(half.pixels.height.abs_diff(full.pixels.height / 2) <= 2, "{}", half.pixels.height);
}

#[test]
fn zero_downsample_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = write_inputs(dir.path());
    Command::cargo_bin("panostitch")
        .expect("binary")
        .args(&inputs)
        .arg("--out")
        .arg(dir.path().join("pano.png"))
        .args(["--downsample", "0"])
        .assert()
        .failure();
}

#[test]
fn log_level_flag_controls_verbosity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = write_inputs(dir.path());
    let run = |level: &str| {
        Command::cargo_bin("panostitch")
            .expect("binary")
            .args(&inputs)
            .arg("--out")
            .arg(dir.path().join(format!("pano-{level}.png")))
            .args(["--log-level", level])
            .env_remove("PANOSTITCH_LOG")
            .env_remove("RUST_LOG")
            .assert()
            .success()
    };
    run("error").stderr(predicate::str::contains("INFO").not());
    run("info").stderr(predicate::str::contains("INFO"));
}
