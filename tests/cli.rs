use assert_cmd::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::{tempdir, NamedTempFile};

fn write_obj() -> NamedTempFile {
    // Unit tetrahedron, scaled by the CLI's default factor.
    let obj = "\
# test occluder
v 0 0 0
v 10 0 0
v 0 10 0
v 0 0 10
f 1 3 2
f 1 2 4
f 1 4 3
f 2 3 4
";
    let mut tmp = tempfile::Builder::new()
        .suffix(".obj")
        .tempfile()
        .expect("temp obj");
    tmp.write_all(obj.as_bytes()).expect("write obj");
    tmp
}

#[test]
fn headless_run_writes_snapshot() {
    let obj = write_obj();
    let dir = tempdir().expect("temp dir");
    let output = dir.path().join("shadow.png");

    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.arg(obj.path())
        .args(["--resolution", "128", "--size", "64x64", "--frames", "2"])
        .arg("--headless")
        .arg(&output);
    cmd.assert()
        .success()
        .stdout(contains("with 4 vertices (4 triangles)"))
        .stdout(contains("Shadow map: 128x128 (pcf, nearest filtering)"))
        .stdout(contains("Rendered 2 frame(s)"))
        .stdout(contains("Wrote snapshot to"));

    let bytes = std::fs::read(&output).expect("snapshot exists");
    assert!(bytes.starts_with(b"\x89PNG"));
}

#[test]
fn builtin_scene_honours_config_file() {
    let mut config = NamedTempFile::new().expect("temp config");
    config
        .write_all(
            br#"<shadow-scene>
    <mode>hard</mode>
    <filter>linear</filter>
    <resolution>64</resolution>
    <viewport>48 32</viewport>
</shadow-scene>"#,
        )
        .expect("write config");
    let dir = tempdir().expect("temp dir");
    let output = dir.path().join("builtin.png");

    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.arg("--config")
        .arg(config.path())
        .arg("--headless")
        .arg(&output);
    cmd.assert()
        .success()
        .stdout(contains("Loaded occluder mesh `box` with 8 vertices (12 triangles)"))
        .stdout(contains("Shadow map: 64x64 (hard, linear filtering)"));
    assert!(output.exists());
}

#[test]
fn invalid_mesh_is_rejected() {
    let mut obj = tempfile::Builder::new()
        .suffix(".obj")
        .tempfile()
        .expect("temp obj");
    obj.write_all(b"v 0 0 0\nv 1 0 0\nf 1 2 7\n").expect("write obj");

    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.arg(obj.path()).args(["--headless", "unused.png"]);
    cmd.assert()
        .failure()
        .stderr(
            contains("Error:")
                .and(contains("failed to load occluder"))
                .and(contains("rejected: face references missing vertex 7")),
        );
}

#[test]
fn oversized_shadow_map_fails_at_startup() {
    let dir = tempdir().expect("temp dir");
    let output = dir.path().join("never.png");

    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.args(["--resolution", "100000", "--size", "16x16", "--headless"])
        .arg(&output);
    cmd.assert()
        .failure()
        .stderr(contains("cannot create 100000x100000 render target"));
    assert!(!output.exists());
}

#[test]
fn oversized_viewport_is_rejected() {
    let dir = tempdir().expect("temp dir");
    let output = dir.path().join("never.png");

    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.args(["--size", "100000x10", "--headless"]).arg(&output);
    cmd.assert()
        .failure()
        .stderr(contains("cannot create 100000x10 render target"));
    assert!(!output.exists());
}

#[test]
fn unknown_flag_prints_usage() {
    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.arg("--wobble");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --wobble").and(contains("Usage: shadow-mapping")));
}
