use assert_cmd::Command;

#[test]
fn cli_help_runs() {
    let mut cmd = Command::cargo_bin("vaers-corpus").expect("binary exists");
    cmd.arg("--help").assert().success();
}

#[test]
fn every_stage_has_help() {
    for stage in ["assemble", "split", "device", "describe", "vocab", "train", "matrix"] {
        let mut cmd = Command::cargo_bin("vaers-corpus").expect("binary exists");
        cmd.args([stage, "--help"]).assert().success();
    }
}

#[test]
fn assemble_without_raw_dir_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("vaers-corpus").expect("binary exists");
    cmd.current_dir(tmp.path())
        .env("RAW_DIR", tmp.path().join("nowhere"))
        .env("DATA_DIR", tmp.path().join("out"))
        .env("VOCAB_DIR", tmp.path().join("vocab"))
        .env("LABEL_DIR", tmp.path().join("labels"))
        .env("MODEL_DIR", tmp.path().join("models"))
        .arg("assemble")
        .assert()
        .failure();
}
