use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.json");
    fs::write(&path, body).expect("Failed to write config");
    path
}

fn run_hearken(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_hearken"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run hearken")
}

#[test]
fn test_missing_dictionary_exits_with_code_3() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            r#"{{ "dictionary_path": "{}" }}"#,
            dir.path().join("nope.dict").display()
        ),
    );

    let output = run_hearken(&["--config", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_missing_model_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let dict = dir.path().join("rooms.dict");
    fs::write(
        &dict,
        "living L IH V IH NG\nroom R UW M\nkitchen K IH CH AH N\nbedroom B EH D R UW M\nexit EH G Z IH T\n",
    )
    .unwrap();
    let config = write_config(dir.path(), "{}");

    let output = run_hearken(&[
        "--config",
        config.to_str().unwrap(),
        "--dict",
        dict.to_str().unwrap(),
        "--model",
        dir.path().join("no-model").to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_malformed_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "{ not json");

    let output = run_hearken(&["--config", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_exit_command_must_be_in_table() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        r#"{ "commands": { "kitchen": "Affirmative, Kitchen." }, "exit_command": "exit" }"#,
    );

    let output = run_hearken(&["--config", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_conflicting_device_flags_are_refused() {
    let output = run_hearken(&["--device", "0", "--device-name", "USB"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_init_config_writes_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let output = run_hearken(&[
        "--config",
        path.to_str().unwrap(),
        "--init-config",
        "--sample-rate",
        "8000",
        "--tts",
        "system",
    ]);
    assert!(output.status.success());

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["sample_rate"], 8000);
    assert_eq!(written["tts_engine"], "system");
    assert_eq!(written["commands"]["kitchen"], "Affirmative, Kitchen.");
}
