use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use ndarray::{Array1, Array2};
use retention::artifacts::{CLASSIFIER_FILES, SCALER_FILES, SCHEMA_FILES};
use retention::classifier::{Activation, DenseLayer, DenseNetwork};
use retention::scaler::ScalerParams;
use serde_json::Value;
use tempfile::tempdir;

const RECORD: &str = r#"{
    "FirstTermGPA": 1.5, "SecondTermGPA": 1.8, "HighSchoolAverageMark": 62,
    "MathScore": 40, "FirstLanguage": 1, "Funding": 2, "School": 6,
    "FastTrack": 2, "Coop": 2, "Residency": 1, "Gender": 2,
    "PrevEducation": 1, "AgeGroup": 1, "EnglishGrade": 7
}"#;

fn write_artifacts(dir: &Path) {
    let schema = ["HighSchoolAverageMark", "LowHSMark_flag", "School_6"];
    // Probability rises with the scaled mark and falls for low-mark students.
    DenseNetwork {
        input_width: schema.len(),
        layers: vec![DenseLayer {
            weights: Array2::from_shape_vec((3, 1), vec![1.2, -0.8, 0.1]).expect("weights"),
            bias: Array1::from(vec![0.0]),
            activation: Activation::Sigmoid,
        }],
    }
    .save(&dir.join(CLASSIFIER_FILES[0]))
    .expect("save model");
    ScalerParams {
        columns: vec!["HighSchoolAverageMark".to_string()],
        mean: vec![75.0],
        scale: vec![10.0],
    }
    .save(&dir.join(SCALER_FILES[0]))
    .expect("save scaler");
    fs::write(
        dir.join(SCHEMA_FILES[0]),
        serde_json::to_string(&schema).expect("schema json"),
    )
    .expect("write schema");
}

fn write_config(path: &Path, contents: &str) -> PathBuf {
    fs::write(path, contents).expect("write config");
    path.to_path_buf()
}

/// Runs `retention predict` and returns the printed prediction.
fn predict(record: &Path, args: &[&str], config_env: Option<&Path>) -> Value {
    let mut command = Command::new(env!("CARGO_BIN_EXE_retention"));
    command.env_remove("RETENTION_CONFIG");
    if let Some(path) = config_env {
        command.env("RETENTION_CONFIG", path);
    }
    let output = command
        .arg("predict")
        .arg(record)
        .args(args)
        .output()
        .expect("run retention cli");
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn predict_subcommand_prints_prediction_json() {
    let tmp = tempdir().expect("temporary directory");
    write_artifacts(tmp.path());
    let record_path = tmp.path().join("student.json");
    fs::write(&record_path, RECORD).expect("write record");

    let exe = env!("CARGO_BIN_EXE_retention");
    let output = Command::new(exe)
        .env_remove("RETENTION_CONFIG")
        .args([
            "predict",
            record_path.to_str().expect("path str"),
            "--artifacts",
            tmp.path().to_str().expect("path str"),
        ])
        .output()
        .expect("run retention cli");

    assert!(output.status.success(), "CLI exited with status {:?}", output.status);
    let json: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");

    // (62 - 75) / 10 = -1.3; logit = 1.2 * -1.3 - 0.8 + 0.1 = -2.26.
    let expected = 1.0 / (1.0 + 2.26f64.exp());
    let probability = json["probability"].as_f64().expect("probability");
    assert!((probability - expected).abs() < 1e-9);
    assert_eq!(json["prediction"], 0);
    assert_eq!(json["label"], "Dropout Risk");
}

#[test]
fn predict_subcommand_fails_without_artifacts() {
    let tmp = tempdir().expect("temporary directory");
    let record_path = tmp.path().join("student.json");
    fs::write(&record_path, RECORD).expect("write record");

    let exe = env!("CARGO_BIN_EXE_retention");
    let status = Command::new(exe)
        .env_remove("RETENTION_CONFIG")
        .args([
            "predict",
            record_path.to_str().expect("path str"),
            "--artifacts",
            tmp.path().join("missing").to_str().expect("path str"),
        ])
        .status()
        .expect("run retention cli");

    assert!(!status.success());
}

#[test]
fn predict_subcommand_rejects_out_of_range_threshold() {
    let tmp = tempdir().expect("temporary directory");
    write_artifacts(tmp.path());
    let record_path = tmp.path().join("student.json");
    fs::write(&record_path, RECORD).expect("write record");

    let exe = env!("CARGO_BIN_EXE_retention");
    let status = Command::new(exe)
        .env_remove("RETENTION_CONFIG")
        .args([
            "predict",
            record_path.to_str().expect("path str"),
            "--artifacts",
            tmp.path().to_str().expect("path str"),
            "--threshold",
            "1.5",
        ])
        .status()
        .expect("run retention cli");

    assert!(!status.success());
}

#[test]
fn config_file_threshold_flips_the_prediction() {
    let tmp = tempdir().expect("temporary directory");
    write_artifacts(tmp.path());
    let record_path = tmp.path().join("student.json");
    fs::write(&record_path, RECORD).expect("write record");
    let config = write_config(&tmp.path().join("retention.toml"), "decision_threshold = 0.05\n");
    let artifacts = tmp.path().to_str().expect("path str");

    let default = predict(&record_path, &["--artifacts", artifacts], None);
    assert_eq!(default["prediction"], 0);

    // The probability is about 0.094, which clears a 0.05 threshold.
    let lowered = predict(
        &record_path,
        &["--artifacts", artifacts, "--config", config.to_str().expect("path str")],
        None,
    );
    assert_eq!(lowered["prediction"], 1);
    assert_eq!(lowered["label"], "Persist");
}

#[test]
fn config_file_is_read_from_environment() {
    let tmp = tempdir().expect("temporary directory");
    write_artifacts(tmp.path());
    let record_path = tmp.path().join("student.json");
    fs::write(&record_path, RECORD).expect("write record");
    let config = write_config(
        &tmp.path().join("retention.toml"),
        &format!(
            "artifact_dir = \"{}\"\ndecision_threshold = 0.05\n",
            tmp.path().display()
        ),
    );

    let json = predict(&record_path, &[], Some(config.as_path()));
    assert_eq!(json["prediction"], 1);
}

#[test]
fn explicit_config_wins_over_environment() {
    let tmp = tempdir().expect("temporary directory");
    write_artifacts(tmp.path());
    let record_path = tmp.path().join("student.json");
    fs::write(&record_path, RECORD).expect("write record");
    let explicit = write_config(&tmp.path().join("explicit.toml"), "decision_threshold = 0.5\n");
    let from_env = write_config(&tmp.path().join("env.toml"), "decision_threshold = 0.05\n");

    let json = predict(
        &record_path,
        &[
            "--artifacts",
            tmp.path().to_str().expect("path str"),
            "--config",
            explicit.to_str().expect("path str"),
        ],
        Some(from_env.as_path()),
    );
    assert_eq!(json["prediction"], 0);
}

#[test]
fn threshold_flag_overrides_config_file() {
    let tmp = tempdir().expect("temporary directory");
    write_artifacts(tmp.path());
    let record_path = tmp.path().join("student.json");
    fs::write(&record_path, RECORD).expect("write record");
    // The file points at the artifacts; only the threshold is overridden.
    let config = write_config(
        &tmp.path().join("retention.toml"),
        &format!(
            "artifact_dir = \"{}\"\ndecision_threshold = 0.5\n",
            tmp.path().display()
        ),
    );

    let json = predict(
        &record_path,
        &["--config", config.to_str().expect("path str"), "--threshold", "0.05"],
        None,
    );
    assert_eq!(json["prediction"], 1);
}

#[test]
fn artifacts_flag_overrides_config_file() {
    let tmp = tempdir().expect("temporary directory");
    write_artifacts(tmp.path());
    let record_path = tmp.path().join("student.json");
    fs::write(&record_path, RECORD).expect("write record");
    let config = write_config(
        &tmp.path().join("retention.toml"),
        "artifact_dir = \"/nonexistent/retention-artifacts\"\n",
    );

    let json = predict(
        &record_path,
        &[
            "--config",
            config.to_str().expect("path str"),
            "--artifacts",
            tmp.path().to_str().expect("path str"),
        ],
        None,
    );
    assert_eq!(json["label"], "Dropout Risk");
}
