// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn write_spec(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(format!("{}.spec.json", name));
    std::fs::write(&path, body).unwrap();
    path
}

const BANDPASS_SPEC: &str = r#"{
  "processors": [
    {
      "name": "bandpass_filter",
      "version": "0.12",
      "exe_command": "bandpass $(arguments)",
      "inputs": [{"name": "timeseries"}],
      "outputs": [{"name": "timeseries_out"}],
      "parameters": [
        {"name": "samplerate"},
        {"name": "freq_min", "optional": true, "default_value": 300}
      ]
    }
  ]
}"#;

#[test]
fn load_registers_processors_from_spec_files() {
    let dir = tempdir().unwrap();
    write_spec(dir.path(), "bandpass", BANDPASS_SPEC);

    let reg = ProcessorRegistry::load(&[dir.path().to_path_buf()]).unwrap();
    let spec = reg.spec("bandpass_filter").unwrap();

    assert_eq!(spec.version, "0.12");
    assert_eq!(spec.basepath, dir.path());
    assert_eq!(spec.inputs.len(), 1);
    assert!(spec.parameter("freq_min").unwrap().optional);
    assert_eq!(
        spec.parameter("freq_min").unwrap().default_value,
        Some(ParamValue::Num(300.0))
    );
}

#[test]
fn unknown_processor_is_an_error() {
    let reg = ProcessorRegistry::from_specs(vec![]);
    let err = reg.spec("nope").unwrap_err();
    assert!(matches!(err, RegistryError::UnknownProcessor(name) if name == "nope"));
}

#[test]
fn empty_paths_rejected() {
    assert!(matches!(
        ProcessorRegistry::load(&[]),
        Err(RegistryError::NoProcessorPaths)
    ));
}

#[test]
fn bad_spec_file_is_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    write_spec(dir.path(), "broken", "{not json");
    write_spec(dir.path(), "good", BANDPASS_SPEC);

    let reg = ProcessorRegistry::load(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(reg.names(), vec!["bandpass_filter"]);
}

#[test]
fn non_spec_files_ignored() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("readme.json"), "{}").unwrap();

    let reg = ProcessorRegistry::load(&[dir.path().to_path_buf()]).unwrap();
    assert!(reg.is_empty());
}

#[test]
fn later_path_wins_on_duplicate_name() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    write_spec(a.path(), "p", BANDPASS_SPEC);
    write_spec(
        b.path(),
        "p",
        &BANDPASS_SPEC.replace("\"0.12\"", "\"0.13\""),
    );

    let reg =
        ProcessorRegistry::load(&[a.path().to_path_buf(), b.path().to_path_buf()]).unwrap();
    assert_eq!(reg.spec("bandpass_filter").unwrap().version, "0.13");
}

#[test]
fn names_are_sorted() {
    let mk = |name: &str| ProcessorSpec {
        name: name.to_string(),
        version: String::new(),
        description: String::new(),
        exe_command: String::new(),
        basepath: PathBuf::new(),
        inputs: vec![],
        outputs: vec![],
        parameters: vec![],
    };
    let reg = ProcessorRegistry::from_specs(vec![mk("zeta"), mk("alpha"), mk("mid")]);
    assert_eq!(reg.names(), vec!["alpha", "mid", "zeta"]);
}
