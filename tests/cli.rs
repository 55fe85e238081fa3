mod common;

use std::fs;
use std::process::Command;

use narrate_rs::SynthesisResult;

use common::{names, write_clip, RATE};

#[test]
fn generate_with_external_engine_writes_archives() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = dir.path().join("fixture.wav");
    write_clip(&fixture, 30);
    fs::create_dir_all(dir.path().join("voices/tom")).unwrap();
    write_clip(&dir.path().join("voices/tom/0.wav"), 10);

    let config = serde_json::json!({
        "voices_dir": dir.path().join("voices"),
        "output_dir": dir.path().join("out"),
        "backup_mount": null,
        "engine": { "program": "cp", "args": [fixture, "{output}"] }
    });
    let config_path = dir.path().join("narrate.json");
    fs::write(&config_path, config.to_string()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_narrate"))
        .args(["--config", config_path.to_str().unwrap()])
        .args(["generate", "--voice", "tom", "--section", "ch1", "--format", "wav"])
        .args(["--text", "First line.\n\nSecond line.\n"])
        .output()
        .expect("run narrate generate");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let out = dir.path().join("out");
    assert_eq!(
        names(&out),
        vec![
            "generated-tom-0.wav",
            "generated-tom-1.wav",
            "generated-tom-ch1-fast.wav",
            "generated-tom-ch1-fast.zip",
        ]
    );
    let combined = SynthesisResult::read_wav(&out.join("generated-tom-ch1-fast.wav")).unwrap();
    assert_eq!(combined.samples.len(), 2 * 30 + RATE as usize);
}

#[test]
fn voices_list_prints_voice_directories() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("tom")).unwrap();
    fs::create_dir_all(dir.path().join("angie")).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_narrate"))
        .args(["voices", "list", "--voices-dir", dir.path().to_str().unwrap()])
        .output()
        .expect("run narrate voices list");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "angie\ntom\n");
}

#[test]
fn unknown_preset_is_rejected() {
    let status = Command::new(env!("CARGO_BIN_EXE_narrate"))
        .args(["generate", "--section", "s", "--text", "Hi.", "--preset", "turbo"])
        .status()
        .expect("run narrate generate");
    assert!(!status.success());
}

#[test]
fn voices_load_does_not_need_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.wav");
    write_clip(&clip, 10);

    let config = serde_json::json!({
        "voices_dir": dir.path().join("voices"),
        "model_dir": dir.path().join("missing-model"),
        "backup_mount": null,
        "engine": { "program": "narrate-no-such-synthesizer", "args": [] }
    });
    let config_path = dir.path().join("narrate.json");
    fs::write(&config_path, config.to_string()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_narrate"))
        .args(["--config", config_path.to_str().unwrap()])
        .args(["voices", "load", "tom", clip.to_str().unwrap()])
        .output()
        .expect("run narrate voices load");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(names(&dir.path().join("voices/tom")), vec!["0.wav"]);
    assert_eq!(
        fs::read(dir.path().join("voices/tom/0.wav")).unwrap(),
        fs::read(&clip).unwrap()
    );
}
