use patchwork_util::{Catalogue, DirectorySource, JobError, JobRunner, Platform, SilentProgress};
use std::fs;
use std::path::Path;

const CATALOGUE: &str = r#"{
    "title": "Test disk",
    "jobs": [
        {
            "name": "code",
            "input": "code",
            "layout": { "base_offset": 0 },
            "scramble": { "from": 0, "to": 3, "seed": "0x05" },
            "patches": [
                { "op": "insert_bytes", "address": 1, "bytes": ["0xEA"] }
            ]
        },
        {
            "name": "loader",
            "input": "loader",
            "layout": { "base_offset": 0 },
            "patches": [],
            "platforms": {
                "pal": [
                    { "op": "insert_nops", "address": "0x02", "count": 2 },
                    { "op": "insert_bytes", "address": "0x05", "bytes": ["0xD0"] }
                ],
                "ntsc": [
                    { "op": "insert_nops", "address": "0x01", "count": 3 }
                ]
            }
        },
        {
            "name": "main",
            "input": "main.prg",
            "output": "main",
            "layout": "prg",
            "symbols": { "hook": "0x1234" },
            "patches": [
                { "op": "insert_file", "address": "0x1100 + 1", "file": "stub.bin" },
                { "op": "insert_bytes", "address": "0x1103", "bytes": ["0x20", "<hook", ">hook"] },
                { "op": "append_file", "file": "tail.bin" }
            ]
        }
    ]
}"#;

fn populate(dir: &Path) {
    fs::write(dir.join("catalogue.json"), CATALOGUE).unwrap();
    fs::write(dir.join("code"), [0x10u8, 0x20, 0x30, 0x40]).unwrap();
    fs::write(dir.join("loader"), [0u8; 8]).unwrap();
    fs::write(
        dir.join("main.prg"),
        [0x00u8, 0x11, 0xA9, 0x00, 0x00, 0x00, 0x00, 0x00, 0x60],
    )
    .unwrap();
    fs::write(dir.join("stub.bin"), [0x4Cu8, 0x00]).unwrap();
    fs::write(dir.join("tail.bin"), [0xFFu8, 0xFE]).unwrap();
}

fn resolve(dir: &Path, platform: Platform) -> Vec<patchwork_util::Job> {
    let catalogue = Catalogue::load(&dir.join("catalogue.json")).unwrap();
    catalogue
        .resolve(Some(platform), &DirectorySource::new(dir))
        .unwrap()
}

#[test]
fn apply_writes_every_artifact() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(source.path());

    let jobs = resolve(source.path(), Platform::Pal);
    let reports = JobRunner::new(SilentProgress, false)
        .run_all(&jobs, source.path(), output.path())
        .unwrap();

    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].artifacts.len(), 3);
    assert_eq!(reports[1].artifacts.len(), 1);
    assert_eq!(reports[2].output_len, 11);

    let read = |name: &str| fs::read(output.path().join(name)).unwrap();

    assert_eq!(read("code.decrypted"), [0xE5, 0x2B, 0xF5, 0x3B]);
    assert_eq!(read("code.modified"), [0xE5, 0xEA, 0xF5, 0x3B]);
    assert_eq!(read("code.encrypted"), [0xCF, 0xDF, 0x30, 0x40]);

    assert_eq!(read("loader.modified"), [0, 0, 0xEA, 0xEA, 0, 0xD0, 0, 0]);
    assert!(!output.path().join("loader.encrypted").exists());

    assert_eq!(
        read("main.modified"),
        [0x00, 0x11, 0xA9, 0x4C, 0x00, 0x20, 0x34, 0x12, 0x60, 0xFF, 0xFE]
    );

    // Inputs are never modified.
    assert_eq!(
        fs::read(source.path().join("code")).unwrap(),
        [0x10, 0x20, 0x30, 0x40]
    );
}

#[test]
fn ntsc_table() {
    let source = tempfile::tempdir().unwrap();
    populate(source.path());

    let jobs = resolve(source.path(), Platform::Ntsc);
    let runner = JobRunner::new(SilentProgress, false);
    let artifacts = runner.run_in_memory(&jobs[1], vec![0; 8]).unwrap();

    assert_eq!(artifacts[0].bytes, [0, 0xEA, 0xEA, 0xEA, 0, 0, 0, 0]);
}

#[test]
fn release_only() {
    let source = tempfile::tempdir().unwrap();
    populate(source.path());

    let jobs = resolve(source.path(), Platform::Pal);
    JobRunner::new(SilentProgress, false)
        .debug_artifacts(false)
        .run_all(&jobs, source.path(), source.path())
        .unwrap();

    assert!(source.path().join("code.encrypted").exists());
    assert!(!source.path().join("code.decrypted").exists());
    assert!(!source.path().join("code.modified").exists());
    assert!(source.path().join("loader.modified").exists());
}

#[test]
fn existing_output_needs_overwrite() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(source.path());
    fs::write(output.path().join("code.encrypted"), b"old").unwrap();

    let jobs = resolve(source.path(), Platform::Pal);

    let err = JobRunner::new(SilentProgress, false)
        .run(&jobs[0], source.path(), output.path())
        .unwrap_err();
    assert!(matches!(err, JobError::CreateFileFailed { .. }));
    assert_eq!(fs::read(output.path().join("code.encrypted")).unwrap(), b"old");

    fs::remove_file(output.path().join("code.decrypted")).unwrap();
    fs::remove_file(output.path().join("code.modified")).unwrap();

    JobRunner::new(SilentProgress, true)
        .run(&jobs[0], source.path(), output.path())
        .unwrap();
    assert_eq!(
        fs::read(output.path().join("code.encrypted")).unwrap(),
        [0xCF, 0xDF, 0x30, 0x40]
    );
}

#[test]
fn missing_input() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(source.path());
    let jobs = resolve(source.path(), Platform::Pal);
    fs::remove_file(source.path().join("code")).unwrap();

    let err = JobRunner::new(SilentProgress, false)
        .run(&jobs[0], source.path(), output.path())
        .unwrap_err();

    assert!(matches!(err, JobError::ReadInputFailed { job, .. } if job == "code"));
}
