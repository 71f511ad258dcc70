//! Reading containers while a writer is still active.

use std::time::Duration;

use ddh5::container::Container;
use ddh5::{AppendMode, DataDict, DataField, ReadOptions, datadict_to_ddh5};
use tempfile::tempdir;

fn xy(xs: &[f64], ys: &[f64]) -> DataDict {
    let mut dd = DataDict::new();
    dd.insert_field("x", DataField::independent().with_values(xs));
    dd.insert_field("y", DataField::dependent(["x"]).with_values(ys));
    dd
}

#[test]
fn a_reader_sees_committed_rows_while_the_writer_stays_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("live.ddh5");

    let mut container = Container::open_append(&path).unwrap();
    container.init_group("data").unwrap();
    ddh5::write_datadict(
        &mut container,
        &xy(&[0.0, 1.0], &[0.0, 1.0]),
        "data",
        AppendMode::AppendNew,
        true,
    )
    .unwrap();

    // The writer handle is still alive; a concurrent reader snapshots the
    // committed state.
    let back = ddh5::datadict_from_ddh5(&path, "data", &ReadOptions::default()).unwrap();
    assert_eq!(back.nrows(), 2);

    // More rows land, a fresh read sees them.
    ddh5::write_datadict(
        &mut container,
        &xy(&[0.0, 1.0, 2.0], &[0.0, 1.0, 4.0]),
        "data",
        AppendMode::AppendNew,
        true,
    )
    .unwrap();
    let back = ddh5::datadict_from_ddh5(&path, "data", &ReadOptions::default()).unwrap();
    assert_eq!(back.field("y").unwrap().values(), &[0.0, 1.0, 4.0]);
}

#[test]
fn unequal_lengths_clamp_by_default_and_fail_when_promoted() {
    let dir = tempdir().unwrap();
    let path = datadict_to_ddh5(
        &xy(&[0.0, 1.0], &[0.0, 1.0]),
        dir.path().join("race"),
        "data",
        AppendMode::Overwrite,
        false,
    )
    .unwrap();

    // A reader can land between the per-field appends of one batch.
    let mut container = Container::open_append(&path).unwrap();
    container.append_rows("data", "x", &[2.0]).unwrap();
    container.flush().unwrap();
    drop(container);

    let back = ddh5::datadict_from_ddh5(&path, "data", &ReadOptions::default()).unwrap();
    assert_eq!(back.nrows(), 2);
    back.validate().unwrap();

    let strict = ReadOptions {
        ignore_unequal_lengths: false,
        ..ReadOptions::default()
    };
    let err = ddh5::datadict_from_ddh5(&path, "data", &strict).unwrap_err();
    match err {
        ddh5::Ddh5Error::Read(ddh5::ReadError::TornSnapshot { lengths }) => {
            assert!(lengths.contains(&("x".to_string(), 3)));
            assert!(lengths.contains(&("y".to_string(), 2)));
        }
        other => panic!("expected torn snapshot, got {other}"),
    }
}

#[test]
fn missing_file_and_group_are_never_retried() {
    let dir = tempdir().unwrap();

    let opts = ReadOptions {
        n_retries: 50,
        retry_delay: Duration::from_secs(10),
        ..ReadOptions::default()
    };
    // With a huge retry budget this would hang if missing files were
    // treated as transient; it must fail immediately instead.
    let start = std::time::Instant::now();
    let err = ddh5::datadict_from_ddh5(dir.path().join("absent"), "data", &opts).unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        err,
        ddh5::Ddh5Error::Read(ddh5::ReadError::FileMissing { .. })
    ));

    let path = datadict_to_ddh5(
        &xy(&[0.0], &[0.0]),
        dir.path().join("run"),
        "data",
        AppendMode::Overwrite,
        false,
    )
    .unwrap();
    let start = std::time::Instant::now();
    let err = ddh5::datadict_from_ddh5(&path, "other", &opts).unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        err,
        ddh5::Ddh5Error::Read(ddh5::ReadError::GroupMissing { .. })
    ));
}

#[test]
fn retries_are_bounded_for_persistently_unreadable_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stuck.ddh5");
    // A header that never completes is transient on every attempt.
    std::fs::write(&path, b"DDH5").unwrap();

    let opts = ReadOptions {
        n_retries: 3,
        retry_delay: Duration::from_millis(1),
        ..ReadOptions::default()
    };
    let err = ddh5::datadict_from_ddh5(&path, "data", &opts).unwrap_err();
    match err {
        ddh5::Ddh5Error::Read(ddh5::ReadError::RetriesExhausted { attempts, .. }) => {
            assert_eq!(attempts, 4);
        }
        other => panic!("expected retry exhaustion, got {other}"),
    }
}

#[test]
fn corruption_is_fatal_on_the_first_attempt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.ddh5");
    std::fs::write(&path, b"XXXX............").unwrap();

    let opts = ReadOptions {
        n_retries: 50,
        retry_delay: Duration::from_secs(10),
        ..ReadOptions::default()
    };
    let start = std::time::Instant::now();
    let err = ddh5::datadict_from_ddh5(&path, "data", &opts).unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        err,
        ddh5::Ddh5Error::Container(ddh5::ContainerError::Corrupted { .. })
    ));
}
