use std::fs;

use tempfile::TempDir;
use tidyfile_ops::{OpError, Operation, Operator, OperatorConfig};
use tokio_util::sync::CancellationToken;

#[test]
fn test_move_into_occupied_target_renames_incoming() {
    let temp = TempDir::new().unwrap();
    let d = temp.path();
    fs::create_dir(d.join("out")).unwrap();
    fs::write(d.join("a.txt"), "incoming").unwrap();
    fs::write(d.join("out/a.txt"), "original").unwrap();

    let written = Operator::default()
        .move_file(&d.join("a.txt"), &d.join("out/a.txt"))
        .unwrap();

    assert_eq!(written, d.join("out/a_1.txt"));
    assert_eq!(fs::read(d.join("out/a.txt")).unwrap(), b"original");
    assert_eq!(fs::read_to_string(&written).unwrap(), "incoming");
    assert!(!d.join("a.txt").exists());
}

#[test]
fn test_conflict_picks_smallest_free_suffix() {
    let temp = TempDir::new().unwrap();
    let d = temp.path();
    fs::create_dir(d.join("out")).unwrap();
    for name in ["a.txt", "a_1.txt", "a_2.txt"] {
        fs::write(d.join("out").join(name), name).unwrap();
    }
    fs::write(d.join("a.txt"), "new").unwrap();

    let written = Operator::default()
        .move_file(&d.join("a.txt"), &d.join("out/a.txt"))
        .unwrap();
    assert_eq!(written, d.join("out/a_3.txt"));
    for name in ["a.txt", "a_1.txt", "a_2.txt"] {
        assert_eq!(fs::read_to_string(d.join("out").join(name)).unwrap(), name);
    }
}

#[test]
fn test_move_creates_missing_parents() {
    let temp = TempDir::new().unwrap();
    let d = temp.path();
    fs::write(d.join("a.txt"), "a").unwrap();

    Operator::default()
        .move_file(&d.join("a.txt"), &d.join("x/y/z/a.txt"))
        .unwrap();
    assert!(d.join("x/y/z/a.txt").is_file());
}

#[test]
fn test_move_missing_source_is_not_found() {
    let temp = TempDir::new().unwrap();
    let err = Operator::default()
        .move_file(&temp.path().join("nope"), &temp.path().join("out/nope"))
        .unwrap_err();

    assert!(matches!(err, OpError::NotFound { .. }));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_rename_in_place() {
    let temp = TempDir::new().unwrap();
    let d = temp.path();
    fs::write(d.join("old.txt"), "x").unwrap();

    let written = Operator::default()
        .rename(&d.join("old.txt"), "new.txt".as_ref())
        .unwrap();
    assert_eq!(written, d.join("new.txt"));
    assert!(!d.join("old.txt").exists());
}

#[test]
fn test_create_folder_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let folder = temp.path().join("a/b/c");
    let op = Operator::default();

    assert!(op.create_folder(&folder).unwrap());
    assert!(!op.create_folder(&folder).unwrap());
    assert!(folder.is_dir());
}

#[test]
fn test_batch_with_one_missing_source() {
    let temp = TempDir::new().unwrap();
    let d = temp.path();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(d.join(name), name).unwrap();
    }

    let ops = vec![
        Operation::create_folder(d.join("out")),
        Operation::move_to(d.join("a.txt"), d.join("out/a.txt")),
        Operation::move_to(d.join("missing.txt"), d.join("out/missing.txt")),
        Operation::move_to(d.join("b.txt"), d.join("out/b.txt")),
        Operation::rename(d.join("c.txt"), "see.txt"),
    ];

    let result = Operator::default().execute_batch(&ops, 2);

    assert_eq!(result.total, 5);
    assert_eq!(
        result.success_count + result.failed_count + result.skipped_count,
        5
    );
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.success_count, 4);
    assert!(result.is_partial_failure());
    assert!(result.errors[0].contains("missing.txt"));
    assert!(d.join("out/a.txt").exists());
    assert!(d.join("out/b.txt").exists());
    assert!(d.join("see.txt").exists());
}

#[test]
fn test_applied_operations_carry_resolved_target() {
    let temp = TempDir::new().unwrap();
    let d = temp.path();
    fs::create_dir(d.join("out")).unwrap();
    fs::write(d.join("out/a.txt"), "old").unwrap();
    fs::write(d.join("a.txt"), "new").unwrap();

    let op = Operation::move_to(d.join("a.txt"), d.join("out/a.txt"));
    let result = Operator::default().execute_batch(std::slice::from_ref(&op), 10);

    assert_eq!(result.operations.len(), 1);
    assert_eq!(result.operations[0].target(), d.join("out/a_1.txt"));
    assert_eq!(result.operations[0].id(), op.id());
}

#[test]
fn test_existing_folder_counts_as_skipped() {
    let temp = TempDir::new().unwrap();
    let ops = vec![Operation::create_folder(temp.path())];

    let result = Operator::default().execute_batch(&ops, 10);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.success_count, 0);
    assert!(result.is_success());
}

#[test]
fn test_delete_is_never_executed() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("keep.txt");
    fs::write(&file, "x").unwrap();

    let result = Operator::default().execute_batch(&[Operation::delete(&file)], 10);
    assert_eq!(result.failed_count, 1);
    assert!(result.failures[0].error.contains("Validation failed"));
    assert!(file.exists());
}

#[test]
fn test_dry_run_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let d = temp.path();
    fs::write(d.join("a.txt"), "a").unwrap();
    fs::create_dir(d.join("out")).unwrap();
    fs::write(d.join("out/a.txt"), "taken").unwrap();

    let ops = vec![
        Operation::create_folder(d.join("new")),
        Operation::move_to(d.join("a.txt"), d.join("out/a.txt")),
        Operation::move_to(d.join("a.txt"), d.join("deep/er/a.txt")),
    ];

    let operator = Operator::new(OperatorConfig::default().with_dry_run(true));
    let result = operator.execute_batch(&ops, 50);

    assert_eq!(result.success_count, 3);
    assert_eq!(result.operations[1].target(), d.join("out/a_1.txt"));
    assert!(d.join("a.txt").exists());
    assert!(!d.join("new").exists());
    assert!(!d.join("deep").exists());
    assert!(!d.join("out/a_1.txt").exists());
}

#[test]
fn test_dry_run_reports_missing_source() {
    let temp = TempDir::new().unwrap();
    let err = Operator::dry_run()
        .move_file(&temp.path().join("ghost"), &temp.path().join("out/ghost"))
        .unwrap_err();
    assert!(matches!(err, OpError::NotFound { .. }));
}

#[test]
fn test_cancelled_batch_skips_remaining() {
    let temp = TempDir::new().unwrap();
    let ops = vec![
        Operation::create_folder(temp.path().join("one")),
        Operation::create_folder(temp.path().join("two")),
    ];
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = Operator::default().execute_batch_with_cancel(&ops, 1, &cancel);
    assert!(result.cancelled);
    assert_eq!(result.skipped_count, 2);
    assert!(!result.is_success());
    assert!(!temp.path().join("one").exists());
}
