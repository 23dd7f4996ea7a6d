#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: register users and open a split with an unregistered invitee
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "op, actor, split, name, amount, split_type, participants, target").unwrap();
    writeln!(csv1, "register, alice@x.com, , Alice").unwrap();
    writeln!(csv1, "register, bob@x.com, , Bob").unwrap();
    writeln!(csv1, "create, alice@x.com, Dinner, , 300, equal, bob@x.com;carol@x.com").unwrap();
    writeln!(csv1, "mark_paid, alice@x.com, Dinner, , , , , bob@x.com").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("split-ledger"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("Dinner,300,EQUAL,PENDING,2,2,1"));

    // 2. Second run: carol registers against the same database and settles
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "op, actor, split, name, amount, split_type, participants, target").unwrap();
    writeln!(csv2, "register, carol@x.com, , Carol").unwrap();
    writeln!(csv2, "mark_paid, alice@x.com, Dinner, , , , , carol@x.com").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("split-ledger"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    assert!(stdout2.contains("Dinner,300,EQUAL,COMPLETED,3,3,0"));
}
