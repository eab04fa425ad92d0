use std::path::PathBuf;

use minibase::{Database, MinibaseError, Result};
use uuid::Uuid;

fn temp_db_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("minibase-{}-{}.db", name, Uuid::new_v4()))
}

#[test]
fn test_committed_update_sticks() -> Result<()> {
    let path = temp_db_path("commit");
    let mut db = Database::open(&path)?;

    db.insert(b"Alice")?;
    db.insert(b"Bob")?;
    db.insert(b"Charlie")?;

    db.begin()?;
    db.update(1, b"Robert")?;
    db.commit()?;

    assert_eq!(db.read(1)?, b"Robert");
    assert_eq!(db.record_count(), 3);

    db.files().cleanup()?;
    Ok(())
}

#[test]
fn test_rollback_restores_updates() -> Result<()> {
    let path = temp_db_path("rollback");
    let mut db = Database::open(&path)?;

    db.insert(b"Alice")?;
    db.insert(b"Bob")?;
    db.insert(b"Charlie")?;

    db.begin()?;
    db.update(0, b"A2")?;
    db.update(2, b"C2")?;
    assert_eq!(db.read(0)?, b"A2");

    db.rollback()?;
    assert_eq!(db.read(0)?, b"Alice");
    assert_eq!(db.read(2)?, b"Charlie");
    assert_eq!(db.read(1)?, b"Bob");

    db.files().cleanup()?;
    Ok(())
}

#[test]
fn test_rollback_takes_back_inserts() -> Result<()> {
    let path = temp_db_path("insert_rollback");
    let mut db = Database::open(&path)?;

    db.insert(b"Alice")?;
    let before = db.record_count();

    db.begin()?;
    db.insert(b"Dx")?;
    db.insert(b"Ex")?;
    assert_eq!(db.record_count(), before + 2);

    db.rollback()?;
    assert_eq!(db.record_count(), before);
    assert!(matches!(db.read(before), Err(MinibaseError::NotFound(_))));

    db.files().cleanup()?;
    Ok(())
}

#[test]
fn test_begin_commits_an_open_transaction() -> Result<()> {
    let path = temp_db_path("implicit_commit");
    let mut db = Database::open(&path)?;

    db.insert(b"Alice")?;
    db.insert(b"Bob")?;

    db.begin()?;
    db.update(0, b"Ada")?;

    // Re-begin commits the first transaction, so its update survives the
    // second transaction's rollback.
    db.begin()?;
    db.update(1, b"Brian")?;
    db.rollback()?;

    assert_eq!(db.read(0)?, b"Ada");
    assert_eq!(db.read(1)?, b"Bob");
    assert!(!db.in_transaction());

    db.files().cleanup()?;
    Ok(())
}

#[test]
fn test_record_count_survives_reopen() -> Result<()> {
    let path = temp_db_path("reopen");
    {
        let mut db = Database::open(&path)?;
        db.insert(b"Alice")?;
        db.insert(b"Bob")?;
        db.close()?;
    }

    let mut db = Database::open(&path)?;
    assert_eq!(db.record_count(), 2);
    assert_eq!(db.read(0)?, b"Alice");
    assert_eq!(db.read(1)?, b"Bob");

    db.files().cleanup()?;
    Ok(())
}

#[test]
fn test_read_of_unknown_record_fails() -> Result<()> {
    let path = temp_db_path("not_found");
    let mut db = Database::open(&path)?;

    db.insert(b"Alice")?;
    assert!(matches!(db.read(1), Err(MinibaseError::NotFound(1))));
    assert!(matches!(db.update(9, b"X"), Err(MinibaseError::NotFound(9))));

    db.files().cleanup()?;
    Ok(())
}

#[test]
fn test_oversized_record_is_truncated() -> Result<()> {
    let path = temp_db_path("truncate");
    let mut db = Database::open(&path)?;

    let long = vec![b'x'; 500];
    let rid = db.insert(&long)?;
    assert_eq!(db.read(rid)?, vec![b'x'; 100]);

    db.files().cleanup()?;
    Ok(())
}

#[test]
fn test_records_spill_onto_later_pages() -> Result<()> {
    let path = temp_db_path("paging");
    let mut db = Database::open(&path)?;

    // 4096 / 100 = 40 records per page; cross the boundary
    for i in 0..45u64 {
        let rid = db.insert(format!("record {}", i).as_bytes())?;
        assert_eq!(rid, i);
    }
    assert_eq!(db.read(0)?, b"record 0");
    assert_eq!(db.read(39)?, b"record 39");
    assert_eq!(db.read(44)?, b"record 44");

    db.files().cleanup()?;
    Ok(())
}
