use env_logger::Builder;
use log::{info, LevelFilter};

use minibase::Database;

// Walks the full lifecycle: plain inserts, a committed transaction, a
// checkpoint, an uncommitted transaction, a crash, and recovery.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::new().filter_level(LevelFilter::Info).init();

    let path = std::env::temp_dir().join("minibase-demo.db");
    let mut db = Database::open(&path)?;

    db.insert(b"Alice")?;
    db.insert(b"Bob")?;
    db.insert(b"Charlie")?;
    info!("seeded {} records", db.record_count());

    db.begin()?;
    db.update(0, b"Alice (promoted)")?;
    db.commit()?;
    info!("committed an update of record 0");

    db.checkpoint()?;

    db.begin()?;
    db.update(1, b"Bob (doomed)")?;
    db.insert(b"David (doomed)")?;
    info!("left a transaction open, then the machine dies");

    db.simulate_crash();
    db.recover()?;

    for record_id in 0..db.record_count() {
        let bytes = db.read(record_id)?;
        info!("record {}: {}", record_id, String::from_utf8_lossy(&bytes));
    }

    info!("log contents:");
    for record in db.log_records()? {
        info!("  {}", record);
    }

    db.close()?;
    db.files().cleanup()?;
    Ok(())
}
