//! A small transactional record store.
//!
//! Records are fixed-size UTF-8 slots packed into pages; pages live in a
//! fix/unfix buffer pool over a single data file whose header persists the
//! record count. Transactions take record-level exclusive locks, snapshot
//! pages into a before-image buffer at first write, and journal every
//! change to a write-ahead log. Commit forces only the log; checkpoints
//! force data pages; [`Database::recover`] rebuilds a consistent state
//! from the log after a crash with an analysis / REDO / UNDO pass.

pub mod buffer;
pub mod common;
pub mod storage;
pub mod transaction;
pub mod wal;

pub use buffer::BufferManager;
pub use common::{Lsn, MinibaseError, PageId, Result, StoreConfig, TxId};
pub use storage::{PagedFileStore, StoreFiles};
pub use transaction::TransactionManager;
pub use wal::{LogKind, LogManager, LogRecord};

use std::path::Path;

/// A database at a path: the data file plus its `.log` companion.
pub struct Database {
    files: StoreFiles,
    manager: TransactionManager,
}

impl Database {
    /// Opens or creates the database with default geometry. No recovery
    /// runs implicitly; call [`Database::recover`] after a crash.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    pub fn open_with_config(path: &Path, cfg: StoreConfig) -> Result<Self> {
        let files = StoreFiles::new(path);
        let store = PagedFileStore::open(files.data_path(), cfg.page_size)?;
        let buffer = BufferManager::new(store, cfg.buffer_capacity);
        let wal = LogManager::open(files.log_path())?;
        let manager = TransactionManager::new(buffer, wal, cfg)?;

        Ok(Self { files, manager })
    }

    pub fn begin(&mut self) -> Result<()> {
        self.manager.begin()
    }

    pub fn commit(&mut self) -> Result<()> {
        self.manager.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.manager.rollback()
    }

    pub fn insert(&mut self, data: &[u8]) -> Result<u64> {
        self.manager.insert(data)
    }

    pub fn update(&mut self, record_id: u64, data: &[u8]) -> Result<()> {
        self.manager.update(record_id, data)
    }

    pub fn read(&mut self, record_id: u64) -> Result<Vec<u8>> {
        self.manager.read(record_id)
    }

    pub fn checkpoint(&mut self) -> Result<()> {
        self.manager.checkpoint()
    }

    pub fn recover(&mut self) -> Result<()> {
        self.manager.recover()
    }

    pub fn simulate_crash(&mut self) {
        self.manager.simulate_crash()
    }

    pub fn close(&mut self) -> Result<()> {
        self.manager.close()
    }

    pub fn record_count(&self) -> u64 {
        self.manager.record_count()
    }

    pub fn in_transaction(&self) -> bool {
        self.manager.in_transaction()
    }

    pub fn log_records(&mut self) -> Result<Vec<LogRecord>> {
        self.manager.log_records()
    }

    pub fn files(&self) -> &StoreFiles {
        &self.files
    }
}
