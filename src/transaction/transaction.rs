use log::{debug, info};

use crate::buffer::BufferManager;
use crate::common::{MinibaseError, PageId, Result, StoreConfig, TxId};
use crate::transaction::{BeforeImageBuffer, LockTable};
use crate::wal::{LogManager, LogRecord};

/// Orchestrates every operation: it owns the buffer pool (and through it
/// the data file), the write-ahead log, the lock table and the
/// before-image buffer. At most one transaction is open at a time; the
/// transaction id is a logical identity that lets the log and the lock
/// table distinguish transactions across the manager's lifetime.
pub struct TransactionManager {
    cfg: StoreConfig,
    buffer: BufferManager,
    wal: LogManager,
    locks: LockTable,
    before_images: BeforeImageBuffer,
    in_transaction: bool,
    current_tx_id: TxId,
    record_count: u64,
    record_count_before_tx: u64,
}

impl TransactionManager {
    pub fn new(mut buffer: BufferManager, wal: LogManager, cfg: StoreConfig) -> Result<Self> {
        let record_count = buffer.read_header()?;
        Ok(Self {
            cfg,
            buffer,
            wal,
            locks: LockTable::new(),
            before_images: BeforeImageBuffer::new(),
            in_transaction: false,
            current_tx_id: TxId(0),
            record_count,
            record_count_before_tx: record_count,
        })
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn current_tx_id(&self) -> TxId {
        self.current_tx_id
    }

    /// Starts a transaction. An already-open transaction is committed
    /// first.
    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            self.commit()?;
        }
        self.current_tx_id = TxId(self.current_tx_id.0 + 1);
        self.in_transaction = true;
        self.record_count_before_tx = self.record_count;
        self.wal.log_begin(self.current_tx_id);
        debug!("begin transaction {}", self.current_tx_id);
        Ok(())
    }

    /// Commits the open transaction. The commit point is the WAL flush of
    /// the COMMIT record; data pages are deliberately not forced here and
    /// stay dirty until the next checkpoint.
    pub fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.wal.log_commit(self.current_tx_id);
        self.wal.flush()?;

        self.buffer.clear_transactional();
        self.locks.release_all(self.current_tx_id);
        self.before_images.clear();
        self.in_transaction = false;
        debug!("committed transaction {}", self.current_tx_id);
        Ok(())
    }

    /// Rolls the open transaction back by restoring every touched page
    /// from its before-image, then undoes the record-count change.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        for (page_id, image) in self.before_images.iter() {
            if self.buffer.restore_page(*page_id, image) {
                debug!("restored page {} from its before-image", page_id);
            }
        }

        self.wal.log_rollback(self.current_tx_id);
        self.wal.flush()?;

        self.locks.release_all(self.current_tx_id);
        self.before_images.clear();
        self.record_count = self.record_count_before_tx;
        self.persist_record_count()?;
        self.in_transaction = false;
        debug!("rolled back transaction {}", self.current_tx_id);
        Ok(())
    }

    /// Appends a record at the high-water mark and returns its id. Outside
    /// a transaction the slot is forced to disk immediately; inside one it
    /// is locked, logged and left to the WAL to make durable.
    pub fn insert(&mut self, data: &[u8]) -> Result<u64> {
        let record_id = self.record_count;
        let page_id = self.cfg.page_of(record_id);
        let range = self.cfg.slot_range(self.cfg.slot_of(record_id));

        if self.in_transaction {
            self.snapshot_page_if_needed(page_id)?;
            self.locks.acquire(record_id, self.current_tx_id)?;
            debug!(
                "locked new record {} for transaction {}",
                record_id, self.current_tx_id
            );
        }

        let record = self.pad_record(data);
        let page = self.buffer.fix(page_id)?;
        page.data_mut()[range.clone()].copy_from_slice(&record);
        let after = page.data()[range].to_vec();
        self.buffer.mark_dirty(page_id)?;
        if self.in_transaction {
            self.buffer.mark_transactional(page_id)?;
        }
        self.buffer.unfix(page_id)?;
        if !self.in_transaction {
            self.buffer.force(page_id)?;
        }

        self.record_count += 1;
        self.persist_record_count()?;

        if self.in_transaction {
            self.wal.log_insert(self.current_tx_id, record_id, after);
            self.wal.flush()?;
        }
        Ok(record_id)
    }

    /// Overwrites an existing record. Inside a transaction this takes the
    /// record lock, snapshots the page on first touch, and logs both
    /// images; outside one it writes through to disk.
    pub fn update(&mut self, record_id: u64, data: &[u8]) -> Result<()> {
        if record_id >= self.record_count {
            return Err(MinibaseError::NotFound(record_id));
        }
        let page_id = self.cfg.page_of(record_id);
        let range = self.cfg.slot_range(self.cfg.slot_of(record_id));

        if !self.in_transaction {
            let record = self.pad_record(data);
            let page = self.buffer.fix(page_id)?;
            page.data_mut()[range].copy_from_slice(&record);
            self.buffer.mark_dirty(page_id)?;
            self.buffer.unfix(page_id)?;
            return self.buffer.force(page_id);
        }

        if let Some(owner) = self.locks.owner(record_id) {
            if owner != self.current_tx_id {
                return Err(MinibaseError::LockConflict {
                    record: record_id,
                    owner: owner.0,
                });
            }
        }
        if !self.locks.owned_by(record_id, self.current_tx_id) {
            // Snapshot before the first modification of the page, then lock.
            self.snapshot_page_if_needed(page_id)?;
            self.locks.acquire(record_id, self.current_tx_id)?;
            debug!(
                "locked record {} for transaction {}",
                record_id, self.current_tx_id
            );
        }

        let record = self.pad_record(data);
        let page = self.buffer.fix(page_id)?;
        // The slot must be read before it is overwritten.
        let before = page.data()[range.clone()].to_vec();
        page.data_mut()[range.clone()].copy_from_slice(&record);
        let after = page.data()[range].to_vec();
        self.buffer.mark_dirty(page_id)?;
        self.buffer.mark_transactional(page_id)?;
        self.buffer.unfix(page_id)?;

        self.wal.log_update(self.current_tx_id, record_id, before, after);
        self.wal.flush()
    }

    /// Reads a record with trailing NUL padding trimmed. A record locked
    /// by another transaction is served from that transaction's
    /// before-image, so readers never observe uncommitted bytes.
    pub fn read(&mut self, record_id: u64) -> Result<Vec<u8>> {
        if record_id >= self.record_count {
            return Err(MinibaseError::NotFound(record_id));
        }
        let page_id = self.cfg.page_of(record_id);
        let range = self.cfg.slot_range(self.cfg.slot_of(record_id));

        if self.locks.is_locked(record_id) && !self.locks.owned_by(record_id, self.current_tx_id)
        {
            if let Some(image) = self.before_images.get(page_id) {
                debug!("read of record {} served from a before-image", record_id);
                return Ok(trim_record(&image[range]));
            }
        }

        let page = self.buffer.fix(page_id)?;
        let bytes = page.data()[range].to_vec();
        self.buffer.unfix(page_id)?;
        Ok(trim_record(&bytes))
    }

    /// Forces every dirty page, persists the header, and marks the log
    /// with a CHECKPOINT record. Pages go out before the record: the
    /// checkpoint must not vouch for pages that are still only in memory.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.buffer.force_all_dirty()?;
        self.persist_record_count()?;
        self.wal.log_checkpoint();
        self.wal.flush()?;
        info!(
            "checkpoint complete at log offset {}",
            self.wal.last_checkpoint_position()
        );
        Ok(())
    }

    /// Rebuilds a consistent state from the data file and the log after a
    /// crash, then persists the recovered record count.
    pub fn recover(&mut self) -> Result<()> {
        self.record_count = self
            .wal
            .recover(&mut self.buffer, &self.cfg, self.record_count)?;
        self.persist_record_count()
    }

    /// Emulates a crash: every volatile structure is dropped, both files
    /// stay as they are. Staged log records are flushed first, as the last
    /// thing the doomed process managed to do.
    pub fn simulate_crash(&mut self) {
        let _ = self.wal.flush();
        self.buffer.discard_all();
        self.before_images.clear();
        self.locks.clear();
        self.in_transaction = false;
        info!("simulated crash: buffers dropped, files left intact");
    }

    /// Flushes any staged log records and persists the header.
    pub fn close(&mut self) -> Result<()> {
        self.wal.flush()?;
        self.persist_record_count()
    }

    /// The on-disk log, decoded. For inspection and the demo driver.
    pub fn log_records(&mut self) -> Result<Vec<LogRecord>> {
        self.wal.read_all()
    }

    fn snapshot_page_if_needed(&mut self, page_id: PageId) -> Result<()> {
        if self.before_images.contains(page_id) {
            return Ok(());
        }
        let image = self.buffer.fix(page_id)?.data().to_vec();
        self.buffer.unfix(page_id)?;
        self.before_images.insert(page_id, image);
        debug!("saved before-image of page {}", page_id);
        Ok(())
    }

    fn persist_record_count(&mut self) -> Result<()> {
        self.buffer.write_header(self.record_count)
    }

    fn pad_record(&self, data: &[u8]) -> Vec<u8> {
        let mut record = vec![0u8; self.cfg.record_size];
        let len = data.len().min(self.cfg.record_size);
        record[..len].copy_from_slice(&data[..len]);
        record
    }
}

fn trim_record(bytes: &[u8]) -> Vec<u8> {
    let end = bytes
        .iter()
        .rposition(|b| *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    bytes[..end].to_vec()
}
