use std::collections::{HashMap, HashSet};
use std::fs::{File as StdFile, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info};

use crate::buffer::BufferManager;
use crate::common::{Lsn, MinibaseError, Result, StoreConfig, TxId};
use crate::wal::log_record::{LogKind, LogRecord};

/// The write-ahead log: an in-memory staging buffer plus an append-only
/// file of `u32 length || frame` entries. Nothing a transaction did is
/// durable until its records are flushed; conversely a flushed COMMIT makes
/// the transaction durable regardless of data-page state.
pub struct LogManager {
    log_file: StdFile,
    staging: Vec<LogRecord>,
    current_lsn: u64,
    last_checkpoint_pos: u64,
    record_counts: HashMap<LogKind, u64>,
}

impl LogManager {
    pub fn open(path: &Path) -> Result<Self> {
        let log_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let mut manager = Self {
            log_file,
            staging: Vec::new(),
            current_lsn: 0,
            last_checkpoint_pos: 0,
            record_counts: HashMap::new(),
        };
        manager.seed_lsn();
        Ok(manager)
    }

    // Continue the LSN sequence of an existing log. A log that cannot be
    // decoded seeds to 0 as a best-effort start; mid-file corruption still
    // fails recover().
    fn seed_lsn(&mut self) {
        if let Ok(records) = self.read_all() {
            if let Some(last) = records.last() {
                self.current_lsn = last.lsn.0;
            }
        }
    }

    pub fn next_lsn(&mut self) -> Lsn {
        self.current_lsn += 1;
        Lsn(self.current_lsn)
    }

    pub fn log_begin(&mut self, tx_id: TxId) {
        let lsn = self.next_lsn();
        self.stage(LogRecord::control(LogKind::Begin, tx_id, lsn));
    }

    pub fn log_commit(&mut self, tx_id: TxId) {
        let lsn = self.next_lsn();
        self.stage(LogRecord::control(LogKind::Commit, tx_id, lsn));
    }

    pub fn log_rollback(&mut self, tx_id: TxId) {
        let lsn = self.next_lsn();
        self.stage(LogRecord::control(LogKind::Rollback, tx_id, lsn));
    }

    pub fn log_update(&mut self, tx_id: TxId, record_id: u64, before: Vec<u8>, after: Vec<u8>) {
        let lsn = self.next_lsn();
        self.stage(LogRecord::update(tx_id, record_id as i32, before, after, lsn));
    }

    pub fn log_insert(&mut self, tx_id: TxId, record_id: u64, after: Vec<u8>) {
        let lsn = self.next_lsn();
        self.stage(LogRecord::insert(tx_id, record_id as i32, after, lsn));
    }

    pub fn log_checkpoint(&mut self) {
        let lsn = self.next_lsn();
        self.stage(LogRecord::checkpoint(lsn));
    }

    fn stage(&mut self, record: LogRecord) {
        *self.record_counts.entry(record.kind).or_insert(0) += 1;
        debug!("staged {}", record);
        self.staging.push(record);
    }

    /// Appends every staged frame to the log file, syncs, and clears the
    /// staging buffer. This is the durability point for everything staged.
    pub fn flush(&mut self) -> Result<()> {
        if self.staging.is_empty() {
            return Ok(());
        }

        let mut offset = self.log_file.seek(SeekFrom::End(0))?;
        for record in &self.staging {
            if record.kind == LogKind::Checkpoint {
                self.last_checkpoint_pos = offset;
            }
            let body = record.to_bytes();
            self.log_file.write_all(&(body.len() as u32).to_be_bytes())?;
            self.log_file.write_all(&body)?;
            offset += 4 + body.len() as u64;
        }
        self.log_file.sync_all()?;

        debug!("flushed {} log records to disk", self.staging.len());
        self.staging.clear();
        Ok(())
    }

    /// Decodes the whole on-disk log. A truncated trailing frame marks the
    /// end of the log (a torn final write); a malformed frame anywhere else
    /// is corruption and aborts.
    pub fn read_all(&mut self) -> Result<Vec<LogRecord>> {
        self.log_file.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        self.log_file.read_to_end(&mut data)?;

        let mut records = Vec::new();
        let mut pos = 0usize;
        while pos + 4 <= data.len() {
            let mut len_buf = [0u8; 4];
            len_buf.copy_from_slice(&data[pos..pos + 4]);
            let frame_len = u32::from_be_bytes(len_buf) as usize;
            if pos + 4 + frame_len > data.len() {
                break; // torn tail, discard
            }
            records.push(LogRecord::from_bytes(&data[pos + 4..pos + 4 + frame_len])?);
            pos += 4 + frame_len;
        }
        Ok(records)
    }

    /// File offset of the most recent CHECKPOINT frame written by this
    /// manager. A hint only; recovery rescans the log.
    pub fn last_checkpoint_position(&self) -> u64 {
        self.last_checkpoint_pos
    }

    pub fn records_of_kind(&self, kind: LogKind) -> u64 {
        *self.record_counts.get(&kind).unwrap_or(&0)
    }

    pub fn total_records(&self) -> u64 {
        self.record_counts.values().sum()
    }

    /// Crash recovery: analysis, then REDO of committed work, then UNDO of
    /// everything that neither committed nor rolled back, scanning only
    /// past the last CHECKPOINT. Returns the recovered record count; the
    /// caller persists it.
    pub fn recover(
        &mut self,
        buffer: &mut BufferManager,
        cfg: &StoreConfig,
        mut record_count: u64,
    ) -> Result<u64> {
        let journal = self.read_all()?;
        if journal.is_empty() {
            info!("recovery: log is empty, nothing to do");
            return Ok(record_count);
        }

        let start = journal
            .iter()
            .rposition(|r| r.kind == LogKind::Checkpoint)
            .map(|i| i + 1)
            .unwrap_or(0);

        // Analysis: committed transactions win, transactions still active
        // at the end of the log lose. A ROLLBACK already restored its pages
        // before being logged, so it needs neither redo nor undo.
        let mut committed: HashSet<TxId> = HashSet::new();
        let mut active: HashSet<TxId> = HashSet::new();
        for record in &journal[start..] {
            match record.kind {
                LogKind::Begin => {
                    active.insert(record.tx_id);
                }
                LogKind::Commit => {
                    active.remove(&record.tx_id);
                    committed.insert(record.tx_id);
                }
                LogKind::Rollback => {
                    active.remove(&record.tx_id);
                }
                _ => {}
            }
        }
        info!(
            "recovery: {} records, scan from {}, {} committed, {} to undo",
            journal.len(),
            start,
            committed.len(),
            active.len()
        );

        // REDO pass, forward.
        for record in &journal[start..] {
            if !committed.contains(&record.tx_id) {
                continue;
            }
            if let LogKind::Update | LogKind::Insert = record.kind {
                if let Some(after) = &record.after {
                    apply_image(buffer, cfg, record.record_id, after)?;
                    debug!("redo {}", record);
                    if record.kind == LogKind::Insert && record.record_id as u64 >= record_count {
                        record_count = record.record_id as u64 + 1;
                    }
                }
            }
        }

        // UNDO pass, backward, so a loser's change on a slot a winner also
        // touched resolves to the loser's own before-image, which the REDO
        // pass just made current.
        for record in journal[start..].iter().rev() {
            if !active.contains(&record.tx_id) {
                continue;
            }
            match record.kind {
                LogKind::Update => {
                    if let Some(before) = &record.before {
                        apply_image(buffer, cfg, record.record_id, before)?;
                        debug!("undo {}", record);
                    }
                }
                LogKind::Insert => {
                    // Only a tail insert can be taken back; an interior one
                    // would leave a hole the format cannot describe.
                    if record_count > 0 && record.record_id as u64 == record_count - 1 {
                        record_count -= 1;
                        debug!("undo {} (record count now {})", record, record_count);
                    }
                }
                _ => {}
            }
        }

        buffer.force_all_dirty()?;
        info!("recovery complete, record count {}", record_count);
        Ok(record_count)
    }
}

fn apply_image(
    buffer: &mut BufferManager,
    cfg: &StoreConfig,
    record_id: i32,
    image: &[u8],
) -> Result<()> {
    if record_id < 0 {
        return Err(MinibaseError::CorruptLog(format!(
            "change record without a record id ({})",
            record_id
        )));
    }
    if image.len() != cfg.record_size {
        return Err(MinibaseError::CorruptLog(format!(
            "image of {} bytes for record {}, expected {}",
            image.len(),
            record_id,
            cfg.record_size
        )));
    }

    let rid = record_id as u64;
    let page_id = cfg.page_of(rid);
    let range = cfg.slot_range(cfg.slot_of(rid));

    let page = buffer.fix(page_id)?;
    page.data_mut()[range].copy_from_slice(image);
    buffer.mark_dirty(page_id)?;
    buffer.unfix(page_id)
}
