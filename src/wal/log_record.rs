use std::fmt;

use crate::common::{Lsn, MinibaseError, Result, TxId};

/// On-disk kind codes. Part of the log format; do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Begin = 0,
    Commit = 1,
    Rollback = 2,
    Update = 3,
    Insert = 4,
    Checkpoint = 5,
}

impl LogKind {
    fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(LogKind::Begin),
            1 => Ok(LogKind::Commit),
            2 => Ok(LogKind::Rollback),
            3 => Ok(LogKind::Update),
            4 => Ok(LogKind::Insert),
            5 => Ok(LogKind::Checkpoint),
            other => Err(MinibaseError::CorruptLog(format!(
                "unknown log record kind {}",
                other
            ))),
        }
    }
}

/// One entry of the write-ahead log.
///
/// `record_id` is `-1` for BEGIN/COMMIT/ROLLBACK/CHECKPOINT, and `tx_id` is
/// `-1` for CHECKPOINT. INSERT carries only an after-image, UPDATE both.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub lsn: Lsn,
    pub kind: LogKind,
    pub tx_id: TxId,
    pub record_id: i32,
    pub before: Option<Vec<u8>>,
    pub after: Option<Vec<u8>>,
}

impl LogRecord {
    /// BEGIN / COMMIT / ROLLBACK marker.
    pub fn control(kind: LogKind, tx_id: TxId, lsn: Lsn) -> Self {
        Self {
            lsn,
            kind,
            tx_id,
            record_id: -1,
            before: None,
            after: None,
        }
    }

    pub fn checkpoint(lsn: Lsn) -> Self {
        Self {
            lsn,
            kind: LogKind::Checkpoint,
            tx_id: TxId(-1),
            record_id: -1,
            before: None,
            after: None,
        }
    }

    pub fn update(tx_id: TxId, record_id: i32, before: Vec<u8>, after: Vec<u8>, lsn: Lsn) -> Self {
        Self {
            lsn,
            kind: LogKind::Update,
            tx_id,
            record_id,
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn insert(tx_id: TxId, record_id: i32, after: Vec<u8>, lsn: Lsn) -> Self {
        Self {
            lsn,
            kind: LogKind::Insert,
            tx_id,
            record_id,
            before: None,
            after: Some(after),
        }
    }

    /// Frame body. All integers big-endian; a zero image length means the
    /// image is absent.
    pub fn to_bytes(&self) -> Vec<u8> {
        let before = self.before.as_deref().unwrap_or(&[]);
        let after = self.after.as_deref().unwrap_or(&[]);

        let mut buf = Vec::with_capacity(24 + 8 + before.len() + after.len());
        buf.extend_from_slice(&self.lsn.0.to_be_bytes());
        buf.extend_from_slice(&(self.kind as u32).to_be_bytes());
        buf.extend_from_slice(&self.tx_id.0.to_be_bytes());
        buf.extend_from_slice(&self.record_id.to_be_bytes());
        buf.extend_from_slice(&(before.len() as u32).to_be_bytes());
        buf.extend_from_slice(before);
        buf.extend_from_slice(&(after.len() as u32).to_be_bytes());
        buf.extend_from_slice(after);
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = FrameReader { data, pos: 0 };

        let lsn = Lsn(reader.read_u64()?);
        let kind = LogKind::from_u32(reader.read_u32()?)?;
        let tx_id = TxId(reader.read_i32()?);
        let record_id = reader.read_i32()?;

        let before_len = reader.read_u32()? as usize;
        let before = if before_len > 0 {
            Some(reader.read_bytes(before_len)?.to_vec())
        } else {
            None
        };

        let after_len = reader.read_u32()? as usize;
        let after = if after_len > 0 {
            Some(reader.read_bytes(after_len)?.to_vec())
        } else {
            None
        };

        Ok(Self {
            lsn,
            kind,
            tx_id,
            record_id,
            before,
            after,
        })
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogRecord{{lsn={}, kind={:?}, tx={}, record={}}}",
            self.lsn.0, self.kind, self.tx_id, self.record_id
        )
    }
}

struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(MinibaseError::CorruptLog(format!(
                "log frame too short: want {} bytes at offset {}, frame is {}",
                n,
                self.pos,
                self.data.len()
            )));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.read_bytes(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.read_bytes(4)?);
        Ok(i32::from_be_bytes(buf))
    }
}
