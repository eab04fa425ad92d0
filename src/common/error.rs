use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinibaseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record {0} does not exist")]
    NotFound(u64),

    #[error("record {record} is locked by transaction {owner}")]
    LockConflict { record: u64, owner: i32 },

    #[error("corrupt log: {0}")]
    CorruptLog(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("buffer pool full")]
    BufferFull,
}

pub type Result<T> = std::result::Result<T, MinibaseError>;
