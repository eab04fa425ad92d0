use std::collections::HashMap;

use crate::common::{MinibaseError, Result, TxId};

/// Record-granularity exclusive locks. Strict no-wait policy: acquiring a
/// record owned by another transaction fails immediately, so there is no
/// waiting and no deadlock handling.
#[derive(Debug, Default)]
pub struct LockTable {
    owners: HashMap<u64, TxId>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, record_id: u64) -> bool {
        self.owners.contains_key(&record_id)
    }

    pub fn owner(&self, record_id: u64) -> Option<TxId> {
        self.owners.get(&record_id).copied()
    }

    pub fn owned_by(&self, record_id: u64, tx_id: TxId) -> bool {
        self.owner(record_id) == Some(tx_id)
    }

    pub fn acquire(&mut self, record_id: u64, tx_id: TxId) -> Result<()> {
        match self.owners.get(&record_id) {
            Some(owner) if *owner != tx_id => Err(MinibaseError::LockConflict {
                record: record_id,
                owner: owner.0,
            }),
            _ => {
                self.owners.insert(record_id, tx_id);
                Ok(())
            }
        }
    }

    pub fn release(&mut self, record_id: u64) {
        self.owners.remove(&record_id);
    }

    pub fn release_all(&mut self, tx_id: TxId) {
        self.owners.retain(|_, owner| *owner != tx_id);
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive_across_transactions() {
        let mut locks = LockTable::new();
        locks.acquire(7, TxId(1)).unwrap();

        // Re-acquiring our own lock is fine, someone else's is not.
        locks.acquire(7, TxId(1)).unwrap();
        assert!(locks.acquire(7, TxId(2)).is_err());

        locks.release_all(TxId(1));
        assert!(locks.is_empty());
        locks.acquire(7, TxId(2)).unwrap();
    }
}
