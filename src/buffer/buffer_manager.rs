use std::collections::HashMap;

use log::trace;

use crate::common::{MinibaseError, PageId, Result};
use crate::storage::PagedFileStore;

pub struct BufferedPage {
    data: Vec<u8>,
    dirty: bool,
    fix_count: u32, // Reference count - can't evict while > 0
    transactional: bool,
}

impl BufferedPage {
    fn new(page_size: usize) -> Self {
        Self {
            data: vec![0; page_size],
            dirty: false,
            fix_count: 0,
            transactional: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    pub fn fix_count(&self) -> u32 {
        self.fix_count
    }

    fn pin(&mut self) {
        self.fix_count += 1;
    }

    fn unpin(&mut self) -> Result<()> {
        if self.fix_count == 0 {
            return Err(MinibaseError::InvariantViolation(
                "unfix of a page with fix count 0".to_string(),
            ));
        }
        self.fix_count -= 1;
        Ok(())
    }
}

/// Page cache over the data file. Tracks dirty / fix-count / transactional
/// state per page; all disk traffic for pages goes through `force`.
pub struct BufferManager {
    store: PagedFileStore,
    pages: HashMap<PageId, BufferedPage>,
    capacity: usize,
}

impl BufferManager {
    pub fn new(store: PagedFileStore, capacity: usize) -> Self {
        Self {
            store,
            pages: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Loads the page if absent and pins it. The caller must `unfix` once
    /// done with the returned reference.
    pub fn fix(&mut self, id: PageId) -> Result<&mut BufferedPage> {
        if !self.pages.contains_key(&id) {
            if self.pages.len() >= self.capacity {
                self.evict_victim()?;
            }
            let mut page = BufferedPage::new(self.store.page_size());
            self.store.read_page(id, page.data_mut())?;
            self.pages.insert(id, page);
        }

        let page = self.page_mut(id)?;
        page.pin();
        Ok(page)
    }

    pub fn unfix(&mut self, id: PageId) -> Result<()> {
        self.page_mut(id)?.unpin()
    }

    pub fn mark_dirty(&mut self, id: PageId) -> Result<()> {
        self.page_mut(id)?.dirty = true;
        Ok(())
    }

    pub fn mark_transactional(&mut self, id: PageId) -> Result<()> {
        self.page_mut(id)?.transactional = true;
        Ok(())
    }

    pub fn page(&self, id: PageId) -> Option<&BufferedPage> {
        self.pages.get(&id)
    }

    /// Writes the page to disk if dirty, then clears both the dirty and
    /// transactional flags.
    pub fn force(&mut self, id: PageId) -> Result<()> {
        if let Some(page) = self.pages.get_mut(&id) {
            if page.dirty {
                self.store.write_page(id, &page.data)?;
                page.dirty = false;
                page.transactional = false;
                trace!("forced page {} to disk", id);
            }
        }
        Ok(())
    }

    pub fn force_all_dirty(&mut self) -> Result<()> {
        let dirty: Vec<PageId> = self
            .pages
            .iter()
            .filter(|(_, page)| page.dirty)
            .map(|(id, _)| *id)
            .collect();

        for id in dirty {
            self.force(id)?;
        }
        Ok(())
    }

    /// Overwrites the in-memory page with `image` and marks it clean. Used
    /// when a rollback restores a before-image snapshot. Returns false when
    /// the page is not buffered.
    pub fn restore_page(&mut self, id: PageId, image: &[u8]) -> bool {
        match self.pages.get_mut(&id) {
            Some(page) => {
                page.data.copy_from_slice(image);
                page.dirty = false;
                page.transactional = false;
                true
            }
            None => false,
        }
    }

    /// Clears the transactional flag on every page; dirty flags stay set so
    /// the next checkpoint picks the pages up.
    pub fn clear_transactional(&mut self) {
        for page in self.pages.values_mut() {
            page.transactional = false;
        }
    }

    /// Drops the page from the pool. A fixed page cannot be evicted; a
    /// dirty non-transactional page is written out first.
    pub fn evict(&mut self, id: PageId) -> Result<()> {
        if let Some(page) = self.pages.get(&id) {
            if page.fix_count > 0 {
                return Err(MinibaseError::InvariantViolation(format!(
                    "cannot evict fixed page {}",
                    id
                )));
            }
            if page.dirty && !page.transactional {
                self.force(id)?;
            }
        }
        self.pages.remove(&id);
        Ok(())
    }

    /// Empties the pool without writing anything. Crash simulation only.
    pub fn discard_all(&mut self) {
        self.pages.clear();
    }

    pub fn read_header(&mut self) -> Result<u64> {
        self.store.read_header()
    }

    pub fn write_header(&mut self, record_count: u64) -> Result<()> {
        self.store.write_header(record_count)
    }

    fn page_mut(&mut self, id: PageId) -> Result<&mut BufferedPage> {
        self.pages.get_mut(&id).ok_or_else(|| {
            MinibaseError::InvariantViolation(format!("page {} is not buffered", id))
        })
    }

    // Capacity eviction: grab the first unpinned non-transactional page.
    // Transactional pages stay put - their bytes must not reach disk before
    // the transaction resolves.
    // TODO: Implement proper LRU replacement policy
    fn evict_victim(&mut self) -> Result<()> {
        let victim = self
            .pages
            .iter()
            .find(|(_, page)| page.fix_count == 0 && !page.transactional)
            .map(|(id, _)| *id);

        match victim {
            Some(id) => {
                self.force(id)?;
                self.pages.remove(&id);
                trace!("evicted page {}", id);
                Ok(())
            }
            None => Err(MinibaseError::BufferFull),
        }
    }
}
