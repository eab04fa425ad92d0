use std::collections::HashMap;

use crate::common::PageId;

/// Per-transaction snapshots of whole pages, taken just before the first
/// write the transaction makes to each page. First write wins: an existing
/// image is never replaced, so it always shows the page as it was when the
/// transaction started touching it.
#[derive(Debug, Default)]
pub struct BeforeImageBuffer {
    images: HashMap<PageId, Vec<u8>>,
}

impl BeforeImageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.images.contains_key(&page_id)
    }

    pub fn insert(&mut self, page_id: PageId, image: Vec<u8>) {
        self.images.entry(page_id).or_insert(image);
    }

    pub fn get(&self, page_id: PageId) -> Option<&[u8]> {
        self.images.get(&page_id).map(|image| image.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PageId, &Vec<u8>)> {
        self.images.iter()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
