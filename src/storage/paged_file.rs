use std::path::Path;

use crate::common::{PageId, Result, HEADER_SIZE};
use crate::storage::file::{File, MemoryFile, PosixFile};

/// Raw page storage: an 8-byte header holding the persisted record count,
/// followed by fixed-size pages at `HEADER_SIZE + page_id * page_size`.
///
/// Pages are materialised lazily: reading past the end of the file yields
/// zero-filled bytes, and writes extend the file as needed.
pub struct PagedFileStore {
    file: Box<dyn File>,
    page_size: usize,
}

impl PagedFileStore {
    /// Opens or creates the data file. A missing or short file is
    /// initialised with a zero header.
    pub fn open(path: &Path, page_size: usize) -> Result<Self> {
        let file = PosixFile::open(path)?;
        Self::with_file(Box::new(file), page_size)
    }

    /// Disk-free store for tests.
    pub fn in_memory(page_size: usize) -> Result<Self> {
        Self::with_file(Box::new(MemoryFile::new()), page_size)
    }

    fn with_file(mut file: Box<dyn File>, page_size: usize) -> Result<Self> {
        if file.size()? < HEADER_SIZE as usize {
            file.resize(HEADER_SIZE as usize)?;
            file.write_block(&0u64.to_be_bytes(), 0)?;
            file.sync()?;
        }
        Ok(Self { file, page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn read_header(&mut self) -> Result<u64> {
        let bytes = self.file.read_block(0, HEADER_SIZE as usize)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes);
        Ok(u64::from_be_bytes(buf))
    }

    pub fn write_header(&mut self, record_count: u64) -> Result<()> {
        self.file.write_block(&record_count.to_be_bytes(), 0)?;
        self.file.sync()
    }

    fn page_offset(&self, id: PageId) -> usize {
        HEADER_SIZE as usize + id.0 as usize * self.page_size
    }

    /// Fills `buf` with the page's bytes. Bytes beyond the end of the file
    /// read as zero.
    pub fn read_page(&mut self, id: PageId, buf: &mut [u8]) -> Result<()> {
        buf.fill(0);
        let offset = self.page_offset(id);
        let file_size = self.file.size()?;
        if offset < file_size {
            let available = (file_size - offset).min(self.page_size);
            let bytes = self.file.read_block(offset, available)?;
            buf[..available].copy_from_slice(&bytes);
        }
        Ok(())
    }

    /// Writes a full page and syncs it to stable storage, extending the
    /// file if the page lies past the current end.
    pub fn write_page(&mut self, id: PageId, buf: &[u8]) -> Result<()> {
        let offset = self.page_offset(id);
        self.file.write_block(buf, offset)?;
        self.file.sync()
    }
}
