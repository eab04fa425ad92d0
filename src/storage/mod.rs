mod file;
mod paged_file;
mod store_files;

pub use file::{File, MemoryFile, PosixFile};
pub use paged_file::PagedFileStore;
pub use store_files::StoreFiles;
