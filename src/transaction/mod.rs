mod before_image;
mod lock_table;
mod transaction;

pub use before_image::BeforeImageBuffer;
pub use lock_table::LockTable;
pub use transaction::TransactionManager;
