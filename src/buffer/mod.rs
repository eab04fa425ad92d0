mod buffer_manager;

pub use buffer_manager::{BufferManager, BufferedPage};
