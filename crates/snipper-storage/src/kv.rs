pub mod file;
pub mod memory;

pub use file::{FileStore, Replay};
pub use memory::MemoryStore;
