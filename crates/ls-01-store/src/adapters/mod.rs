pub mod file;
pub mod memory;

pub use file::FileCommitStore;
pub use memory::InMemoryCommitStore;
