pub mod disk;
pub mod memory;

pub use disk::DiskObjectStore;
pub use memory::MemoryObjectStore;
