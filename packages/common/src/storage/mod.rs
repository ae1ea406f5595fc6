mod error;
mod traits;

pub mod memory;
pub mod s3;

pub use error::StorageError;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use traits::{BoxReader, ObjectStore};
