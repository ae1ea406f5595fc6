pub mod events;
pub mod photos;
pub mod retry;
pub mod storage;

pub use photos::{NewPhoto, Photo, PhotoStatus, PhotoStore, StoreError};
pub use storage::{ObjectStore, StorageError};
