mod manager;
mod store;

pub mod memory;
pub mod postgres;

pub use manager::{UserError, UserManager};
pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;
pub use store::{Role, User, UserStore, UserStoreError};
