pub mod engine;
pub mod memory;
pub mod table;

pub use engine::{BackendCapabilities, Statement, StorageBackend};
pub use memory::{InMemoryStorage, StatementRecord};
pub use table::{Table, TableSchema};
