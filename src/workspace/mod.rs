//! Workspace handles and the bundled backends.
//!
//! - `MemoryWorkspace`: in-process store
//! - `TextFileWorkspace`: flat-file backend, cached for the process lifetime
//! - `SqliteWorkspace`: relational handle, one per factory call

pub mod memory;
pub mod sqlite;
pub mod text_file;
pub mod traits;

pub use memory::MemoryWorkspace;
pub use sqlite::{RECORDS_TABLE, RECORDS_TABLE_SQL, SqliteWorkspace};
pub use text_file::TextFileWorkspace;
pub use traits::{Access, ReadOnlyWorkspace, SharedReadOnlyWorkspace, SharedWorkspace, Workspace};
