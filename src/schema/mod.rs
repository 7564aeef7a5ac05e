//! Relational schema lifecycle.
//!
//! [`SchemaModel`] describes the tables a database must contain,
//! [`VersionLedger`] records applied versions inside the database, and
//! [`SchemaInitializer`] drives a database from absent or incompatible to
//! ready.

pub mod initializer;
pub mod ledger;
pub mod model;

pub use initializer::{InitAction, InitReport, SchemaInitializer, SchemaState, probe};
pub use ledger::{VERSION_LEDGER_TABLE, VersionLedger};
pub use model::{SchemaModel, TableDef};
