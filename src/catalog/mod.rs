// Virtual catalog
//
// information_schema: table registry, the data node that resolves database
// names and synthesizes catalog rows, and the server variable table.

pub mod information_schema;
mod producers;
pub mod registry;
pub mod variables;

pub use information_schema::{InformationSchemaDataNode, FILES_DATABASE, INFORMATION_SCHEMA};
pub use registry::{columns_of, table_exists, table_names, VirtualTable, VIRTUAL_TABLES};
