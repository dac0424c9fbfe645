//! Metadata model, store merging, and the query-time facade.

mod facade;
mod functions;
mod merge;
mod model;
mod store;

pub use facade::{QueryMetadata, MULTI_SOURCE_COLUMN_PROPERTY};
pub use functions::FunctionTree;
pub use merge::MetadataStoreMerge;
pub use model::{
    Column, ColumnStats, Datatype, FunctionMethod, Procedure, Schema, Table, TableStats,
    TriggerEvent,
};
pub use store::{MetadataStore, SharedSchema};
