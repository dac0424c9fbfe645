//! Composite VDBs: a VDB merged with the VDBs it imports.

mod builder;
mod unit;
mod view;

pub use builder::MergedViewBuilder;
pub use unit::CompositeUnit;
pub use view::{ChildLink, LibraryChain, MergedView};
