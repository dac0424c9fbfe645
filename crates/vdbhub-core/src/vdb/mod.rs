//! VDB definitions.
//!
//! These are the inputs a deployer hands to the registry: the VDB's models,
//! imports, data policies, and libraries.

mod definition;
mod policy;

pub use definition::{ConnectionType, ImportDecl, ModelDef, ModelKind, VdbDefinition};
pub use policy::{DataPolicy, Permission};
