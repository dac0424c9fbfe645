//! vdbhub server library.
//!
//! This crate provides the deployer process for vdbhub: it scans a
//! directory of VDB descriptors, keeps a [`vdbhub_core::Registry`] in sync
//! with it, and rechecks inactive VDBs in the background.

pub mod config;
pub mod deployer;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod task;

pub use config::{Args, ServerConfig};
pub use deployer::{Deployer, ScanReport};
pub use descriptor::{VdbDescriptor, DESCRIPTOR_SUFFIX};
pub use error::Error;
pub use events::LoggingEventListener;
pub use task::ScanTask;
