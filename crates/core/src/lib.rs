//! OnionMesh Core Types
//!
//! This crate defines the wire structures, error taxonomy and protocol
//! constants shared by every OnionMesh component.

pub mod config;
pub mod encoding;
mod error;
mod types;

pub use error::*;
pub use types::*;
