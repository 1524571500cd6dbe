#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Shared domain types, error enum, collaborator traits and configuration for
//! the knowledge-base retrieval workspace.

pub mod config;
pub mod error;
pub mod file_store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
