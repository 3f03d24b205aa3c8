//! Server module for Cloudsync
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `adapters`: HTTP adapter for the inventory service
//! - `loader`: Configuration loading from files and environment
//! - `init`: Component wiring and the serve loop

pub mod adapters;
pub mod config;
mod init;
mod loader;

pub use init::{build, run};
pub use loader::load_config;
