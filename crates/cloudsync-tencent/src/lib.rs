//! Cloudsync Tencent - CVM inventory provider
//!
//! Lists regions and instances through the Tencent Cloud API 3.0 with
//! TC3-HMAC-SHA256 signed requests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod signing;

pub use client::{TencentConfig, TencentCvmClient};
pub use error::{Error, Result};
