//! Core utilities and common types for STG2Seq.

pub mod error;
pub mod ops;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
