//! # Combat Development Tools
//!
//! Command-line tools for development:
//! - Config validation
//! - Headless scenario runs with JSON reports

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod scenario;
pub mod validate;
